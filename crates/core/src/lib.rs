// crates/core/src/lib.rs
pub mod boilerplate;
pub mod classifier;
pub mod discovery;
pub mod error;
pub mod registry;
pub mod session;
pub mod tracker;
pub mod tree;
pub mod types;

pub use classifier::{classify_line, expand_record};
pub use discovery::{decode_project_slug, log_id, projects_dir, SessionCatalog};
pub use error::*;
pub use registry::NodeRegistry;
pub use session::LogSession;
pub use tracker::LineTracker;
pub use tree::reconstruct;
pub use types::*;
