//! Live tailing of the watched log.

pub mod manager;
pub mod watcher;

pub use manager::{TreeEvent, WatchError, WatchManager, WatchStarted};
