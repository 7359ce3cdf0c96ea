//! Print the reconstructed tree of a log as JSON.
//!
//!     cargo run -p tailview-core --example dump_tree -- path/to/log.jsonl

use std::path::PathBuf;

use tailview_core::LogSession;

#[tokio::main]
async fn main() {
    let Some(path) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: dump_tree <log.jsonl>");
        std::process::exit(2);
    };

    let mut session = LogSession::new();
    let nodes = match session.load(&path).await {
        Ok(n) => n,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let tree = session.snapshot();
    eprintln!("{nodes} nodes, {} roots", tree.len());
    let json = serde_json::to_string_pretty(&tree).unwrap();
    println!("{}", json);
}
