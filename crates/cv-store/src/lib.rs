pub mod config;
pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod session;
pub mod store;

use std::env;
use std::path::PathBuf;

pub use config::Settings;
pub use error::{Result, StoreError};
pub use session::ChatSession;
pub use store::{ChatSummary, Store};

/// Default data directory: `~/.chat-vars`.
pub fn default_base_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".chat-vars")
}
