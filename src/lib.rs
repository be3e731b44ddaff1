//! pagesync - remote page tree ⇄ local Markdown sync
//!
//! Materializes a hierarchical remote document store as a local tree of
//! Markdown files with frontmatter metadata, and propagates local edits
//! back to the linked remote pages, one-shot or continuously in watch
//! mode.

pub mod error;
pub mod remote;
pub mod sync;
pub mod transcode;
pub mod types;

pub use error::{Result, SyncError};
pub use sync::SyncEngine;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
