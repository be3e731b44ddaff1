//! Bidirectional sync between the remote page tree and the local file tree
//!
//! Two directional flows share one identity map:
//! - materialization (remote→local): the tree walker mirrors the remote
//!   page tree as directories and Markdown files
//! - propagation (local→remote): linked documents are pushed back through
//!   the remote store's replace-children operation
//!
//! The change watcher feeds local file events into the propagation path
//! when watch mode is enabled. Concurrent edits on both sides resolve as
//! last-writer-wins; there is no conflict detection.

mod identity;
mod orchestrator;
mod walker;
mod watcher;

pub use identity::IdentityMap;
pub use orchestrator::SyncEngine;
pub use walker::{sanitize_title, TreeWalker};
pub use watcher::{ChangeKind, ChangeWatcher};
