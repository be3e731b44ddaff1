//! Core types for pagesync

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Metadata key linking a local file to its remote page
pub const META_REMOTE_ID: &str = "remoteId";

/// Metadata key recording the last materialization time (RFC 3339)
pub const META_LAST_SYNCED: &str = "lastSynced";

/// File extension for local documents
pub const DOC_EXTENSION: &str = "md";

/// Frontmatter metadata: keys are unique, values are single-line scalars.
///
/// A `BTreeMap` keeps encode order deterministic.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Read-only snapshot of a remote page, fetched per traversal step.
///
/// Child pages appear inside `children` as [`Block::ChildPage`] references
/// and are fetched lazily by recursing on their id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePage {
    /// Opaque, globally unique remote identifier
    pub id: String,
    /// Page title
    pub title: String,
    /// Ordered block children
    pub children: Vec<Block>,
}

/// A structured content unit within a remote page.
///
/// Text-bearing variants hold ordered rich-text spans as plain strings;
/// styling is discarded (lossy by contract).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph {
        rich_text: Vec<String>,
    },
    /// Heading with level 1-3
    Heading {
        level: u8,
        rich_text: Vec<String>,
    },
    BulletedListItem {
        rich_text: Vec<String>,
    },
    NumberedListItem {
        rich_text: Vec<String>,
    },
    Code {
        language: String,
        rich_text: Vec<String>,
    },
    Image {
        caption: Vec<String>,
        url: String,
    },
    /// Reference to a sub-page, recursed into during materialization
    ChildPage {
        id: String,
        title: String,
    },
    /// Block type this engine does not transcode; degrades to omission
    Unsupported {
        raw: serde_json::Value,
    },
}

/// A local Markdown document: frontmatter metadata plus body text
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDocument {
    /// On-disk location
    pub path: PathBuf,
    /// Decoded frontmatter mapping
    pub metadata: Metadata,
    /// Markdown body (transcoded block content)
    pub body: String,
}

impl LocalDocument {
    /// Remote page id this document is linked to, if any.
    ///
    /// A document without one is local-only; propagation is a no-op.
    pub fn remote_id(&self) -> Option<&str> {
        self.metadata
            .get(META_REMOTE_ID)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Immutable sync configuration, resolved once at startup
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote identifier of the root page
    pub root_page_id: String,
    /// Local directory mirroring the root page
    pub root_dir: PathBuf,
    /// Directories scanned for outbound sync
    pub scan_dirs: Vec<PathBuf>,
    /// Glob patterns excluded from scans and watch events
    pub excluded_patterns: Vec<String>,
    /// Whether to watch the local tree after one-shot flows
    pub watch_mode: bool,
    /// Per-path debounce window for watch events, in milliseconds
    pub watch_debounce_ms: u64,
    /// Maximum retries for retryable remote errors
    pub max_retries: u32,
    /// Base delay between retries, in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root_page_id: String::new(),
            root_dir: PathBuf::from("."),
            scan_dirs: vec![],
            excluded_patterns: vec![],
            watch_mode: false,
            watch_debounce_ms: 500,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Counters returned by the one-shot sync flows
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SyncReport {
    /// Pages materialized from the remote tree
    pub pages_synced: usize,
    /// Local files propagated back to the remote store
    pub files_synced: usize,
}
