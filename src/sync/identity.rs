//! Bidirectional mapping between remote page ids and local file paths
//!
//! Built incrementally during materialization and consulted during
//! propagation. Entries are never removed automatically; rebuilt on each
//! materialization pass. Last writer wins on collision.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// In-memory `remoteId ⇄ localPath` map
#[derive(Debug, Default)]
pub struct IdentityMap {
    by_id: HashMap<String, PathBuf>,
    by_path: HashMap<PathBuf, String>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the pair in both directions.
    ///
    /// At most one path per id is kept: recording an id again unlinks its
    /// previous path, and recording a path again unlinks its previous id.
    pub fn record(&mut self, remote_id: &str, local_path: &Path) {
        if let Some(old_path) = self.by_id.insert(remote_id.to_string(), local_path.to_path_buf())
        {
            self.by_path.remove(&old_path);
        }
        if let Some(old_id) = self
            .by_path
            .insert(local_path.to_path_buf(), remote_id.to_string())
        {
            if old_id != remote_id {
                self.by_id.remove(&old_id);
            }
        }
    }

    /// Local path mirroring a remote page, if recorded
    pub fn lookup_path(&self, remote_id: &str) -> Option<&Path> {
        self.by_id.get(remote_id).map(PathBuf::as_path)
    }

    /// Remote page id linked to a local path, if recorded
    pub fn lookup_id(&self, local_path: &Path) -> Option<&str> {
        self.by_path.get(local_path).map(String::as_str)
    }

    /// Number of recorded pairs
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
