//! Sync flow orchestration
//!
//! [`SyncEngine`] composes the tree walker, identity map, and change
//! watcher into the two directional flows. The one-shot path runs
//! remote→local materialization to completion before local→remote
//! propagation begins, so freshly materialized documents are visible to
//! the outbound scan. Watch-mode events arrive only after both one-shot
//! flows complete.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, SyncError};
use crate::remote::RemoteStore;
use crate::sync::{ChangeWatcher, IdentityMap, TreeWalker};
use crate::types::{SyncConfig, SyncReport};

/// Owns the sync flows and the watch-mode lifecycle
pub struct SyncEngine {
    config: SyncConfig,
    walker: Arc<TreeWalker>,
    identity: Arc<Mutex<IdentityMap>>,
    watcher: Mutex<Option<ChangeWatcher>>,
}

impl SyncEngine {
    /// Create an engine over a remote store handle.
    ///
    /// Pass a [`crate::remote::Retrying`]-wrapped store to apply the
    /// configured retry policy; tests pass doubles directly.
    pub fn new(config: SyncConfig, store: Arc<dyn RemoteStore>) -> Result<Self> {
        let identity = Arc::new(Mutex::new(IdentityMap::new()));
        let walker = Arc::new(TreeWalker::new(
            store,
            identity.clone(),
            &config.excluded_patterns,
        )?);

        Ok(Self {
            config,
            walker,
            identity,
            watcher: Mutex::new(None),
        })
    }

    /// Materialize the configured remote root into the local root
    pub async fn sync_from_remote(&self) -> Result<SyncReport> {
        let pages_synced = self
            .walker
            .materialize(&self.config.root_page_id, &self.config.root_dir)
            .await?;
        tracing::info!("Materialized {} pages from remote", pages_synced);

        Ok(SyncReport {
            pages_synced,
            files_synced: 0,
        })
    }

    /// Push every linked local document back to the remote store.
    ///
    /// Files are propagated sequentially in enumeration order, each
    /// awaited to completion, keeping remote call ordering deterministic.
    /// A per-file failure is logged and the loop continues; fatal errors
    /// abort the run.
    pub async fn sync_from_local(&self) -> Result<SyncReport> {
        let files = self.walker.collect_local_documents(&self.config.scan_dirs);
        let mut files_synced = 0;

        for file in &files {
            match self.walker.propagate_local(file).await {
                Ok(true) => files_synced += 1,
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!("Propagating {} failed: {}", file.display(), e);
                }
            }
        }
        tracing::info!(
            "Propagated {} of {} local documents",
            files_synced,
            files.len()
        );

        Ok(SyncReport {
            pages_synced: 0,
            files_synced,
        })
    }

    /// Materialize a single page subtree into `dir`
    pub async fn sync_single_page(&self, page_id: &str, dir: &Path) -> Result<SyncReport> {
        let pages_synced = self.walker.materialize(page_id, dir).await?;
        Ok(SyncReport {
            pages_synced,
            files_synced: 0,
        })
    }

    /// Start the change watcher if watch mode is configured.
    ///
    /// A no-op when watch mode is off: no events are ever dispatched and
    /// the one-shot flows are the only sync mechanism.
    pub fn start_watching(&self) -> Result<()> {
        if !self.config.watch_mode {
            tracing::debug!("Watch mode disabled");
            return Ok(());
        }

        let mut slot = self.watcher.lock();
        if slot.is_some() {
            return Err(SyncError::Watch("Watcher already running".to_string()));
        }

        *slot = Some(ChangeWatcher::start(
            self.walker.clone(),
            &self.config.root_dir,
            self.config.watch_debounce_ms,
        )?);
        Ok(())
    }

    /// Stop the change watcher, releasing the filesystem subscription.
    ///
    /// In-flight remote calls triggered before the stop complete or fail
    /// independently.
    pub async fn stop(&self) -> Result<()> {
        let watcher = self.watcher.lock().take();
        match watcher {
            Some(watcher) => watcher.stop().await,
            None => Ok(()),
        }
    }

    /// Shared identity map handle
    pub fn identity(&self) -> Arc<Mutex<IdentityMap>> {
        self.identity.clone()
    }
}
