//! Local change watcher with per-path debouncing
//!
//! Filesystem events are forwarded from the notify subscription into a
//! tokio channel and handled by a spawned task. Rapid successive writes to
//! the same path coalesce within the debounce window before triggering one
//! propagation. Propagation is at-least-once per change; no cross-path
//! ordering is guaranteed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant};

use crate::error::{Result, SyncError};
use crate::sync::TreeWalker;
use crate::types::DOC_EXTENSION;

/// Commands for the watch loop
#[derive(Debug)]
enum WatchCommand {
    Stop,
}

/// Kind of local file event fed into propagation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Change,
    Unlink,
}

impl ChangeKind {
    /// Map a notify event kind onto the sync-relevant kinds
    pub fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Add),
            EventKind::Modify(_) => Some(ChangeKind::Change),
            EventKind::Remove(_) => Some(ChangeKind::Unlink),
            _ => None,
        }
    }
}

/// Handle to a running watch subscription
pub struct ChangeWatcher {
    sender: mpsc::Sender<WatchCommand>,
}

impl ChangeWatcher {
    /// Subscribe to `root` and start the watch loop.
    ///
    /// The notify subscription is owned by the spawned task, so stopping
    /// the loop releases the filesystem handles on every exit path.
    pub fn start(walker: Arc<TreeWalker>, root: &Path, debounce_ms: u64) -> Result<Self> {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WatchCommand>(16);
        let (event_tx, mut event_rx) = mpsc::channel::<notify::Event>(256);

        // The callback runs on notify's own thread, so a blocking send is
        // safe here
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    let _ = event_tx.blocking_send(event);
                }
                Err(e) => tracing::warn!("Watch backend error: {}", e),
            })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::info!("Watching {} for changes", root.display());

        let debounce = Duration::from_millis(debounce_ms);
        tokio::spawn(async move {
            let _watcher = watcher;
            let mut dirty: HashMap<PathBuf, Instant> = HashMap::new();
            let mut flush_tick = interval(Duration::from_millis(250));

            loop {
                tokio::select! {
                    Some(cmd) = cmd_rx.recv() => match cmd {
                        WatchCommand::Stop => break,
                    },
                    Some(event) = event_rx.recv() => {
                        Self::handle_event(&walker, &event, &mut dirty);
                    }
                    _ = flush_tick.tick() => {
                        let ready: Vec<PathBuf> = dirty
                            .iter()
                            .filter(|(_, marked)| marked.elapsed() >= debounce)
                            .map(|(path, _)| path.clone())
                            .collect();
                        for path in ready {
                            dirty.remove(&path);
                            if let Err(e) = walker.propagate_local(&path).await {
                                tracing::error!(
                                    "Propagating change to {} failed: {}",
                                    path.display(),
                                    e
                                );
                            }
                        }
                    }
                }
            }

            tracing::info!("Change watcher stopped");
        });

        Ok(Self { sender: cmd_tx })
    }

    fn handle_event(
        walker: &TreeWalker,
        event: &notify::Event,
        dirty: &mut HashMap<PathBuf, Instant>,
    ) {
        let Some(kind) = ChangeKind::from_event(&event.kind) else {
            return;
        };

        for path in &event.paths {
            if path.extension().and_then(|e| e.to_str()) != Some(DOC_EXTENSION)
                || walker.is_excluded(path)
            {
                continue;
            }
            match kind {
                ChangeKind::Add | ChangeKind::Change => {
                    dirty.insert(path.clone(), Instant::now());
                }
                // Deletion handling is a stub: the remote page is left as-is
                ChangeKind::Unlink => {
                    tracing::debug!("Ignoring deletion of {}", path.display());
                    dirty.remove(path);
                }
            }
        }
    }

    /// Stop the watch loop and release the subscription
    pub async fn stop(&self) -> Result<()> {
        self.sender
            .send(WatchCommand::Stop)
            .await
            .map_err(|_| SyncError::Watch("Watch loop already stopped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn test_change_kind_mapping() {
        assert_eq!(
            ChangeKind::from_event(&EventKind::Create(CreateKind::File)),
            Some(ChangeKind::Add)
        );
        assert_eq!(
            ChangeKind::from_event(&EventKind::Modify(ModifyKind::Any)),
            Some(ChangeKind::Change)
        );
        assert_eq!(
            ChangeKind::from_event(&EventKind::Remove(RemoveKind::File)),
            Some(ChangeKind::Unlink)
        );
        assert_eq!(ChangeKind::from_event(&EventKind::Access(notify::event::AccessKind::Any)), None);
    }
}
