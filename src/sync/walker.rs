//! Remote-tree materialization and local-tree enumeration
//!
//! The walker owns both traversal directions: depth-first pre-order descent
//! of the remote page tree (parent file written before children are
//! fetched), and recursive enumeration of local documents for outbound
//! propagation.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::remote::RemoteStore;
use crate::sync::IdentityMap;
use crate::transcode;
use crate::types::{
    Block, LocalDocument, Metadata, DOC_EXTENSION, META_LAST_SYNCED, META_REMOTE_ID,
};

/// Walks the remote page tree and the local file tree
pub struct TreeWalker {
    store: Arc<dyn RemoteStore>,
    identity: Arc<Mutex<IdentityMap>>,
    excluded: Vec<glob::Pattern>,
}

impl std::fmt::Debug for TreeWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalker")
            .field("excluded", &self.excluded)
            .finish_non_exhaustive()
    }
}

impl TreeWalker {
    /// Create a walker. Invalid exclusion patterns are a configuration
    /// error, surfaced before any flow starts.
    pub fn new(
        store: Arc<dyn RemoteStore>,
        identity: Arc<Mutex<IdentityMap>>,
        excluded_patterns: &[String],
    ) -> Result<Self> {
        let excluded = excluded_patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| SyncError::Config(format!("Bad exclusion pattern {}: {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            store,
            identity,
            excluded,
        })
    }

    /// Materialize the page rooted at `page_id` into `dir`, recursing into
    /// child pages. Returns the number of pages written.
    ///
    /// A failed child subtree is logged and skipped so sibling subtrees
    /// proceed; fatal errors (auth) abort the whole run. A visited-id set
    /// guards against cycles in the remote tree, which is untrusted input.
    pub async fn materialize(&self, page_id: &str, dir: &Path) -> Result<usize> {
        let mut visited = HashSet::new();
        self.materialize_page(page_id.to_string(), dir.to_path_buf(), &mut visited)
            .await
    }

    fn materialize_page<'a>(
        &'a self,
        page_id: String,
        dir: PathBuf,
        visited: &'a mut HashSet<String>,
    ) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>> {
        Box::pin(async move {
            if !visited.insert(page_id.clone()) {
                tracing::warn!("Cycle detected at page {}, skipping", page_id);
                return Ok(0);
            }

            let page = self.store.get_page(&page_id).await?;
            let body = transcode::page_to_markdown(&page);

            let mut metadata = Metadata::new();
            metadata.insert(META_REMOTE_ID.to_string(), json!(page_id));
            metadata.insert(
                META_LAST_SYNCED.to_string(),
                json!(Utc::now().to_rfc3339()),
            );

            tokio::fs::create_dir_all(&dir).await?;
            let file_path = dir.join(format!("{}.{}", sanitize_title(&page.title), DOC_EXTENSION));
            tokio::fs::write(&file_path, transcode::encode(&metadata, &body)).await?;
            self.identity.lock().record(&page_id, &file_path);
            tracing::info!("Materialized {} -> {}", page_id, file_path.display());

            let mut pages_written = 1;
            for block in &page.children {
                let Block::ChildPage { id, title } = block else {
                    continue;
                };
                let child_dir = dir.join(sanitize_title(title));
                match self
                    .materialize_page(id.clone(), child_dir, visited)
                    .await
                {
                    Ok(n) => pages_written += n,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        tracing::error!("Skipping subtree \"{}\" ({}): {}", title, id, e);
                    }
                }
            }

            Ok(pages_written)
        })
    }

    /// Enumerate local documents under the scan directories, excluding
    /// configured patterns. Order is deterministic (file-name sorted).
    pub fn collect_local_documents(&self, scan_dirs: &[PathBuf]) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for dir in scan_dirs {
            for entry in WalkDir::new(dir).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::debug!("Skipping unreadable entry under {}: {}", dir.display(), e);
                        continue;
                    }
                };
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some(DOC_EXTENSION)
                    || self.is_excluded(path)
                {
                    continue;
                }
                files.push(path.to_path_buf());
            }
        }
        files
    }

    /// Whether a path matches any configured exclusion pattern
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|p| p.matches_path(path))
    }

    /// Read a local document and push its content to the linked remote
    /// page. Returns whether a remote call was made: a document without a
    /// `remoteId` is local-only and propagation is a no-op.
    pub async fn propagate_local(&self, path: &Path) -> Result<bool> {
        let raw = tokio::fs::read_to_string(path).await?;
        let (metadata, body) = transcode::decode(&raw);
        let doc = LocalDocument {
            path: path.to_path_buf(),
            metadata,
            body,
        };

        let Some(remote_id) = doc.remote_id() else {
            tracing::debug!("Skipping unlinked document {}", path.display());
            return Ok(false);
        };

        let mut blocks = transcode::markdown_to_blocks(&doc.body);
        // The leading title heading lives in page properties remotely,
        // not in the block children
        if matches!(blocks.first(), Some(Block::Heading { level: 1, .. })) {
            blocks.remove(0);
        }

        self.store.replace_children(remote_id, &blocks).await?;
        tracing::info!("Propagated {} -> {}", path.display(), remote_id);
        Ok(true)
    }
}

/// Make a page title usable as a file or directory name.
///
/// Path separators become dashes, control characters become spaces, and
/// the result is trimmed. Empty titles fall back to `Untitled`.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "Untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    use crate::types::RemotePage;

    /// In-memory store double recording every replace-children call
    #[derive(Default)]
    struct MockStore {
        pages: HashMap<String, RemotePage>,
        replace_calls: Mutex<Vec<(String, Vec<Block>)>>,
    }

    impl MockStore {
        fn with_pages(pages: Vec<RemotePage>) -> Self {
            Self {
                pages: pages.into_iter().map(|p| (p.id.clone(), p)).collect(),
                replace_calls: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl RemoteStore for MockStore {
        async fn get_page(&self, id: &str) -> Result<RemotePage> {
            self.pages
                .get(id)
                .cloned()
                .ok_or_else(|| SyncError::NotFound(id.to_string()))
        }

        async fn replace_children(&self, id: &str, blocks: &[Block]) -> Result<()> {
            self.replace_calls
                .lock()
                .push((id.to_string(), blocks.to_vec()));
            Ok(())
        }
    }

    fn paragraph(text: &str) -> Block {
        Block::Paragraph {
            rich_text: vec![text.to_string()],
        }
    }

    fn child(id: &str, title: &str) -> Block {
        Block::ChildPage {
            id: id.to_string(),
            title: title.to_string(),
        }
    }

    fn page(id: &str, title: &str, children: Vec<Block>) -> RemotePage {
        RemotePage {
            id: id.to_string(),
            title: title.to_string(),
            children,
        }
    }

    fn walker(store: MockStore) -> (TreeWalker, Arc<Mutex<IdentityMap>>) {
        let identity = Arc::new(Mutex::new(IdentityMap::new()));
        let walker = TreeWalker::new(Arc::new(store), identity.clone(), &[]).unwrap();
        (walker, identity)
    }

    #[tokio::test]
    async fn test_materialize_root_and_child() {
        let store = MockStore::with_pages(vec![
            page("root", "Spec", vec![paragraph("Hello"), child("sub", "Sub")]),
            page("sub", "Sub", vec![]),
        ]);
        let (walker, identity) = walker(store);
        let out = tempdir().unwrap();

        let count = walker.materialize("root", out.path()).await.unwrap();
        assert_eq!(count, 2);

        let root_file = out.path().join("Spec.md");
        let raw = std::fs::read_to_string(&root_file).unwrap();
        let (meta, body) = transcode::decode(&raw);
        assert_eq!(meta[META_REMOTE_ID], json!("root"));
        assert!(meta.contains_key(META_LAST_SYNCED));
        assert_eq!(body, "# Spec\n\nHello\n\n");

        let sub_file = out.path().join("Sub").join("Sub.md");
        let (sub_meta, _) = transcode::decode(&std::fs::read_to_string(&sub_file).unwrap());
        assert_eq!(sub_meta[META_REMOTE_ID], json!("sub"));

        // Every visited page has exactly one entry and the inverse agrees
        let identity = identity.lock();
        assert_eq!(identity.len(), 2);
        assert_eq!(identity.lookup_path("root"), Some(root_file.as_path()));
        assert_eq!(identity.lookup_id(&sub_file), Some("sub"));
    }

    #[tokio::test]
    async fn test_materialize_failed_child_skips_subtree_not_siblings() {
        let store = MockStore::with_pages(vec![
            page(
                "root",
                "Root",
                vec![child("missing", "Gone"), child("kept", "Kept")],
            ),
            page("kept", "Kept", vec![]),
        ]);
        let (walker, _) = walker(store);
        let out = tempdir().unwrap();

        let count = walker.materialize("root", out.path()).await.unwrap();
        assert_eq!(count, 2);
        assert!(!out.path().join("Gone").exists());
        assert!(out.path().join("Kept").join("Kept.md").exists());
    }

    #[tokio::test]
    async fn test_materialize_cycle_terminates() {
        let store = MockStore::with_pages(vec![
            page("a", "A", vec![child("b", "B")]),
            page("b", "B", vec![child("a", "A")]),
        ]);
        let (walker, _) = walker(store);
        let out = tempdir().unwrap();

        let count = walker.materialize("a", out.path()).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_materialize_sibling_title_collision_overwrites() {
        let store = MockStore::with_pages(vec![
            page(
                "root",
                "Root",
                vec![child("first", "Notes"), child("second", "Notes")],
            ),
            page("first", "Notes", vec![paragraph("first body")]),
            page("second", "Notes", vec![paragraph("second body")]),
        ]);
        let (walker, identity) = walker(store);
        let out = tempdir().unwrap();

        walker.materialize("root", out.path()).await.unwrap();

        // Current behavior: the later sibling silently wins the shared path
        let notes = out.path().join("Notes").join("Notes.md");
        let (meta, body) = transcode::decode(&std::fs::read_to_string(&notes).unwrap());
        assert_eq!(meta[META_REMOTE_ID], json!("second"));
        assert!(body.contains("second body"));
        assert_eq!(identity.lock().lookup_id(&notes), Some("second"));
    }

    #[tokio::test]
    async fn test_collect_local_documents_filters_and_sorts() {
        let store = MockStore::default();
        let identity = Arc::new(Mutex::new(IdentityMap::new()));
        let walker = TreeWalker::new(
            Arc::new(store),
            identity,
            &["**/*.test.md".to_string(), "**/drafts/**".to_string()],
        )
        .unwrap();

        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("drafts")).unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join("a.test.md"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join("drafts").join("c.md"), "x").unwrap();

        let files = walker.collect_local_documents(&[dir.path().to_path_buf()]);
        assert_eq!(
            files,
            vec![dir.path().join("a.md"), dir.path().join("b.md")]
        );
    }

    #[tokio::test]
    async fn test_collect_missing_dir_yields_nothing() {
        let (walker, _) = walker(MockStore::default());
        let files = walker.collect_local_documents(&[PathBuf::from("/nonexistent/dir")]);
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_propagate_unlinked_document_makes_no_remote_calls() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local.md");
        std::fs::write(&path, "# Local\n\nNo header here\n").unwrap();

        let store = Arc::new(MockStore::default());
        let identity = Arc::new(Mutex::new(IdentityMap::new()));
        let walker = TreeWalker::new(store.clone(), identity, &[]).unwrap();

        let pushed = walker.propagate_local(&path).await.unwrap();
        assert!(!pushed);
        assert!(store.replace_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_propagate_linked_document_replaces_children() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Spec.md");
        let mut meta = Metadata::new();
        meta.insert(META_REMOTE_ID.to_string(), json!("root"));
        std::fs::write(
            &path,
            transcode::encode(&meta, "# Spec\n\nHello\n\n- item\n"),
        )
        .unwrap();

        let store = Arc::new(MockStore::default());
        let identity = Arc::new(Mutex::new(IdentityMap::new()));
        let walker = TreeWalker::new(store.clone(), identity, &[]).unwrap();

        let pushed = walker.propagate_local(&path).await.unwrap();
        assert!(pushed);

        let calls = store.replace_calls.lock();
        assert_eq!(calls.len(), 1);
        let (id, blocks) = &calls[0];
        assert_eq!(id, "root");
        // The title heading is stripped; body blocks survive
        assert_eq!(
            blocks,
            &vec![
                paragraph("Hello"),
                Block::BulletedListItem {
                    rich_text: vec!["item".to_string()],
                },
            ]
        );
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Spec"), "Spec");
        assert_eq!(sanitize_title("a/b\\c"), "a-b-c");
        assert_eq!(sanitize_title("  padded  "), "padded");
        assert_eq!(sanitize_title(""), "Untitled");
        assert_eq!(sanitize_title("\u{0}\t"), "Untitled");
    }

    #[test]
    fn test_bad_exclusion_pattern_is_config_error() {
        let store: Arc<dyn RemoteStore> = Arc::new(MockStore::default());
        let identity = Arc::new(Mutex::new(IdentityMap::new()));
        let err = TreeWalker::new(store, identity, &["[".to_string()]).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
