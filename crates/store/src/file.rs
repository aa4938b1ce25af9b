//! JSON-file document store
//!
//! Persists each document as pretty-printed JSON under
//! `<root>/<collection>/<id>.json`. Change notifications reach watchers
//! within this process only; no cross-process watching is attempted.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};

use super::backend::{DocumentStore, WatchRegistry};
use super::document::{Document, DocumentEvent, DocumentPath};

/// File-backed document store
pub struct FileStore {
    root: PathBuf,
    watchers: WatchRegistry,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a file store rooted at `root` (created on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            watchers: WatchRegistry::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Resolve a document path to its file, rejecting path escapes
    fn resolve(&self, path: &DocumentPath) -> Result<PathBuf> {
        for part in [&path.collection, &path.id] {
            if part.is_empty()
                || part.contains('/')
                || part.contains('\\')
                || part == "."
                || part == ".."
            {
                bail!("Path traversal blocked: {path} escapes store root");
            }
        }
        Ok(self
            .root
            .join(&path.collection)
            .join(format!("{}.json", path.id)))
    }

    async fn read_document(&self, path: &DocumentPath) -> Result<Document> {
        let file = self.resolve(path)?;
        let bytes = match tokio::fs::read(&file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(e).context(format!("Failed to read {}", file.display())),
        };
        match serde_json::from_slice(&bytes) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                tracing::warn!(
                    file = %file.display(),
                    error = %e,
                    "document file is not a JSON object, treating as empty"
                );
                Ok(Document::new())
            }
        }
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn load(&self, path: &DocumentPath) -> Result<Document> {
        self.read_document(path).await
    }

    async fn merge(&self, path: &DocumentPath, patch: Document) -> Result<()> {
        let file = self.resolve(path)?;
        let _guard = self.write_lock.lock().await;

        let mut doc = self.read_document(path).await?;
        doc.apply(&patch);

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create collection directory")?;
        }
        let json = serde_json::to_string_pretty(&doc)?;
        tokio::fs::write(&file, json)
            .await
            .context(format!("Failed to write {}", file.display()))?;

        self.watchers.notify(path, doc)
    }

    async fn watch(&self, path: &DocumentPath) -> Result<broadcast::Receiver<DocumentEvent>> {
        self.watchers.subscribe(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn path() -> DocumentPath {
        DocumentPath::new("colors", "mixer")
    }

    #[tokio::test]
    async fn test_merge_persists_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = FileStore::new(dir.path());
            store
                .merge(&path(), Document::single("red", json!(42)))
                .await
                .unwrap();
            store
                .merge(&path(), Document::single("blue", json!(7)))
                .await
                .unwrap();
        }

        let store = FileStore::new(dir.path());
        let doc = store.load(&path()).await.unwrap();
        assert_eq!(doc.get("red"), Some(&json!(42)));
        assert_eq!(doc.get("blue"), Some(&json!(7)));
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load(&path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("colors").join("mixer.json");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"not json {").unwrap();

        let store = FileStore::new(dir.path());
        assert!(store.load(&path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_path_escape_is_rejected() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let escape = DocumentPath::new("colors", "../../evil");
        assert!(store.load(&escape).await.is_err());
        assert!(store
            .merge(&escape, Document::single("red", json!(1)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_watch_observes_merges() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let mut events = store.watch(&path()).await.unwrap();

        store
            .merge(&path(), Document::single("distance", json!(3.5)))
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.document.get("distance"), Some(&json!(3.5)));
    }
}
