//! In-memory document store
//!
//! Ephemeral store useful for development and for tests that need
//! merge/watch semantics without any I/O. All documents are lost when
//! the store is dropped.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use super::backend::{DocumentStore, WatchRegistry};
use super::document::{Document, DocumentEvent, DocumentPath};

/// In-memory document store
///
/// Thread-safe via internal RwLock.
pub struct MemoryStore {
    documents: RwLock<HashMap<String, Document>>,
    watchers: WatchRegistry,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            watchers: WatchRegistry::new(),
        }
    }

    /// Create with initial documents
    pub fn with_documents(docs: Vec<(DocumentPath, Document)>) -> Self {
        let documents = docs
            .into_iter()
            .map(|(path, doc)| (path.to_string(), doc))
            .collect();
        Self {
            documents: RwLock::new(documents),
            watchers: WatchRegistry::new(),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, path: &DocumentPath) -> Result<Document> {
        let documents = self
            .documents
            .read()
            .map_err(|_| anyhow::anyhow!("Lock poisoned"))?;
        Ok(documents.get(&path.to_string()).cloned().unwrap_or_default())
    }

    async fn merge(&self, path: &DocumentPath, patch: Document) -> Result<()> {
        let snapshot = {
            let mut documents = self
                .documents
                .write()
                .map_err(|_| anyhow::anyhow!("Lock poisoned"))?;
            let doc = documents.entry(path.to_string()).or_default();
            doc.apply(&patch);
            doc.clone()
        };
        self.watchers.notify(path, snapshot)
    }

    async fn watch(&self, path: &DocumentPath) -> Result<broadcast::Receiver<DocumentEvent>> {
        self.watchers.subscribe(path)
    }
}
