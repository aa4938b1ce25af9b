use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use super::document::{Document, DocumentEvent, DocumentPath};

/// Watch channel capacity per document
const WATCH_CAPACITY: usize = 64;

/// Document store trait - all remote-document operations go through this
///
/// This trait uses `async_trait` so network-backed stores can implement it.
/// Writes are merge-writes throughout: a store never replaces a document
/// wholesale on behalf of a caller.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the current document. A document that does not exist yet loads
    /// as the empty document.
    async fn load(&self, path: &DocumentPath) -> Result<Document>;

    /// Set the fields present in `patch`, leaving all other stored fields
    /// unchanged.
    async fn merge(&self, path: &DocumentPath, patch: Document) -> Result<()>;

    /// Subscribe to change notifications for one document. Each event
    /// carries the full post-change snapshot; no event replays the state
    /// at subscription time (callers `load` for that).
    async fn watch(&self, path: &DocumentPath) -> Result<broadcast::Receiver<DocumentEvent>>;
}

/// Per-document broadcast channels, shared by the built-in backends
pub struct WatchRegistry {
    channels: Mutex<HashMap<String, broadcast::Sender<DocumentEvent>>>,
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Get a receiver for `path`, creating the channel on first use
    pub fn subscribe(&self, path: &DocumentPath) -> Result<broadcast::Receiver<DocumentEvent>> {
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| anyhow::anyhow!("Lock poisoned"))?;
        let tx = channels
            .entry(path.to_string())
            .or_insert_with(|| broadcast::channel(WATCH_CAPACITY).0);
        Ok(tx.subscribe())
    }

    /// Send the post-change snapshot to watchers of `path`, if any
    pub fn notify(&self, path: &DocumentPath, document: Document) -> Result<()> {
        let channels = self
            .channels
            .lock()
            .map_err(|_| anyhow::anyhow!("Lock poisoned"))?;
        if let Some(tx) = channels.get(&path.to_string()) {
            let _ = tx.send(DocumentEvent {
                path: path.clone(),
                document,
            });
        }
        Ok(())
    }
}
