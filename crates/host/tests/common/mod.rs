//! Common test utilities
#![allow(dead_code)] // Helpers are shared; not every test file uses all of them

use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use hueport_host::port::AppHandle;
use hueport_protocol::Envelope;
use hueport_store::{Document, DocumentEvent, DocumentPath, DocumentStore, MemoryStore};

/// Store wrapper that records every merge-write it receives
pub struct RecordingStore {
    inner: MemoryStore,
    merges: Mutex<Vec<(DocumentPath, Document)>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            merges: Mutex::new(Vec::new()),
        }
    }

    pub fn with_documents(docs: Vec<(DocumentPath, Document)>) -> Self {
        Self {
            inner: MemoryStore::with_documents(docs),
            merges: Mutex::new(Vec::new()),
        }
    }

    pub fn merges(&self) -> Vec<(DocumentPath, Document)> {
        self.merges.lock().unwrap().clone()
    }

    pub fn merge_count(&self) -> usize {
        self.merges.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn load(&self, path: &DocumentPath) -> Result<Document> {
        self.inner.load(path).await
    }

    async fn merge(&self, path: &DocumentPath, patch: Document) -> Result<()> {
        self.merges
            .lock()
            .unwrap()
            .push((path.clone(), patch.clone()));
        self.inner.merge(path, patch).await
    }

    async fn watch(&self, path: &DocumentPath) -> Result<broadcast::Receiver<DocumentEvent>> {
        self.inner.watch(path).await
    }
}

/// Receive the next host -> app message, panicking instead of hanging
pub async fn next_message(app: &mut AppHandle) -> Envelope {
    tokio::time::timeout(Duration::from_secs(5), app.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("application boundary closed")
}

/// Wait until the store has seen at least `n` merges
pub async fn wait_for_merges(store: &RecordingStore, n: usize) {
    for _ in 0..500 {
        if store.merge_count() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {n} merges, saw {}", store.merge_count());
}

/// Give spawned relay tasks a chance to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
