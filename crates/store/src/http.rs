//! HTTP document store
//!
//! Talks to a document service's REST surface: `GET {base}/{collection}/{id}`
//! returns the document as a JSON object (404 means it does not exist yet),
//! `PATCH` with a JSON object body merge-writes fields; the service owns the
//! merge. Change watching is poll-based and therefore eventually consistent.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::broadcast;

use super::backend::{DocumentStore, WatchRegistry};
use super::document::{Document, DocumentEvent, DocumentPath};

/// Remote document store over HTTP
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    watchers: Arc<WatchRegistry>,
    /// Latest snapshot seen per document, shared with the poll tasks
    snapshots: Arc<Mutex<HashMap<String, Document>>>,
    /// Documents that already have a poll task
    polled: Mutex<HashSet<String>>,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            poll_interval,
            watchers: Arc::new(WatchRegistry::new()),
            snapshots: Arc::new(Mutex::new(HashMap::new())),
            polled: Mutex::new(HashSet::new()),
        }
    }

    /// Resolve a document path to its URL
    fn resolve_url(&self, path: &DocumentPath) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            path.collection,
            path.id
        )
    }

    fn record_snapshot(&self, path: &DocumentPath, document: &Document) -> Result<()> {
        let mut snapshots = self
            .snapshots
            .lock()
            .map_err(|_| anyhow::anyhow!("Lock poisoned"))?;
        snapshots.insert(path.to_string(), document.clone());
        Ok(())
    }

    fn spawn_poller(&self, path: DocumentPath) {
        let client = self.client.clone();
        let url = self.resolve_url(&path);
        let interval = self.poll_interval;
        let watchers = Arc::clone(&self.watchers);
        let snapshots = Arc::clone(&self.snapshots);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let doc = match fetch_document(&client, &url).await {
                    Ok(doc) => doc,
                    Err(e) => {
                        tracing::warn!(url, error = %e, "document poll failed");
                        continue;
                    }
                };

                let notify = match snapshots.lock() {
                    Ok(mut guard) => {
                        let key = path.to_string();
                        match guard.get(&key) {
                            // First sighting is the baseline, not a change
                            None => {
                                guard.insert(key, doc.clone());
                                false
                            }
                            Some(prev) if *prev == doc => false,
                            Some(_) => {
                                guard.insert(key, doc.clone());
                                true
                            }
                        }
                    }
                    Err(_) => {
                        tracing::warn!("snapshot lock poisoned, stopping poll task");
                        return;
                    }
                };

                if notify {
                    if let Err(e) = watchers.notify(&path, doc) {
                        tracing::warn!(error = %e, "failed to notify watchers");
                    }
                }
            }
        });
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn load(&self, path: &DocumentPath) -> Result<Document> {
        let doc = fetch_document(&self.client, &self.resolve_url(path)).await?;
        // Loads refresh the poll baseline so the next poll only reports
        // changes newer than what the caller just saw
        self.record_snapshot(path, &doc)?;
        Ok(doc)
    }

    async fn merge(&self, path: &DocumentPath, patch: Document) -> Result<()> {
        let url = self.resolve_url(path);
        let response = self
            .client
            .patch(&url)
            .json(&patch)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("HTTP request failed: {e}"))?;
        if !response.status().is_success() {
            bail!("HTTP {} for {}", response.status(), url);
        }

        // Fetch the merged result so watchers see the full document
        let doc = fetch_document(&self.client, &url).await?;
        self.record_snapshot(path, &doc)?;
        self.watchers.notify(path, doc)
    }

    async fn watch(&self, path: &DocumentPath) -> Result<broadcast::Receiver<DocumentEvent>> {
        let rx = self.watchers.subscribe(path)?;
        let mut polled = self
            .polled
            .lock()
            .map_err(|_| anyhow::anyhow!("Lock poisoned"))?;
        if polled.insert(path.to_string()) {
            self.spawn_poller(path.clone());
        }
        Ok(rx)
    }
}

/// GET a document, mapping 404 to the empty document
async fn fetch_document(client: &reqwest::Client, url: &str) -> Result<Document> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("HTTP request failed: {e}"))?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(Document::new());
    }
    if !response.status().is_success() {
        bail!("HTTP {} for {}", response.status(), url);
    }

    let value: serde_json::Value = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read response: {e}"))?;
    match Document::try_from(value) {
        Ok(doc) => Ok(doc),
        Err(_) => {
            tracing::warn!(url, "document body is not a JSON object, treating as empty");
            Ok(Document::new())
        }
    }
}
