//! Message relay between the application boundary and the document store
//!
//! Both directions are fire-and-forget. Inbound (store -> application): every
//! change event becomes one message per present field, in fixed field order.
//! Outbound (application -> store): every recognized update tag becomes one
//! single-field merge-write. Nothing is coalesced, acknowledged, or retried.

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use hueport_protocol::{Envelope, Field, InfoForApp, InfoForHost, UnknownTag};
use hueport_store::{Document, DocumentPath, DocumentStore};

use crate::port::AppPort;

/// What to do with an outbound message whose tag is not recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTagPolicy {
    /// Drop the message without a trace
    #[default]
    Ignore,
    /// Drop the message and log its tag
    Warn,
    /// Stop the relay with an error naming the tag
    Fail,
}

/// Relay between one application boundary and one remote document
///
/// Without a store target the relay runs in log-only mode: startup messages
/// still go out, outbound messages are logged and dropped.
pub struct Relay {
    port: Arc<dyn AppPort>,
    target: Option<(Arc<dyn DocumentStore>, DocumentPath)>,
    startup: Vec<Envelope>,
    unknown_tags: UnknownTagPolicy,
}

impl Relay {
    /// Relay wired to a document in a store
    pub fn new(port: Arc<dyn AppPort>, store: Arc<dyn DocumentStore>, path: DocumentPath) -> Self {
        Self {
            port,
            target: Some((store, path)),
            startup: default_startup(),
            unknown_tags: UnknownTagPolicy::default(),
        }
    }

    /// Relay without a store
    pub fn log_only(port: Arc<dyn AppPort>) -> Self {
        Self {
            port,
            target: None,
            startup: default_startup(),
            unknown_tags: UnknownTagPolicy::default(),
        }
    }

    /// Replace the messages pushed once the boundary reports ready
    #[must_use]
    pub fn with_startup(mut self, startup: Vec<Envelope>) -> Self {
        self.startup = startup;
        self
    }

    #[must_use]
    pub fn with_unknown_tags(mut self, policy: UnknownTagPolicy) -> Self {
        self.unknown_tags = policy;
        self
    }

    /// Spawn the relay onto the runtime
    pub fn spawn(self) -> RelayHandle {
        RelayHandle {
            task: tokio::spawn(self.run()),
        }
    }

    /// Drive the relay until either side closes
    pub async fn run(self) -> Result<()> {
        let mut outbound = self.port.subscribe();

        let Some((store, path)) = &self.target else {
            self.port.ready().await;
            self.send_startup().await;
            loop {
                match outbound.recv().await {
                    Ok(env) => {
                        tracing::info!(envelope = %env, "No store configured, dropping outbound message");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(dropped = n, "Outbound channel lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            return Ok(());
        };

        // Watch before the initial load so no change slips between the two
        let mut events = store.watch(path).await?;

        self.port.ready().await;
        self.send_startup().await;

        // Push the stored state so the application starts from it
        match store.load(path).await {
            Ok(doc) => self.forward_snapshot(&doc).await,
            Err(e) => tracing::warn!(path = %path, error = %e, "Initial load failed"),
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.forward_snapshot(&event.document).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(dropped = n, "Change events lagged, resyncing from a fresh load");
                        match store.load(path).await {
                            Ok(doc) => self.forward_snapshot(&doc).await,
                            Err(e) => tracing::warn!(path = %path, error = %e, "Resync load failed"),
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                msg = outbound.recv() => match msg {
                    Ok(env) => self.dispatch(store.as_ref(), path, env).await?,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(dropped = n, "Outbound channel lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        Ok(())
    }

    async fn send_startup(&self) {
        for msg in &self.startup {
            if let Err(e) = self.port.send(msg.clone()).await {
                tracing::warn!(tag = %msg.tag, error = %e, "Startup send failed");
            }
        }
    }

    /// One message per present field, in fixed field order
    async fn forward_snapshot(&self, doc: &Document) {
        for field in Field::ALL {
            let Some(value) = doc.get(field.name()) else {
                tracing::debug!(field = %field, "Field missing from document, skipping");
                continue;
            };
            let msg = Envelope::from(InfoForApp::Updated {
                field,
                value: value.clone(),
            });
            if let Err(e) = self.port.send(msg).await {
                tracing::warn!(field = %field, error = %e, "Inbound send failed");
            }
        }
    }

    /// Merge-write one field, or apply the unknown-tag policy
    async fn dispatch(
        &self,
        store: &dyn DocumentStore,
        path: &DocumentPath,
        env: Envelope,
    ) -> Result<()> {
        match InfoForHost::try_from(env) {
            Ok(InfoForHost::Update { field, value }) => {
                let patch = Document::single(field.name(), value);
                if let Err(e) = store.merge(path, patch).await {
                    // Writes never surface to the application
                    tracing::warn!(path = %path, field = %field, error = %e, "Merge-write failed");
                }
                Ok(())
            }
            Err(unknown) => self.handle_unknown(&unknown),
        }
    }

    fn handle_unknown(&self, unknown: &UnknownTag) -> Result<()> {
        match self.unknown_tags {
            UnknownTagPolicy::Ignore => Ok(()),
            UnknownTagPolicy::Warn => {
                tracing::warn!(tag = %unknown.tag, "Dropping message with unrecognized tag");
                Ok(())
            }
            UnknownTagPolicy::Fail => Err(unknown.clone().into()),
        }
    }
}

fn default_startup() -> Vec<Envelope> {
    vec![Envelope::new("Get", json!({ "foo": "hallo" }))]
}

/// Owner handle for a spawned relay
pub struct RelayHandle {
    task: JoinHandle<Result<()>>,
}

impl RelayHandle {
    /// Stop the relay immediately
    pub fn shutdown(&self) {
        self.task.abort();
    }

    /// Wait for the relay to finish and return its outcome
    pub async fn join(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(anyhow::anyhow!("Relay task panicked: {e}")),
        }
    }
}
