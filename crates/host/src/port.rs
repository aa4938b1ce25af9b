//! Application boundary
//!
//! The compiled front-end application sits behind the [`AppPort`] trait as an
//! opaque producer and consumer of tagged messages. The host pushes messages
//! in and subscribes to whatever comes out; it never awaits a reply.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};

use hueport_protocol::Envelope;

/// Capacity of the application -> host broadcast channel
pub(crate) const OUTBOUND_CAPACITY: usize = 256;

/// The application boundary as seen from the host
///
/// `send` is fire-and-forget. Transports that cannot buffer may drop messages
/// pushed before `ready` resolves, so callers gate their first send on it.
#[async_trait]
pub trait AppPort: Send + Sync {
    /// Push one message into the application
    async fn send(&self, msg: Envelope) -> Result<()>;

    /// Subscribe to messages the application emits
    fn subscribe(&self) -> broadcast::Receiver<Envelope>;

    /// Resolves once the application can accept messages
    async fn ready(&self);
}

/// Host side of an in-process application boundary
pub struct ChannelPort {
    inbound_tx: mpsc::UnboundedSender<Envelope>,
    outbound_tx: broadcast::Sender<Envelope>,
    ready_rx: watch::Receiver<bool>,
}

/// Application side of an in-process boundary, used by tests and embedding
pub struct AppHandle {
    inbound: mpsc::UnboundedReceiver<Envelope>,
    outbound_tx: broadcast::Sender<Envelope>,
    ready_tx: watch::Sender<bool>,
}

/// Create a connected in-process boundary pair
///
/// The host -> application direction is unbounded: messages queue in send
/// order until the application drains them, nothing is coalesced or dropped.
pub fn channel_port() -> (ChannelPort, AppHandle) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, _) = broadcast::channel(OUTBOUND_CAPACITY);
    let (ready_tx, ready_rx) = watch::channel(false);
    (
        ChannelPort {
            inbound_tx,
            outbound_tx: outbound_tx.clone(),
            ready_rx,
        },
        AppHandle {
            inbound: inbound_rx,
            outbound_tx,
            ready_tx,
        },
    )
}

#[async_trait]
impl AppPort for ChannelPort {
    async fn send(&self, msg: Envelope) -> Result<()> {
        self.inbound_tx
            .send(msg)
            .map_err(|_| anyhow::anyhow!("Application side of the boundary is gone"))
    }

    fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.outbound_tx.subscribe()
    }

    async fn ready(&self) {
        let mut ready_rx = self.ready_rx.clone();
        let _ = ready_rx.wait_for(|ready| *ready).await;
    }
}

impl AppHandle {
    /// Mark the application as mounted and able to accept messages
    pub fn set_ready(&self) {
        self.ready_tx.send_replace(true);
    }

    /// Next message from the host, in send order
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.inbound.recv().await
    }

    /// Pop a queued message without waiting
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.inbound.try_recv().ok()
    }

    /// Emit one message toward the host
    pub fn emit(&self, msg: Envelope) {
        let _ = self.outbound_tx.send(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_messages_queue_in_send_order() {
        let (port, mut app) = channel_port();

        for tag in ["First", "Second", "Third"] {
            port.send(Envelope::new(tag, json!(null))).await.unwrap();
        }

        assert_eq!(app.recv().await.unwrap().tag, "First");
        assert_eq!(app.recv().await.unwrap().tag, "Second");
        assert_eq!(app.recv().await.unwrap().tag, "Third");
    }

    #[tokio::test]
    async fn test_ready_unblocks_waiters() {
        let (port, app) = channel_port();

        let waiter = tokio::spawn(async move {
            port.ready().await;
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        app.set_ready();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_emitted_messages_reach_subscribers() {
        let (port, app) = channel_port();
        let mut rx = port.subscribe();

        app.emit(Envelope::new("UpdateRed", json!(200)));

        let env = rx.recv().await.unwrap();
        assert_eq!(env.tag, "UpdateRed");
        assert_eq!(env.data, json!(200));
    }

    #[tokio::test]
    async fn test_send_fails_once_app_is_gone() {
        let (port, app) = channel_port();
        drop(app);

        assert!(port.send(Envelope::new("Get", json!(null))).await.is_err());
    }
}
