//! WebSocket bridge to the browser application
//!
//! The compiled front-end bundle connects here. Each JSON text frame carries
//! one envelope: inbound messages fan out to every connected client, frames
//! from any client merge into the single outbound stream.
//!
//! ## Module Structure
//!
//! - `protocol`: Origin validation and the envelope <-> frame codec
//! - `connection`: WebSocket handshake and the per-connection frame pump

mod connection;
mod protocol;

pub use protocol::{validate_origin, ALLOWED_ORIGINS};

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};

use hueport_protocol::Envelope;

use crate::port::{AppPort, OUTBOUND_CAPACITY};

/// Capacity of the host -> clients fan-out channel
const INBOUND_CAPACITY: usize = 256;

/// Application boundary backed by connected WebSocket clients
///
/// Readiness means at least one client is connected. Inbound sends while no
/// client is connected are dropped, which the relay avoids by gating its
/// startup traffic on `ready`.
pub struct WsAppPort {
    inbound_tx: broadcast::Sender<Envelope>,
    outbound_tx: broadcast::Sender<Envelope>,
    ready_tx: watch::Sender<bool>,
    connections: Mutex<usize>,
}

impl Default for WsAppPort {
    fn default() -> Self {
        Self::new()
    }
}

impl WsAppPort {
    pub fn new() -> Self {
        let (inbound_tx, _) = broadcast::channel(INBOUND_CAPACITY);
        let (outbound_tx, _) = broadcast::channel(OUTBOUND_CAPACITY);
        let (ready_tx, _) = watch::channel(false);
        Self {
            inbound_tx,
            outbound_tx,
            ready_tx,
            connections: Mutex::new(0),
        }
    }

    /// Register one client; readiness flips inside the lock
    fn client_connected(&self) -> usize {
        let mut count = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *count += 1;
        self.ready_tx.send_replace(*count > 0);
        *count
    }

    fn client_disconnected(&self) -> usize {
        let mut count = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        self.ready_tx.send_replace(*count > 0);
        *count
    }

    fn subscribe_inbound(&self) -> broadcast::Receiver<Envelope> {
        self.inbound_tx.subscribe()
    }

    /// Forward one decoded client frame into the outbound stream
    fn emit(&self, env: Envelope) {
        let _ = self.outbound_tx.send(env);
    }
}

#[async_trait]
impl AppPort for WsAppPort {
    async fn send(&self, msg: Envelope) -> Result<()> {
        // Best-effort fan-out; with no client connected the message is lost
        let _ = self.inbound_tx.send(msg);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.outbound_tx.subscribe()
    }

    async fn ready(&self) {
        let mut ready_rx = self.ready_tx.subscribe();
        let _ = ready_rx.wait_for(|ready| *ready).await;
    }
}

/// Accept WebSocket connections and pump each one against `port`
pub async fn serve(port: Arc<WsAppPort>, bind: &str, ws_port: u16) -> Result<()> {
    let addr = format!("{bind}:{ws_port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "WebSocket bridge listening");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::debug!(peer = %peer, "Incoming connection");
                let port = port.clone();
                tokio::spawn(async move {
                    if let Err(e) = connection::handle_connection(stream, port).await {
                        tracing::warn!(error = %e, "Connection error");
                    }
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Accept failed");
            }
        }
    }
}
