//! WebSocket connection handling
//!
//! Performs the handshake with origin validation, then pumps frames between
//! the socket and the shared port channels until either side closes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;

use super::protocol::{decode_frame, encode_frame, validate_origin};
use super::WsAppPort;

/// Connection metadata extracted during WebSocket handshake
#[derive(Debug, Clone, Default)]
struct ConnectionInfo {
    origin: Option<String>,
    origin_valid: bool,
}

/// Keepalive ping interval
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Handle a single WebSocket connection
pub async fn handle_connection<S>(stream: S, port: Arc<WsAppPort>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    // Capture connection info during handshake
    let conn_info = Arc::new(std::sync::Mutex::new(ConnectionInfo::default()));
    let conn_info_clone = conn_info.clone();

    let callback = move |req: &Request,
                         response: Response|
          -> std::result::Result<Response, http::Response<Option<String>>> {
        let Ok(mut info) = conn_info_clone.lock() else {
            return Ok(response);
        };

        // Extract and validate origin
        if let Some(origin) = req.headers().get("origin") {
            if let Ok(origin_str) = origin.to_str() {
                info.origin = Some(origin_str.to_string());
                info.origin_valid = validate_origin(origin_str);
            }
        } else {
            // No origin header = same-origin request (OK)
            info.origin_valid = true;
        }

        Ok(response)
    };

    let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    // Check origin validation result
    let info = conn_info
        .lock()
        .map_err(|_| anyhow::anyhow!("Lock poisoned"))?
        .clone();
    if !info.origin_valid {
        tracing::warn!(origin = ?info.origin, "Rejected connection from invalid origin");
        let _ = ws_tx.close().await;
        return Err(anyhow::anyhow!("Invalid origin"));
    }

    // Subscribe before flipping readiness so nothing slips past this client
    let mut inbound_rx = port.subscribe_inbound();
    let clients = port.client_connected();
    tracing::info!(clients, "Application connected");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // First tick fires immediately

    loop {
        tokio::select! {
            // Host -> application
            msg = inbound_rx.recv() => match msg {
                Ok(env) => match encode_frame(&env) {
                    Ok(frame) => {
                        if ws_tx.send(frame).await.is_err() {
                            tracing::debug!("Send failed, closing connection");
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(tag = %env.tag, error = %e, "Frame encode failed"),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(dropped_messages = n, "Client fell behind the inbound stream");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            // Heartbeat tick - send ping to keep connection alive
            _ = heartbeat.tick() => {
                if ws_tx.send(Message::Ping(vec![])).await.is_err() {
                    tracing::debug!("Ping send failed, closing connection");
                    break;
                }
            }

            // Application -> host
            frame = ws_rx.next() => match frame {
                Some(Ok(msg)) => match decode_frame(&msg) {
                    Some(Ok(env)) => port.emit(env),
                    Some(Err(e)) => tracing::warn!(error = %e, "Dropping malformed frame"),
                    None => {
                        if matches!(msg, Message::Close(_)) {
                            break;
                        }
                        // Pings, pongs and binary frames are ignored
                    }
                },
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket error");
                    break;
                }
                None => break,
            },
        }
    }

    let clients = port.client_disconnected();
    tracing::info!(clients, "Application disconnected");
    Ok(())
}
