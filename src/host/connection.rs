//! WebSocket link to the host application.
//!
//! Connects to the host's local server, sends the registration frame and
//! then pumps frames both ways until the host goes away: inbound events are
//! parsed and forwarded to the dispatcher, queued outbound frames are
//! written in order.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::messages::{InboundEvent, Registration};
use crate::error::BridgeError;

/// Runs the host link until the host closes the connection.
///
/// # Errors
///
/// Returns [`BridgeError::HostRegistration`] if the connection cannot be
/// established or the registration frame cannot be sent, and
/// [`BridgeError::Transport`] if the socket fails afterwards.
pub async fn run_host_link(
    url: &str,
    registration: &Registration,
    host_events: mpsc::UnboundedSender<InboundEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) -> Result<(), BridgeError> {
    let (ws, _response) = connect_async(url)
        .await
        .map_err(|e| BridgeError::HostRegistration(format!("connect to {url}: {e}")))?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    let frame = serde_json::to_string(registration)?;
    ws_tx
        .send(Message::text(frame))
        .await
        .map_err(|e| BridgeError::HostRegistration(format!("send registration: {e}")))?;
    tracing::info!(%url, uuid = %registration.uuid, "registered with host");

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match InboundEvent::parse(text.as_str()) {
                        Ok(InboundEvent::Other) => {}
                        Ok(event) => {
                            if host_events.send(event).is_err() {
                                tracing::debug!("dispatcher gone, closing host link");
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "discarding malformed host frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => return Err(BridgeError::Transport(e.to_string())),
                    Some(Ok(_)) => {}
                }
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                ws_tx
                    .send(Message::text(frame))
                    .await
                    .map_err(|e| BridgeError::Transport(e.to_string()))?;
            }
        }
    }

    tracing::info!("host link closed");
    Ok(())
}
