//! Duplex message transport to one obs-websocket URL.
//!
//! [`Transport::open`] returns a [`TransportHandle`] immediately and reports
//! lifecycle asynchronously as [`TransportEvent`]s tagged with the
//! [`SessionKey`] they belong to. Every `Error` is followed by `Closed`, and
//! `Closed` is always the last event of a connection.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::domain::SessionKey;

/// Lifecycle signal from one transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// The connection is established.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// A connect, read or write failure.
    Error(String),
    /// The connection is gone; no further events follow.
    Closed,
}

/// A lifecycle signal routed to the session that owns the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    /// Owning context and session.
    pub key: SessionKey,
    /// What happened.
    pub kind: TransportEventKind,
}

/// Sender half the transports report into.
pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;

/// Command from a [`TransportHandle`] to the task driving the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    /// Send a text frame.
    Send(String),
    /// Close the connection.
    Close,
}

/// Owned handle to one transport connection.
///
/// Dropping the handle closes the connection as well: the driving task sees
/// its command channel close.
#[derive(Debug)]
pub struct TransportHandle {
    commands: mpsc::UnboundedSender<TransportCommand>,
    open: Arc<AtomicBool>,
}

/// Driver side of a [`TransportHandle`].
#[derive(Debug)]
pub struct TransportIo {
    /// Commands issued through the handle.
    pub commands: mpsc::UnboundedReceiver<TransportCommand>,
    open: Arc<AtomicBool>,
}

impl TransportIo {
    /// Marks the connection open or closed as seen through the handle.
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }
}

impl TransportHandle {
    /// Creates a connected handle/driver pair. The handle starts not open.
    #[must_use]
    pub fn pair() -> (Self, TransportIo) {
        let (commands, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        (
            Self {
                commands,
                open: Arc::clone(&open),
            },
            TransportIo { commands: rx, open },
        )
    }

    /// Queues a text frame. Returns `false` without sending when the
    /// connection is not open.
    pub fn send(&self, text: String) -> bool {
        if !self.is_open() {
            return false;
        }
        self.commands.send(TransportCommand::Send(text)).is_ok()
    }

    /// Requests the connection to close. Idempotent.
    pub fn close(&self) {
        let _ = self.commands.send(TransportCommand::Close);
    }

    /// Returns `true` while the connection is established.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.commands.is_closed()
    }
}

/// Opens transports.
pub trait Transport: fmt::Debug + Send + Sync {
    /// Starts connecting to `url`. Events for the connection are sent on
    /// `events` tagged with `key`.
    fn open(&self, url: &str, key: SessionKey, events: TransportEventSender) -> TransportHandle;
}

/// obs-websocket transport over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
}

impl WsTransport {
    /// Creates a transport whose connect attempts give up after
    /// `connect_timeout`.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str, key: SessionKey, events: TransportEventSender) -> TransportHandle {
        let (handle, io) = TransportHandle::pair();
        tokio::spawn(drive(
            url.to_string(),
            key,
            events,
            io,
            self.connect_timeout,
        ));
        handle
    }
}

async fn drive(
    url: String,
    key: SessionKey,
    events: TransportEventSender,
    mut io: TransportIo,
    connect_timeout: Duration,
) {
    let emit = |kind: TransportEventKind| {
        let _ = events.send(TransportEvent {
            key: key.clone(),
            kind,
        });
    };

    let connected = tokio::select! {
        result = tokio::time::timeout(connect_timeout, connect_async(url.as_str())) => result,
        () = close_requested(&mut io.commands) => {
            tracing::debug!(context = %key.context, %url, "closed before connect finished");
            emit(TransportEventKind::Closed);
            return;
        }
    };

    let ws = match connected {
        Ok(Ok((ws, _response))) => ws,
        Ok(Err(e)) => {
            emit(TransportEventKind::Error(e.to_string()));
            emit(TransportEventKind::Closed);
            return;
        }
        Err(_) => {
            emit(TransportEventKind::Error(format!(
                "connect timed out after {} ms",
                connect_timeout.as_millis()
            )));
            emit(TransportEventKind::Closed);
            return;
        }
    };

    io.set_open(true);
    emit(TransportEventKind::Opened);
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        emit(TransportEventKind::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        emit(TransportEventKind::Error(e.to_string()));
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            command = io.commands.recv() => {
                match command {
                    Some(TransportCommand::Send(text)) => {
                        if let Err(e) = ws_tx.send(Message::text(text)).await {
                            emit(TransportEventKind::Error(e.to_string()));
                            break;
                        }
                    }
                    Some(TransportCommand::Close) | None => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    io.set_open(false);
    emit(TransportEventKind::Closed);
}

/// Resolves once the handle asks for a close or is dropped.
async fn close_requested(commands: &mut mpsc::UnboundedReceiver<TransportCommand>) {
    while let Some(command) = commands.recv().await {
        if command == TransportCommand::Close {
            return;
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ContextId, SessionId};

    #[test]
    fn send_on_unopened_handle_is_noop() {
        let (handle, mut io) = TransportHandle::pair();
        assert!(!handle.is_open());
        assert!(!handle.send("{}".into()));
        assert!(io.commands.try_recv().is_err());
    }

    #[test]
    fn send_after_open_reaches_driver() {
        let (handle, mut io) = TransportHandle::pair();
        io.set_open(true);
        assert!(handle.is_open());
        assert!(handle.send("hello".into()));
        assert_eq!(
            io.commands.try_recv().ok(),
            Some(TransportCommand::Send("hello".into()))
        );
    }

    #[test]
    fn handle_reports_closed_when_driver_is_gone() {
        let (handle, io) = TransportHandle::pair();
        io.set_open(true);
        drop(io);
        assert!(!handle.is_open());
        assert!(!handle.send("late".into()));
        handle.close();
    }

    #[tokio::test]
    async fn unreachable_url_reports_error_then_closed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let key = SessionKey::new(ContextId::new("ctx"), SessionId::new());
        let transport = WsTransport::new(Duration::from_secs(2));
        // Port 9 (discard) on loopback is not a WebSocket server.
        let handle = transport.open("ws://127.0.0.1:9", key.clone(), tx);

        let Some(first) = rx.recv().await else {
            panic!("expected an event");
        };
        assert_eq!(first.key, key);
        assert!(matches!(first.kind, TransportEventKind::Error(_)));
        let Some(second) = rx.recv().await else {
            panic!("expected a close");
        };
        assert_eq!(second.kind, TransportEventKind::Closed);
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn close_before_connect_never_opens() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let key = SessionKey::new(ContextId::new("ctx"), SessionId::new());
        let transport = WsTransport::new(Duration::from_secs(30));
        let handle = transport.open("ws://10.255.255.1:4455", key, tx);
        handle.close();

        loop {
            let Some(event) = rx.recv().await else {
                panic!("channel closed before Closed was reported");
            };
            assert_ne!(event.kind, TransportEventKind::Opened);
            if event.kind == TransportEventKind::Closed {
                break;
            }
        }
        assert!(!handle.is_open());
    }
}
