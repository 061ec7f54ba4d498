//! In-memory collaborators for unit tests: a transport that never touches
//! the network and a host that records every command.
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::domain::{ContextId, PersistedSettings, SessionKey};
use crate::error::BridgeError;
use crate::host::{HostSink, InspectorMessage};
use crate::obs::transport::{TransportCommand, TransportIo};
use crate::obs::{Transport, TransportEvent, TransportEventKind, TransportEventSender, TransportHandle};
use crate::service::display::DisplayNotifier;
use crate::service::session_manager::SessionManager;

/// One connection opened through [`MockTransport`].
#[derive(Debug)]
pub(crate) struct MockConnection {
    pub url: String,
    pub key: SessionKey,
    io: TransportIo,
    log: Vec<TransportCommand>,
}

impl MockConnection {
    fn drain(&mut self) {
        while let Ok(command) = self.io.commands.try_recv() {
            self.log.push(command);
        }
    }
}

/// Transport whose connections are driven by the test.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    connections: Mutex<Vec<MockConnection>>,
}

impl MockTransport {
    fn lock(&self) -> MutexGuard<'_, Vec<MockConnection>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with<R>(&self, index: usize, f: impl FnOnce(&mut MockConnection) -> R) -> R {
        let mut connections = self.lock();
        let Some(conn) = connections.get_mut(index) else {
            panic!("no connection #{index}");
        };
        conn.drain();
        f(conn)
    }

    pub fn open_count(&self) -> usize {
        self.lock().len()
    }

    pub fn key(&self, index: usize) -> SessionKey {
        self.with(index, |c| c.key.clone())
    }

    pub fn url(&self, index: usize) -> String {
        self.with(index, |c| c.url.clone())
    }

    /// Marks the connection established.
    pub fn accept(&self, index: usize) {
        self.with(index, |c| c.io.set_open(true));
    }

    /// Marks the connection lost without telling the session.
    pub fn sever(&self, index: usize) {
        self.with(index, |c| c.io.set_open(false));
    }

    /// Text frames sent so far on the connection.
    pub fn sent(&self, index: usize) -> Vec<String> {
        self.with(index, |c| {
            c.log
                .iter()
                .filter_map(|cmd| match cmd {
                    TransportCommand::Send(text) => Some(text.clone()),
                    TransportCommand::Close => None,
                })
                .collect()
        })
    }

    /// Sent frames parsed as JSON.
    pub fn sent_json(&self, index: usize) -> Vec<serde_json::Value> {
        self.sent(index)
            .iter()
            .map(|text| {
                let Ok(value) = serde_json::from_str(text) else {
                    panic!("sent frame is not JSON: {text}");
                };
                value
            })
            .collect()
    }

    pub fn close_requested(&self, index: usize) -> bool {
        self.with(index, |c| c.log.contains(&TransportCommand::Close))
    }

    /// Builds an event as the connection's driver would report it.
    pub fn event(&self, index: usize, kind: TransportEventKind) -> TransportEvent {
        TransportEvent {
            key: self.key(index),
            kind,
        }
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &str, key: SessionKey, _events: TransportEventSender) -> TransportHandle {
        let (handle, io) = TransportHandle::pair();
        self.lock().push(MockConnection {
            url: url.to_string(),
            key,
            io,
            log: Vec::new(),
        });
        handle
    }
}

/// Command recorded by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HostCall {
    Title(ContextId, String),
    Settings(ContextId, PersistedSettings),
    Inspector(ContextId, InspectorMessage),
    ShowOk(ContextId),
}

/// Host that records commands, optionally failing title updates.
#[derive(Debug, Default)]
pub(crate) struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    fail_titles: AtomicBool,
}

impl RecordingHost {
    fn record(&self, call: HostCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    pub fn fail_titles(&self, fail: bool) {
        self.fail_titles.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn last_title(&self, context: &ContextId) -> Option<String> {
        self.calls().into_iter().rev().find_map(|call| match call {
            HostCall::Title(ctx, title) if &ctx == context => Some(title),
            _ => None,
        })
    }

    pub fn last_settings(&self, context: &ContextId) -> Option<PersistedSettings> {
        self.calls().into_iter().rev().find_map(|call| match call {
            HostCall::Settings(ctx, settings) if &ctx == context => Some(settings),
            _ => None,
        })
    }
}

impl HostSink for RecordingHost {
    fn set_title(&self, context: &ContextId, title: &str) -> Result<(), BridgeError> {
        if self.fail_titles.load(Ordering::SeqCst) {
            return Err(BridgeError::HostUnavailable("title rejected".into()));
        }
        self.record(HostCall::Title(context.clone(), title.to_string()));
        Ok(())
    }

    fn set_settings(
        &self,
        context: &ContextId,
        settings: &PersistedSettings,
    ) -> Result<(), BridgeError> {
        self.record(HostCall::Settings(context.clone(), settings.clone()));
        Ok(())
    }

    fn send_to_inspector(
        &self,
        context: &ContextId,
        _action: Option<&str>,
        message: &InspectorMessage,
    ) -> Result<(), BridgeError> {
        self.record(HostCall::Inspector(context.clone(), message.clone()));
        Ok(())
    }

    fn show_ok(&self, context: &ContextId) -> Result<(), BridgeError> {
        self.record(HostCall::ShowOk(context.clone()));
        Ok(())
    }
}

/// A [`SessionManager`] wired to the in-memory collaborators.
#[derive(Debug)]
pub(crate) struct Harness {
    pub transport: Arc<MockTransport>,
    pub host: Arc<RecordingHost>,
    pub sessions: SessionManager,
    _transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Harness {
    pub fn new() -> Self {
        let transport = Arc::new(MockTransport::default());
        let host = Arc::new(RecordingHost::default());
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let display = DisplayNotifier::new(Arc::clone(&host) as Arc<dyn HostSink>, "?");
        let sessions = SessionManager::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            transport_tx,
            display,
        );
        Self {
            transport,
            host,
            sessions,
            _transport_rx: transport_rx,
        }
    }

    /// Delivers `kind` as if reported by connection `index`.
    pub fn deliver(&mut self, index: usize, kind: TransportEventKind) {
        let event = self.transport.event(index, kind);
        self.sessions.handle_transport_event(event);
    }

    /// Accepts connection `index` and walks it through an unauthenticated
    /// Hello/Identified exchange.
    pub fn authenticate(&mut self, index: usize) {
        self.transport.accept(index);
        self.deliver(index, TransportEventKind::Opened);
        self.deliver(index, TransportEventKind::Message(HELLO.to_string()));
        self.deliver(index, TransportEventKind::Message(IDENTIFIED.to_string()));
    }

    pub fn render(&self, context: &ContextId) -> String {
        let Some(state) = self.sessions.render(context) else {
            panic!("unknown context {context}");
        };
        state.text
    }
}

/// Hello without an authentication challenge.
pub(crate) const HELLO: &str =
    r#"{"op":0,"d":{"obsWebSocketVersion":"5.4.2","rpcVersion":1}}"#;

/// Identified.
pub(crate) const IDENTIFIED: &str = r#"{"op":2,"d":{"negotiatedRpcVersion":1}}"#;
