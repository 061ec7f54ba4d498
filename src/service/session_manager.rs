//! Reconciles each context's OBS session with its configuration and
//! applies transport events to sessions.
//!
//! [`SessionManager`] owns the [`ContextRegistry`]. Every operation runs
//! on the dispatcher task, one at a time, so no locking is involved.
//! Status changes fan out as display refreshes to every context sharing
//! the affected URL.

use std::sync::Arc;

use crate::domain::{
    ContextConfig, ContextId, ContextRegistry, Session, SessionId, SessionKey, SessionStatus,
};
use crate::obs::protocol;
use crate::obs::{HandshakeAction, Transport, TransportEvent, TransportEventKind, TransportEventSender};

use super::display::{DisplayNotifier, DisplayState};

/// What [`SessionManager::reconcile`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A new session was started (replacing any previous one).
    Opened,
    /// The authenticated session already matches the configuration.
    Kept,
    /// The context no longer needs a session; the old one was closed.
    Closed,
    /// The context needs no session and had none.
    Inactive,
    /// No such context.
    UnknownContext,
}

/// Owner of all contexts and their sessions.
#[derive(Debug)]
pub struct SessionManager {
    registry: ContextRegistry,
    transport: Arc<dyn Transport>,
    transport_events: TransportEventSender,
    display: DisplayNotifier,
    next_request_id: u64,
}

impl SessionManager {
    /// Creates a manager with no contexts. Sessions it opens report on
    /// `transport_events`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        transport_events: TransportEventSender,
        display: DisplayNotifier,
    ) -> Self {
        Self {
            registry: ContextRegistry::new(),
            transport,
            transport_events,
            display,
            next_request_id: 0,
        }
    }

    /// Read access to the registry.
    #[must_use]
    pub const fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    /// Write access to the registry for non-session state.
    pub fn registry_mut(&mut self) -> &mut ContextRegistry {
        &mut self.registry
    }

    /// Caches `config` for `context` (creating the context if needed) and
    /// reconciles its session.
    pub fn apply_config(&mut self, context: &ContextId, config: ContextConfig) -> ReconcileOutcome {
        self.registry.upsert(context, config);
        self.reconcile(context)
    }

    /// Brings the context's session in line with its cached configuration.
    ///
    /// A session is opened when none exists, when URL or input differ, or
    /// when the current one is not authenticated. An authenticated session
    /// with matching URL and input is left alone, so repeated calls with
    /// unchanged configuration do no transport work.
    pub fn reconcile(&mut self, context: &ContextId) -> ReconcileOutcome {
        let Some(record) = self.registry.get_mut(context) else {
            return ReconcileOutcome::UnknownContext;
        };
        let config = record.config().clone();

        if !config.requires_obs() {
            return match record.session.take() {
                Some(mut session) => {
                    session.close();
                    tracing::info!(%context, session = %session.id, "OBS session closed");
                    ReconcileOutcome::Closed
                }
                None => ReconcileOutcome::Inactive,
            };
        }

        let replace = record.session.as_ref().is_none_or(|s| {
            s.url != config.url || s.target_field != config.target_field || !s.is_authenticated()
        });
        if !replace {
            return ReconcileOutcome::Kept;
        }

        if let Some(mut old) = record.session.take() {
            tracing::debug!(
                %context,
                session = %old.id,
                status = %old.status(),
                age_ms = old.age().num_milliseconds(),
                "replacing OBS session"
            );
            old.close();
        }

        let id = SessionId::new();
        let handle = self.transport.open(
            &config.url,
            SessionKey::new(context.clone(), id),
            self.transport_events.clone(),
        );
        tracing::info!(%context, session = %id, url = %config.url, "opening OBS session");
        let session = Session::new(id, &config.url, &config.target_field, &config.credential, handle);
        record.session = Some(session);
        ReconcileOutcome::Opened
    }

    /// Sends a `SetInputSettings` request carrying `value` as text. Returns
    /// `false` without sending when the session is not authenticated.
    /// Nothing is queued; the value is resent after the next
    /// authentication.
    pub fn set_target_value(&mut self, context: &ContextId, value: i64) -> bool {
        let Some(session) = self
            .registry
            .get(context)
            .and_then(|r| r.session.as_ref())
            .filter(|s| s.is_authenticated())
        else {
            return false;
        };
        self.next_request_id += 1;
        let frame = match protocol::set_text_frame(self.next_request_id, &session.target_field, value.to_string()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%context, error = %e, "cannot encode OBS request, update dropped");
                return false;
            }
        };
        let sent = session.send(frame);
        if !sent {
            tracing::debug!(%context, "OBS transport not open, update dropped");
        }
        sent
    }

    /// Applies one transport event. Events for a session that has been
    /// replaced or removed are dropped.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let TransportEvent { key, kind } = event;
        let Some(session) = self.registry.session_for(&key) else {
            tracing::debug!(context = %key.context, session = %key.session, "dropping event for stale session");
            return;
        };

        let status_changed = match kind {
            TransportEventKind::Opened => {
                tracing::debug!(context = %key.context, url = %session.url, "OBS transport open");
                false
            }
            TransportEventKind::Message(text) => apply_frame(session, &key, &text),
            TransportEventKind::Error(error) => {
                tracing::warn!(context = %key.context, url = %session.url, %error, "OBS transport error");
                session.last_error = Some(error);
                false
            }
            TransportEventKind::Closed => {
                let changed = session.advance(SessionStatus::Closed);
                if changed {
                    tracing::info!(context = %key.context, url = %session.url, "OBS session closed by transport");
                }
                changed
            }
        };

        if status_changed {
            self.on_status_change(&key.context);
        }
    }

    /// Refreshes the display of every context sharing `context`'s URL.
    pub fn on_status_change(&mut self, context: &ContextId) {
        for ctx in self.registry.sharing_url_with(context) {
            self.refresh_display(&ctx);
        }
    }

    /// Display state for `context`, or `None` if it is unknown.
    #[must_use]
    pub fn render(&self, context: &ContextId) -> Option<DisplayState> {
        self.registry.get(context).map(|r| self.display.render(r))
    }

    /// Pushes the context's state everywhere it is shown: key title, OBS
    /// (best effort) and the settings editor if one is attached.
    pub fn refresh_display(&mut self, context: &ContextId) -> Option<DisplayState> {
        let record = self.registry.get(context)?;
        let state = self.display.render(record);
        let value = record.config().value;
        let inspector = record.inspector_attached.then(|| record.action.clone());

        self.display.push_title(context, &state);
        self.set_target_value(context, value);
        if let Some(action) = inspector {
            self.display.push_inspector(context, action.as_deref(), value);
        }
        Some(state)
    }

    /// Sends the current value to the settings editor only.
    pub fn sync_inspector(&self, context: &ContextId) {
        if let Some(record) = self.registry.get(context) {
            self.display
                .push_inspector(context, record.action.as_deref(), record.config().value);
        }
    }

    /// Closes the context's session and forgets the context. Returns
    /// `false` if it was unknown.
    pub fn remove_context(&mut self, context: &ContextId) -> bool {
        let Some(record) = self.registry.remove(context) else {
            return false;
        };
        if let Some(mut session) = record.session {
            session.close();
            tracing::debug!(%context, session = %session.id, "OBS session closed on removal");
        }
        true
    }

    /// Closes every session. Contexts stay registered.
    pub fn close_all(&mut self) {
        for (context, record) in self.registry.iter_mut() {
            if let Some(mut session) = record.session.take() {
                session.close();
                tracing::debug!(%context, session = %session.id, "OBS session closed on shutdown");
            }
        }
    }
}

/// Runs one frame through the session's handshake. Returns `true` if the
/// session became authenticated.
fn apply_frame(session: &mut Session, key: &SessionKey, text: &str) -> bool {
    let context = &key.context;
    let action = match session.handshake.on_frame(text) {
        Ok(action) => action,
        Err(e) => {
            tracing::warn!(%context, error = %e, "discarding malformed OBS frame");
            return false;
        }
    };

    match action {
        HandshakeAction::SendIdentify {
            frame,
            authenticated,
        } => {
            if session.status() != SessionStatus::Connecting {
                tracing::debug!(%context, status = %session.status(), "ignoring repeated Hello");
                return false;
            }
            if session.send(frame) {
                session.advance(SessionStatus::AwaitingAuth);
                tracing::debug!(%context, authenticated, "Identify sent");
            } else {
                tracing::warn!(%context, "could not send Identify, transport not open");
            }
            false
        }
        HandshakeAction::Identified => {
            let changed = session.advance(SessionStatus::Authenticated);
            if changed {
                tracing::info!(%context, url = %session.url, "OBS session authenticated");
            } else {
                tracing::debug!(%context, status = %session.status(), "unexpected Identified");
            }
            changed
        }
        HandshakeAction::Informational {
            op,
            warning: Some(warning),
        } => {
            tracing::warn!(%context, op, %warning, "OBS request failed");
            false
        }
        HandshakeAction::Informational { op, warning: None } => {
            tracing::debug!(%context, op, "OBS message");
            false
        }
        HandshakeAction::Ignored { op } => {
            tracing::debug!(%context, op, "ignoring OBS op code");
            false
        }
    }
}
