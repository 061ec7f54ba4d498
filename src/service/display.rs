//! Display state computation and the pushes that follow it.
//!
//! [`DisplayNotifier::render`] is pure. The push methods each talk to the
//! host independently and only log failures, so a failed title update
//! never holds back the settings editor update (or the other way round).

use std::sync::Arc;

use crate::domain::{ContextId, ContextRecord};
use crate::host::{HostSink, InspectorMessage};

/// What a context's key should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    /// Title text.
    pub text: String,
}

/// Computes display states and pushes them to the host.
#[derive(Debug, Clone)]
pub struct DisplayNotifier {
    host: Arc<dyn HostSink>,
    unknown_indicator: String,
}

impl DisplayNotifier {
    /// Creates a notifier that shows `unknown_indicator` while a required
    /// OBS session is not authenticated.
    #[must_use]
    pub fn new(host: Arc<dyn HostSink>, unknown_indicator: impl Into<String>) -> Self {
        Self {
            host,
            unknown_indicator: unknown_indicator.into(),
        }
    }

    /// The unknown indicator, or the decimal value when no OBS session is
    /// required or the session is authenticated.
    #[must_use]
    pub fn render(&self, record: &ContextRecord) -> DisplayState {
        if record.config().requires_obs() && !record.is_authenticated() {
            DisplayState {
                text: self.unknown_indicator.clone(),
            }
        } else {
            DisplayState {
                text: record.config().value.to_string(),
            }
        }
    }

    /// Sets the key title.
    pub fn push_title(&self, context: &ContextId, state: &DisplayState) {
        if let Err(e) = self.host.set_title(context, &state.text) {
            tracing::warn!(%context, error = %e, "title update failed");
        }
    }

    /// Sends the current value to the settings editor.
    pub fn push_inspector(&self, context: &ContextId, action: Option<&str>, value: i64) {
        let message = InspectorMessage::UpdateCount { count: value };
        if let Err(e) = self.host.send_to_inspector(context, action, &message) {
            tracing::warn!(%context, error = %e, "settings editor update failed");
        }
    }
}
