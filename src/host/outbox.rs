//! Outbound commands to the host.
//!
//! [`HostSink`] is the seam between the core and the host connection.
//! [`HostOutbox`] implements it by serializing each command and queueing
//! the frame for the connection's writer task.

use std::fmt;

use tokio::sync::mpsc;

use super::messages::{InspectorMessage, OutboundMessage, TitlePayload};
use crate::domain::{ContextId, PersistedSettings};
use crate::error::BridgeError;

/// Commands the core issues to the host. Each call is independent; a
/// failure of one never prevents the others.
pub trait HostSink: fmt::Debug + Send + Sync {
    /// Replaces the key title.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HostUnavailable`] if the host link is gone.
    fn set_title(&self, context: &ContextId, title: &str) -> Result<(), BridgeError>;

    /// Persists the complete settings object for the key.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HostUnavailable`] if the host link is gone.
    fn set_settings(
        &self,
        context: &ContextId,
        settings: &PersistedSettings,
    ) -> Result<(), BridgeError>;

    /// Forwards a message to the key's settings editor.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HostUnavailable`] if the host link is gone.
    fn send_to_inspector(
        &self,
        context: &ContextId,
        action: Option<&str>,
        message: &InspectorMessage,
    ) -> Result<(), BridgeError>;

    /// Flashes the confirmation overlay on the key.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HostUnavailable`] if the host link is gone.
    fn show_ok(&self, context: &ContextId) -> Result<(), BridgeError>;
}

/// Channel-backed [`HostSink`].
#[derive(Debug, Clone)]
pub struct HostOutbox {
    frames: mpsc::UnboundedSender<String>,
}

impl HostOutbox {
    /// Creates an outbox and the receiver the writer task drains.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (frames, rx) = mpsc::unbounded_channel();
        (Self { frames }, rx)
    }

    fn push(&self, message: &OutboundMessage) -> Result<(), BridgeError> {
        let frame = message.to_frame()?;
        self.frames
            .send(frame)
            .map_err(|_| BridgeError::HostUnavailable("host writer stopped".to_string()))
    }
}

impl HostSink for HostOutbox {
    fn set_title(&self, context: &ContextId, title: &str) -> Result<(), BridgeError> {
        self.push(&OutboundMessage::SetTitle {
            context: context.clone(),
            payload: TitlePayload {
                title: title.to_string(),
                target: 0,
            },
        })
    }

    fn set_settings(
        &self,
        context: &ContextId,
        settings: &PersistedSettings,
    ) -> Result<(), BridgeError> {
        self.push(&OutboundMessage::SetSettings {
            context: context.clone(),
            payload: settings.clone(),
        })
    }

    fn send_to_inspector(
        &self,
        context: &ContextId,
        action: Option<&str>,
        message: &InspectorMessage,
    ) -> Result<(), BridgeError> {
        self.push(&OutboundMessage::SendToPropertyInspector {
            context: context.clone(),
            action: action.map(str::to_string),
            payload: message.clone(),
        })
    }

    fn show_ok(&self, context: &ContextId) -> Result<(), BridgeError> {
        self.push(&OutboundMessage::ShowOk {
            context: context.clone(),
        })
    }
}
