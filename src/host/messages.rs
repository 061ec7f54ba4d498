//! Host WebSocket message types.
//!
//! Inbound events and outbound commands are JSON objects discriminated by
//! an `event` field. Only the events this plugin reacts to are modelled;
//! anything else deserializes to [`InboundEvent::Other`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::settings::lenient_count;
use crate::domain::{ContextId, PersistedSettings};
use crate::error::BridgeError;

/// Payload carrying a settings object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPayload {
    /// The context's stored settings.
    #[serde(default)]
    pub settings: Option<Value>,
}

/// Event delivered by the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum InboundEvent {
    /// A key instance became visible.
    WillAppear {
        /// Key instance.
        context: ContextId,
        /// Action identifier.
        #[serde(default)]
        action: Option<String>,
        /// Stored settings.
        #[serde(default)]
        payload: SettingsPayload,
    },
    /// A key instance went away.
    WillDisappear {
        /// Key instance.
        context: ContextId,
    },
    /// Settings for a key instance changed.
    DidReceiveSettings {
        /// Key instance.
        context: ContextId,
        /// Stored settings.
        #[serde(default)]
        payload: SettingsPayload,
    },
    /// Key pressed.
    KeyDown {
        /// Key instance.
        context: ContextId,
    },
    /// Key released.
    KeyUp {
        /// Key instance.
        context: ContextId,
    },
    /// Message from the settings editor.
    SendToPlugin {
        /// Key instance.
        context: ContextId,
        /// Editor-defined payload.
        #[serde(default)]
        payload: Value,
    },
    /// The settings editor opened for a key instance.
    PropertyInspectorDidAppear {
        /// Key instance.
        context: ContextId,
        /// Action identifier.
        #[serde(default)]
        action: Option<String>,
    },
    /// The settings editor closed.
    PropertyInspectorDidDisappear {
        /// Key instance.
        context: ContextId,
    },
    /// Any event this plugin does not handle.
    #[serde(other)]
    Other,
}

impl InboundEvent {
    /// Parses a host text frame.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Protocol`] if the frame is not a JSON object
    /// with an `event` field, or a known event lacks its `context`.
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Message exchanged with the settings editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum InspectorMessage {
    /// Current counter value.
    UpdateCount {
        /// Counter value.
        count: i64,
    },
}

impl InspectorMessage {
    /// Interprets a `sendToPlugin` payload. The count may arrive as a number
    /// or as text typed into the editor.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        match payload.get("action").and_then(Value::as_str) {
            Some("updateCount") => Some(Self::UpdateCount {
                count: payload.get("count").map_or(0, lenient_count),
            }),
            _ => None,
        }
    }
}

/// `setTitle` payload.
#[derive(Debug, Clone, Serialize)]
pub struct TitlePayload {
    /// Title text.
    pub title: String,
    /// 0 = hardware and software.
    pub target: u8,
}

/// Command sent to the host.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Replace the key title.
    SetTitle {
        /// Key instance.
        context: ContextId,
        /// Title payload.
        payload: TitlePayload,
    },
    /// Persist settings for the key instance.
    SetSettings {
        /// Key instance.
        context: ContextId,
        /// Complete settings object.
        payload: PersistedSettings,
    },
    /// Forward a message to the settings editor.
    SendToPropertyInspector {
        /// Key instance.
        context: ContextId,
        /// Action identifier, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<String>,
        /// Message body.
        payload: InspectorMessage,
    },
    /// Flash the confirmation overlay on the key.
    ShowOk {
        /// Key instance.
        context: ContextId,
    },
}

impl OutboundMessage {
    /// Serializes the message to a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Protocol`] if serialization fails.
    pub fn to_frame(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// First frame sent after connecting to the host.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    /// Registration event name from the launch arguments.
    pub event: String,
    /// Plugin identifier from the launch arguments.
    pub uuid: String,
}
