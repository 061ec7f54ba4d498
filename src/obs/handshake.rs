//! obs-websocket v5 identification state machine.
//!
//! Runs synchronously on each text frame delivered for a session. It owns
//! no socket and no status: it turns a frame into a [`HandshakeAction`] and
//! the session manager applies it.

use super::protocol::{self, Hello, IncomingFrame, Identify, RequestResponse, op};
use crate::error::BridgeError;

/// What the session should do in response to one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Send this Identify frame and wait for Identified.
    SendIdentify {
        /// Serialized Identify frame.
        frame: String,
        /// Whether the frame carries an authentication response.
        authenticated: bool,
    },
    /// The server accepted identification.
    Identified,
    /// Logged only; no state change.
    Informational {
        /// Op code of the frame.
        op: u8,
        /// Set when a request response reports failure.
        warning: Option<String>,
    },
    /// Op code this client does not handle.
    Ignored {
        /// Op code of the frame.
        op: u8,
    },
}

/// Per-session handshake state: the credential to answer a challenge with.
#[derive(Clone)]
pub struct Handshake {
    credential: String,
}

impl std::fmt::Debug for Handshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshake")
            .field("has_credential", &!self.credential.is_empty())
            .finish()
    }
}

impl Handshake {
    /// Creates a handshake that answers challenges with `credential`.
    /// An empty credential never authenticates.
    #[must_use]
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
        }
    }

    /// Interprets one received text frame.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Protocol`] if the frame, or a Hello payload,
    /// cannot be parsed. Callers discard the frame and keep the session
    /// state unchanged.
    pub fn on_frame(&self, text: &str) -> Result<HandshakeAction, BridgeError> {
        let frame = IncomingFrame::parse(text)?;
        match frame.op {
            op::HELLO => {
                let hello: Hello = serde_json::from_value(frame.d)?;
                self.identify(&hello)
            }
            op::IDENTIFIED => Ok(HandshakeAction::Identified),
            op::REQUEST_RESPONSE | op::REQUEST_BATCH_RESPONSE => Ok(HandshakeAction::Informational {
                op: frame.op,
                warning: failed_request(frame.d),
            }),
            other if op::is_informational(other) => Ok(HandshakeAction::Informational {
                op: other,
                warning: None,
            }),
            other => Ok(HandshakeAction::Ignored { op: other }),
        }
    }

    /// Builds the Identify reply to a Hello.
    ///
    /// A server that requires auth while no credential is configured still
    /// gets an unauthenticated Identify; it will close the socket and the
    /// health monitor retries.
    fn identify(&self, hello: &Hello) -> Result<HandshakeAction, BridgeError> {
        let authentication = match &hello.authentication {
            Some(challenge) if !self.credential.is_empty() => Some(protocol::auth_response(
                &self.credential,
                &challenge.salt,
                &challenge.challenge,
            )),
            _ => None,
        };
        let authenticated = authentication.is_some();
        let frame = protocol::identify_frame(&Identify {
            rpc_version: hello.rpc_version,
            authentication,
            event_subscriptions: 0,
        })?;
        Ok(HandshakeAction::SendIdentify {
            frame,
            authenticated,
        })
    }
}

fn failed_request(d: serde_json::Value) -> Option<String> {
    let response: RequestResponse = serde_json::from_value(d).ok()?;
    if response.request_status.result {
        return None;
    }
    Some(format!(
        "{} #{} failed with code {}: {}",
        response.request_type,
        response.request_id,
        response.request_status.code,
        response.request_status.comment.unwrap_or_default()
    ))
}
