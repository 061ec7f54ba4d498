//! One OBS connection attempt bound to a context.
//!
//! A [`Session`] exclusively owns its [`TransportHandle`]. Its
//! [`SessionStatus`] only moves forward within one attempt; a new attempt
//! is a new `Session` with a new [`SessionId`].

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::ContextId;
use crate::obs::handshake::Handshake;
use crate::obs::transport::TransportHandle;

/// Unique identifier of one connection attempt.
///
/// Transport events carry it so that events from a replaced or discarded
/// attempt can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Creates a new random `SessionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Routing tag for transport events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    /// Context the session belongs to.
    pub context: ContextId,
    /// The attempt within that context.
    pub session: SessionId,
}

impl SessionKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(context: ContextId, session: SessionId) -> Self {
        Self { context, session }
    }
}

/// Connection status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Transport opening or open; Hello not yet answered.
    Connecting,
    /// Identify sent; waiting for Identified.
    AwaitingAuth,
    /// Identified received; requests may be sent.
    Authenticated,
    /// Transport gone. Terminal for this attempt.
    Closed,
}

impl SessionStatus {
    /// Returns `true` if moving from `self` to `next` is allowed:
    /// Connecting → AwaitingAuth → Authenticated, or anything → Closed.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::AwaitingAuth)
                | (Self::AwaitingAuth, Self::Authenticated)
                | (Self::Connecting | Self::AwaitingAuth | Self::Authenticated, Self::Closed)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::AwaitingAuth => "awaiting_auth",
            Self::Authenticated => "authenticated",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// One OBS connection attempt.
#[derive(Debug)]
pub struct Session {
    /// Attempt identifier.
    pub id: SessionId,
    /// URL the transport was opened to.
    pub url: String,
    /// OBS input whose text this session updates.
    pub target_field: String,
    /// Identification state machine for this attempt.
    pub handshake: Handshake,
    /// When the attempt started.
    pub created_at: DateTime<Utc>,
    /// Most recent transport error, if any.
    pub last_error: Option<String>,
    status: SessionStatus,
    transport: TransportHandle,
}

impl Session {
    /// Creates a session in [`SessionStatus::Connecting`].
    #[must_use]
    pub fn new(
        id: SessionId,
        url: impl Into<String>,
        target_field: impl Into<String>,
        credential: &str,
        transport: TransportHandle,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            target_field: target_field.into(),
            handshake: Handshake::new(credential),
            created_at: Utc::now(),
            last_error: None,
            status: SessionStatus::Connecting,
            transport,
        }
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Returns `true` once Identified has been received and the transport
    /// has not closed since.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Moves to `next` if the transition is allowed. Returns whether the
    /// status changed.
    pub fn advance(&mut self, next: SessionStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Returns `true` while the transport reports an open connection.
    #[must_use]
    pub fn transport_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Sends a text frame. Returns `false` if the transport is not open.
    pub fn send(&self, text: String) -> bool {
        self.transport.send(text)
    }

    /// Requests the transport to close and marks the session Closed.
    pub fn close(&mut self) {
        self.transport.close();
        self.advance(SessionStatus::Closed);
    }

    /// Time since the attempt started.
    #[must_use]
    pub fn age(&self) -> TimeDelta {
        Utc::now() - self.created_at
    }
}
