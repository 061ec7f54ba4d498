//! Bridge error types with stable numeric codes.
//!
//! [`BridgeError`] is the central error type for the plugin. Apart from
//! host registration, every variant is non-fatal: OBS failures degrade to
//! the unknown-indicator on the key and are retried by the health monitor.

/// Plugin error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category       | Fatal |
/// |-----------|----------------|-------|
/// | 1000–1999 | Configuration  | no    |
/// | 2000–2999 | OBS transport  | no    |
/// | 3000–3999 | OBS protocol   | no    |
/// | 4000–4999 | Host           | registration only |
/// | 5000–5999 | Internal       | no    |
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Missing or invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connect, send, or network failure on an OBS socket.
    #[error("transport error: {0}")]
    Transport(String),

    /// A frame could not be parsed as the expected OBS message.
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// The host connection could not be established.
    #[error("host registration failed: {0}")]
    HostRegistration(String),

    /// An outbound host command could not be delivered.
    #[error("host unavailable: {0}")]
    HostUnavailable(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Configuration(_) => 1001,
            Self::Transport(_) => 2001,
            Self::Protocol(_) => 3001,
            Self::HostRegistration(_) => 4001,
            Self::HostUnavailable(_) => 4002,
            Self::Internal(_) => 5000,
        }
    }

    /// Returns `true` if the process cannot continue after this error.
    ///
    /// Only a failed host registration is fatal; the plugin has no purpose
    /// without a host to receive events from.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::HostRegistration(_))
    }

    /// Keeps fatal errors and logs the rest.
    ///
    /// # Errors
    ///
    /// Returns the error unchanged if [`is_fatal`](Self::is_fatal).
    pub fn escalate_fatal(result: Result<(), Self>) -> Result<(), Self> {
        match result {
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(code = e.error_code(), error = %e, "non-fatal error at shutdown");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}
