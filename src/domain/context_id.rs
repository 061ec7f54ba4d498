//! Type-safe host context identifier.
//!
//! [`ContextId`] is a newtype around the opaque string the host assigns to
//! each key instance, so that contexts cannot be confused with URLs, input
//! names or other strings flowing through the plugin.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for one logical key instance on the host.
///
/// Assigned by the host on `willAppear` and stable until `willDisappear`.
/// Used as the key of [`super::ContextRegistry`] and as the routing tag of
/// every OBS transport event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    /// Wraps a host-provided context string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw context string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
