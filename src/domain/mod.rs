//! Domain layer: contexts, their configuration, OBS sessions and the
//! registry that owns them.
//!
//! This module contains the plugin-side model: the context identifier,
//! resolved per-context configuration, the session record for one OBS
//! connection attempt, and the registry that indexes contexts by URL.

pub mod context_id;
pub mod registry;
pub mod session;
pub mod settings;

pub use context_id::ContextId;
pub use registry::{ContextRecord, ContextRegistry};
pub use session::{Session, SessionId, SessionKey, SessionStatus};
pub use settings::{ContextConfig, PersistedSettings, RawSettings};
