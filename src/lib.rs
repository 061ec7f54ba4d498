//! # obs-counter-bridge
//!
//! Stream Deck counter plugin that mirrors each key's value into an OBS
//! Studio text input over obs-websocket v5.
//!
//! Every key instance (context) may hold one OBS session of its own. The
//! session manager opens, authenticates, health-checks and replaces those
//! sessions, and the key title shows the value only while the required
//! session is authenticated.
//!
//! ## Architecture
//!
//! ```text
//! Stream Deck host (WebSocket)          OBS Studio (WebSocket, one per context)
//!     │                                     │
//!     ├── host link (host/)                 ├── WsTransport (obs/)
//!     │                                     │
//!     └──────────── Dispatcher (service/) ──┘
//!                       │   ◄── health ticks, long-press timers
//!                       │
//!                   CounterService
//!                       │
//!                   SessionManager ── Handshake (obs/)
//!                       │
//!                   ContextRegistry (domain/)
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod host;
pub mod obs;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;
