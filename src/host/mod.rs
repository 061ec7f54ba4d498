//! Stream Deck host adapter: wire messages, the outbound command sink and
//! the WebSocket link that carries both directions.

pub mod connection;
pub mod messages;
pub mod outbox;

pub use connection::run_host_link;
pub use messages::{InboundEvent, InspectorMessage, OutboundMessage, Registration};
pub use outbox::{HostOutbox, HostSink};
