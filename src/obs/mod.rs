//! obs-websocket v5 client pieces: wire protocol, identification handshake
//! and the socket transport.

pub mod handshake;
pub mod protocol;
pub mod transport;

pub use handshake::{Handshake, HandshakeAction};
pub use transport::{
    Transport, TransportEvent, TransportEventKind, TransportEventSender, TransportHandle,
    WsTransport,
};
