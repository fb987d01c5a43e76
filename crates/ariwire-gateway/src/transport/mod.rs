//! Transport layer (WebSocket).
//!
//! Server role (axum upgrade handlers) and client role (tokio-tungstenite)
//! both end up as a [`Connection`]: a peer label, a cloneable outbound frame
//! sender and a stream of decoded inbound frames. Session logic never sees
//! which library owns the socket.

pub mod client;
pub mod codec;
pub mod connection;
pub mod handshake;
pub mod ws;

pub use codec::Frame;
pub use connection::{Connection, FrameStream, Outbound};
