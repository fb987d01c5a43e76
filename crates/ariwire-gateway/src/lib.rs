//! ariwire gateway library entry.
//!
//! Wires the transport, the control plane (correlation table and event
//! dispatcher) and the media plane (flow control and relay strategies) into
//! two WebSocket listeners. Consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod media;
pub mod router;
pub mod rpc;
pub mod server;
pub mod transport;

pub use server::{Gateway, GatewayServer};
