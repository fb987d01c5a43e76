//! ariwire core: transport-agnostic wire contracts and the shared error type.
//!
//! This crate defines the control-plane envelope (REST-over-WebSocket
//! requests, responses and events) and the media-plane control tokens. It
//! carries no transport or runtime dependencies so the gateway, tests and
//! tooling can share one definition of the wire.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Every fallible
//! path surfaces as `AriWireError`/`Result`, so malformed frames from a peer
//! never take a process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{AriWireError, ErrorCode, Result};
