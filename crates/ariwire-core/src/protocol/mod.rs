//! Wire contracts for both planes.
//!
//! - Control plane: one JSON envelope per text frame (`envelope`).
//! - Media plane: UTF-8 control tokens in text frames, opaque audio in
//!   binary frames (`media`).
//!
//! Both parsers are panic-free. A malformed envelope is reported as
//! `AriWireError::Decode`; media tokens never fail to parse and fall back to
//! `MediaEvent::Other`.

pub mod envelope;
pub mod media;
