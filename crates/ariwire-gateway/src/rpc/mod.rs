//! REST-over-WebSocket request/response correlation.
//!
//! One [`CorrelationTable`] per control connection tracks in-flight
//! requests; [`RestClient`] is the caller-facing handle that writes
//! `RESTRequest` envelopes and waits for the matching `RESTResponse`.

pub mod client;
pub mod correlation;

pub use client::{RestClient, RestRequest, RestResponse};
pub use correlation::{CorrelationTable, Resolution, Waiter};
