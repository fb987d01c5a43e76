//! Event dispatch for the control plane.
//!
//! Re-exports the dispatcher, the handler/observer traits and the per-event
//! context so downstream consumers can depend on this module directly.

pub mod dispatcher;
pub mod observer;

pub use dispatcher::{Dispatcher, EventCtx, EventHandler, EventObserver, Route};
pub use observer::{EventSummary, LoggingObserver};
