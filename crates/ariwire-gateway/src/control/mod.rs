//! Control-plane connection lifecycle.

pub mod session;

pub use session::{run_control_session, spawn_control_session, ControlHandle};
