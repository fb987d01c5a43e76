//! Top-level facade crate for ariwire.
//!
//! Re-exports the wire contracts and the gateway runtime so users can depend on a single crate.

pub mod core {
    pub use ariwire_core::*;
}

pub mod gateway {
    pub use ariwire_gateway::*;
}
