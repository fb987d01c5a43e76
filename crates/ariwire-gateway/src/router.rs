//! Axum router wiring (HTTP -> WS upgrade).
//!
//! Each listener accepts upgrades on any path; the media side takes the
//! connection id from the last path segment.

use axum::{routing::get, Router};

use crate::{app_state::AppState, transport};

pub fn build_control_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(transport::ws::control_upgrade))
        .route("/*path", get(transport::ws::control_upgrade))
        .with_state(state)
}

pub fn build_media_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(transport::ws::media_upgrade))
        .route("/*path", get(transport::ws::media_upgrade))
        .with_state(state)
}
