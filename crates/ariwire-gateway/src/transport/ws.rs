//! WebSocket upgrade handlers (server role).
//!
//! Admission runs before the upgrade; a refused peer gets a plain HTTP
//! response and never reaches a session. Accepted sockets are wrapped in a
//! [`Connection`] and driven on the upgrade task, registered with the
//! state's tracker.

use std::net::SocketAddr;

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;
use crate::control::run_control_session;
use crate::media::run_media_session;
use crate::transport::Connection;

pub async fn control_upgrade(
    State(app): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let admission = app.control_admission();
    if let Err(rejection) = admission.check(&headers) {
        tracing::warn!(%peer, ?rejection, "control handshake rejected");
        return rejection.into_response();
    }

    let ws = ws.protocols([admission.subprotocol.clone()]);
    let tracker = app.tracker().clone();
    ws.on_upgrade(move |socket| {
        tracker.track_future(async move {
            let conn = Connection::from_axum(socket, peer.to_string());
            let shutdown = app.shutdown().clone();
            if let Err(e) =
                run_control_session(conn, app.dispatcher(), app.control_tag(), shutdown).await
            {
                tracing::debug!(%peer, error = %e, "control session ended with error");
            }
        })
    })
}

pub async fn media_upgrade(
    State(app): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    uri: Uri,
    ws: WebSocketUpgrade,
) -> Response {
    let admission = app.media_admission();
    if let Err(rejection) = admission.check(&headers) {
        tracing::warn!(%peer, ?rejection, "media handshake rejected");
        return rejection.into_response();
    }

    let connection_id = connection_id(&uri).to_string();
    let ws = ws.protocols([admission.subprotocol.clone()]);
    let tracker = app.tracker().clone();
    ws.on_upgrade(move |socket| {
        tracker.track_future(async move {
            let conn = Connection::from_axum(socket, peer.to_string());
            let shutdown = app.shutdown().clone();
            if let Err(e) =
                run_media_session(conn, &connection_id, app.media_settings(), shutdown).await
            {
                tracing::debug!(%peer, error = %e, "media session ended with error");
            }
        })
    })
}

/// Last non-empty path segment: `/media/abc` -> `abc`.
pub fn connection_id(uri: &Uri) -> &str {
    uri.path()
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}
