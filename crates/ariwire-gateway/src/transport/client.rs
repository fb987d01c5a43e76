//! Client role: dial out with tokio-tungstenite.

use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::Error as WsError;
use url::Url;

use ariwire_core::error::{AriWireError, Result};

use crate::config::{ClientConfig, Credentials};
use crate::transport::handshake::basic_header;
use crate::transport::Connection;

/// Open a WebSocket, offering `subprotocol` when given.
pub async fn connect(url: &str, subprotocol: Option<&str>) -> Result<Connection> {
    connect_with(url, subprotocol, None).await
}

/// `connect`, answering a Basic challenge up front.
pub async fn connect_with(
    url: &str,
    subprotocol: Option<&str>,
    credentials: Option<&Credentials>,
) -> Result<Connection> {
    let mut req = url
        .into_client_request()
        .map_err(|e| AriWireError::BadRequest(format!("bad websocket url {url}: {e}")))?;

    if let Some(p) = subprotocol {
        let value = HeaderValue::from_str(p)
            .map_err(|_| AriWireError::BadRequest(format!("bad subprotocol {p}")))?;
        req.headers_mut().insert(header::SEC_WEBSOCKET_PROTOCOL, value);
    }
    if let Some(c) = credentials {
        let value = HeaderValue::from_str(&basic_header(&c.username, &c.password))
            .map_err(|_| AriWireError::BadRequest("credentials are not a valid header".into()))?;
        req.headers_mut().insert(header::AUTHORIZATION, value);
    }

    let peer = req
        .uri()
        .authority()
        .map(|a| a.to_string())
        .unwrap_or_else(|| url.to_string());

    let (ws, _resp) = connect_async(req).await.map_err(|e| match e {
        WsError::Http(resp) if resp.status() == StatusCode::UNAUTHORIZED => AriWireError::AuthFailed,
        other => AriWireError::Transport(format!("connect {url}: {other}")),
    })?;
    tracing::debug!(%peer, "websocket client connected");
    Ok(Connection::from_tungstenite(ws, peer))
}

/// `<url>/ari/events?subscribeAll=false&app=<app>&api_key=<user>:<pass>`.
pub fn control_url(cfg: &ClientConfig) -> Result<String> {
    let mut url = Url::parse(&cfg.url)
        .map_err(|e| AriWireError::BadRequest(format!("client.url: {e}")))?;
    let path = format!("{}/ari/events", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut()
        .clear()
        .append_pair("subscribeAll", "false")
        .append_pair("app", &cfg.app)
        .append_pair("api_key", &format!("{}:{}", cfg.username, cfg.password));
    Ok(url.into())
}

/// Connect as a control-plane client per config.
pub async fn connect_control(cfg: &ClientConfig) -> Result<Connection> {
    let url = control_url(cfg)?;
    connect(&url, cfg.subprotocol.as_deref()).await
}

/// `ws://<host:port>/media/<connection_id>`.
pub fn media_url(host_port: &str, connection_id: &str) -> String {
    format!("ws://{host_port}/media/{connection_id}")
}
