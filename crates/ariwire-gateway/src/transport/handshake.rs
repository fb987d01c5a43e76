//! Handshake admission (pre-upgrade).
//!
//! Purpose:
//! - Refuse peers that do not offer the endpoint's subprotocol (HTTP 400).
//! - When credentials are configured, require HTTP Basic auth and delegate
//!   the check to an [`Authenticator`] (HTTP 401 with a challenge).
//!
//! Nothing here touches the WebSocket itself; rejected peers never reach a
//! session.

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::config::Credentials;

/// External credential check.
pub trait Authenticator: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Single username/password pair from config.
pub struct StaticCredentials {
    creds: Credentials,
}

impl StaticCredentials {
    pub fn new(creds: Credentials) -> Self {
        Self { creds }
    }
}

impl Authenticator for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        self.creds.username == username && self.creds.password == password
    }
}

/// Admission rules for one endpoint.
#[derive(Clone)]
pub struct Admission {
    pub subprotocol: String,
    pub realm: String,
    pub auth: Option<Arc<dyn Authenticator>>,
}

impl Admission {
    pub fn new(subprotocol: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            subprotocol: subprotocol.into(),
            realm: realm.into(),
            auth: None,
        }
    }

    pub fn with_credentials(mut self, creds: Option<Credentials>) -> Self {
        self.auth = creds.map(|c| Arc::new(StaticCredentials::new(c)) as Arc<dyn Authenticator>);
        self
    }

    /// Check headers of an upgrade request.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), Rejection> {
        if !self.subprotocol.is_empty() && !offers_subprotocol(headers, &self.subprotocol) {
            return Err(Rejection::Subprotocol(self.subprotocol.clone()));
        }

        if let Some(auth) = &self.auth {
            let Some((user, pass)) = basic_credentials(headers) else {
                return Err(Rejection::Unauthorized(self.realm.clone()));
            };
            if !auth.verify(&user, &pass) {
                return Err(Rejection::Unauthorized(self.realm.clone()));
            }
        }

        Ok(())
    }
}

/// Why a handshake was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// Missing or wrong credentials; carries the realm for the challenge.
    #[error("unauthorized")]
    Unauthorized(String),
    /// Client did not offer the required subprotocol.
    #[error("subprotocol {0} required")]
    Subprotocol(String),
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = self.to_string();
        match self {
            Rejection::Unauthorized(realm) => {
                let challenge = HeaderValue::from_str(&format!("Basic realm=\"{realm}\""))
                    .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
                (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, challenge)],
                    body,
                )
                    .into_response()
            }
            Rejection::Subprotocol(_) => (StatusCode::BAD_REQUEST, body).into_response(),
        }
    }
}

/// `Sec-WebSocket-Protocol` may repeat and may list several tokens.
pub fn offers_subprotocol(headers: &HeaderMap, wanted: &str) -> bool {
    headers
        .get_all(header::SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|p| p.trim() == wanted)
}

/// Decode `Authorization: Basic <base64(user:pass)>`.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Header value a client sends for Basic auth.
pub fn basic_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}
