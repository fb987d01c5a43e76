use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use ariwire_core::error::{AriWireError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub media: MediaConfig,

    /// Dial out to a control-plane server instead of (or besides) listening.
    #[serde(default)]
    pub client: Option<ClientConfig>,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(AriWireError::UnsupportedVersion);
        }
        if !self.control.enabled && !self.media.enabled && self.client.is_none() {
            return Err(AriWireError::BadRequest(
                "nothing to run: control, media and client are all disabled".into(),
            ));
        }

        self.control.validate()?;
        self.media.validate()?;
        if let Some(client) = &self.client {
            client.validate()?;
        }

        Ok(())
    }
}

/// Basic-auth credentials checked at handshake time.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_control_listen")]
    pub listen: String,

    #[serde(default = "default_control_subprotocol")]
    pub subprotocol: String,

    #[serde(default)]
    pub credentials: Option<Credentials>,

    #[serde(default = "default_realm")]
    pub realm: String,

    /// Log label for control connections.
    #[serde(default)]
    pub tag: Option<String>,

    /// Event types the logging observer stays quiet about.
    #[serde(default = "default_quiet_events")]
    pub quiet_events: Vec<String>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_control_listen(),
            subprotocol: default_control_subprotocol(),
            credentials: None,
            realm: default_realm(),
            tag: None,
            quiet_events: default_quiet_events(),
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            parse_listen("control.listen", &self.listen)?;
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_listen("control.listen", &self.listen)
    }
}

/// Relay strategy applied to every media connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Scripted playback, then echo inbound audio back.
    #[default]
    Echo,
    /// Play a source, record what comes back, verify it.
    Playback,
    /// Forward both directions to a second media endpoint.
    Proxy,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_media_listen")]
    pub listen: String,

    #[serde(default = "default_media_subprotocol")]
    pub subprotocol: String,

    #[serde(default)]
    pub credentials: Option<Credentials>,

    #[serde(default = "default_realm")]
    pub realm: String,

    #[serde(default)]
    pub mode: RelayMode,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_media_listen(),
            subprotocol: default_media_subprotocol(),
            credentials: None,
            realm: default_realm(),
            mode: RelayMode::default(),
            playback: PlaybackConfig::default(),
            proxy: None,
        }
    }
}

impl MediaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            parse_listen("media.listen", &self.listen)?;
        }
        self.playback.validate()?;
        if self.mode == RelayMode::Proxy {
            let proxy = self.proxy.as_ref().ok_or_else(|| {
                AriWireError::BadRequest("media.mode=proxy requires a media.proxy section".into())
            })?;
            proxy.validate()?;
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_listen("media.listen", &self.listen)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaybackConfig {
    /// Played when a peer sends `MEDIA_START`.
    #[serde(default)]
    pub announce: Option<PathBuf>,

    /// Played once, `follow_up_delay_ms` after the announcement drained.
    #[serde(default)]
    pub follow_up: Option<PathBuf>,

    #[serde(default = "default_follow_up_delay_ms")]
    pub follow_up_delay_ms: u64,

    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,

    /// Chunk by the peer's `optimal_frame_size` when it announced one.
    #[serde(default = "default_true")]
    pub align_to_frame_size: bool,

    /// A `MEDIA_BUFFERING_COMPLETED` detail containing this ends the call.
    #[serde(default = "default_terminal_marker")]
    pub terminal_marker: String,

    /// Playback mode: how long to keep collecting echoed audio after HANGUP.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            announce: None,
            follow_up: None,
            follow_up_delay_ms: default_follow_up_delay_ms(),
            chunk_bytes: default_chunk_bytes(),
            align_to_frame_size: true,
            terminal_marker: default_terminal_marker(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=65536).contains(&self.chunk_bytes) {
            return Err(AriWireError::BadRequest(
                "media.playback.chunk_bytes must be between 1 and 65536".into(),
            ));
        }
        if self.follow_up_delay_ms > 600_000 {
            return Err(AriWireError::BadRequest(
                "media.playback.follow_up_delay_ms must be at most 600000".into(),
            ));
        }
        if self.terminal_marker.is_empty() {
            return Err(AriWireError::BadRequest(
                "media.playback.terminal_marker must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Chunk size for a session that announced `frame_size` (0 = unknown).
    pub fn chunk_for(&self, frame_size: u32) -> usize {
        if self.align_to_frame_size && frame_size > 0 {
            frame_size as usize
        } else {
            self.chunk_bytes
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Target media endpoint; `{id}` is replaced by the inbound connection id.
    pub target_url: String,

    #[serde(default = "default_proxy_subprotocol")]
    pub subprotocol: Option<String>,
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<()> {
        validate_ws_url("media.proxy.target_url", &self.target_url.replace("{id}", "x"))
    }

    pub fn target_for(&self, connection_id: &str) -> String {
        self.target_url.replace("{id}", connection_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the control-plane server, e.g. `ws://127.0.0.1:8088`.
    pub url: String,
    pub app: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub subprotocol: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        validate_ws_url("client.url", &self.url)?;
        if self.app.is_empty() {
            return Err(AriWireError::BadRequest("client.app must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_listen(field: &str, s: &str) -> Result<SocketAddr> {
    s.parse()
        .map_err(|e| AriWireError::BadRequest(format!("{field} must be a socket address: {e}")))
}

fn validate_ws_url(field: &str, s: &str) -> Result<()> {
    let url = url::Url::parse(s)
        .map_err(|e| AriWireError::BadRequest(format!("{field} is not a valid url: {e}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(AriWireError::BadRequest(format!(
            "{field} must use ws or wss, got {other}"
        ))),
    }
}

fn default_true() -> bool {
    true
}
fn default_control_listen() -> String {
    "127.0.0.1:8765".into()
}
fn default_media_listen() -> String {
    "127.0.0.1:8787".into()
}
fn default_control_subprotocol() -> String {
    "ari".into()
}
fn default_media_subprotocol() -> String {
    "media".into()
}
fn default_proxy_subprotocol() -> Option<String> {
    Some("media".into())
}
fn default_realm() -> String {
    "asterisk".into()
}
fn default_quiet_events() -> Vec<String> {
    vec!["ChannelVarset".into()]
}
fn default_follow_up_delay_ms() -> u64 {
    10_000
}
fn default_chunk_bytes() -> usize {
    1000
}
fn default_terminal_marker() -> String {
    "zombies".into()
}
fn default_settle_ms() -> u64 {
    2000
}
