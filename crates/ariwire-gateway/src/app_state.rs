//! Shared application state for the gateway servers.
//!
//! One `AppState` backs both listeners: admission rules per endpoint, the
//! control-plane dispatcher, media relay settings, and the lifecycle pair
//! (shutdown token + task tracker) that lets `stop()` wait for upgraded
//! sessions, which axum no longer tracks once the upgrade completes.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::media::MediaSettings;
use crate::transport::handshake::Admission;

/// Log label for control sessions when none is configured.
pub const DEFAULT_CONTROL_TAG: &str = "ari";

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    control: Admission,
    media: Admission,
    control_tag: Arc<str>,
    dispatcher: Arc<Dispatcher>,
    media_settings: Arc<MediaSettings>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl AppState {
    pub fn new(cfg: &GatewayConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let control = Admission::new(&cfg.control.subprotocol, &cfg.control.realm)
            .with_credentials(cfg.control.credentials.clone());
        let media = Admission::new(&cfg.media.subprotocol, &cfg.media.realm)
            .with_credentials(cfg.media.credentials.clone());
        let control_tag: Arc<str> = cfg
            .control
            .tag
            .as_deref()
            .unwrap_or(DEFAULT_CONTROL_TAG)
            .into();

        Self {
            inner: Arc::new(AppStateInner {
                control,
                media,
                control_tag,
                dispatcher,
                media_settings: Arc::new(MediaSettings::from_config(&cfg.media)),
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    pub fn control_admission(&self) -> &Admission {
        &self.inner.control
    }

    pub fn media_admission(&self) -> &Admission {
        &self.inner.media
    }

    pub fn control_tag(&self) -> Arc<str> {
        Arc::clone(&self.inner.control_tag)
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.inner.dispatcher)
    }

    pub fn media_settings(&self) -> Arc<MediaSettings> {
        Arc::clone(&self.inner.media_settings)
    }

    /// Cancelled by `Gateway::stop`; every session watches it.
    pub fn shutdown(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    /// Tracks upgraded sessions.
    pub fn tracker(&self) -> &TaskTracker {
        &self.inner.tracker
    }
}
