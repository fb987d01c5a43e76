use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use crate::config::{MediaConfig, PlaybackConfig, ProxyConfig, RelayMode};
use crate::media::gate::SendGate;
use crate::media::verify::{AudioLog, EchoVerdict};

/// Relay settings shared by every media connection of one listener.
#[derive(Debug, Clone, Default)]
pub struct MediaSettings {
    pub mode: RelayMode,
    pub playback: PlaybackConfig,
    pub proxy: Option<ProxyConfig>,
}

impl MediaSettings {
    pub fn from_config(cfg: &MediaConfig) -> Self {
        Self {
            mode: cfg.mode,
            playback: cfg.playback.clone(),
            proxy: cfg.proxy.clone(),
        }
    }
}

/// State of one media connection, shared with its background tasks.
pub struct MediaSession {
    id: String,
    peer: String,
    tag: RwLock<Option<String>>,
    optimal_frame_size: AtomicU32,
    gate: SendGate,
    playback_active: AtomicBool,
    sent: AudioLog,
    received: AudioLog,
    verdict: Mutex<Option<EchoVerdict>>,
}

impl MediaSession {
    pub fn new(id: impl Into<String>, peer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            peer: peer.into(),
            tag: RwLock::new(None),
            optimal_frame_size: AtomicU32::new(0),
            gate: SendGate::new(),
            playback_active: AtomicBool::new(false),
            sent: AudioLog::new(),
            received: AudioLog::new(),
            verdict: Mutex::new(None),
        }
    }

    /// Connection id taken from the upgrade path.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Set by `MEDIA_START channel:<id>`.
    pub fn tag(&self) -> Option<String> {
        self.tag.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_tag(&self, tag: impl Into<String>) {
        *self.tag.write().unwrap_or_else(PoisonError::into_inner) = Some(tag.into());
    }

    /// Frame size hint from `MEDIA_START`; 0 until announced.
    pub fn optimal_frame_size(&self) -> u32 {
        self.optimal_frame_size.load(Ordering::Relaxed)
    }

    pub fn set_optimal_frame_size(&self, size: u32) {
        self.optimal_frame_size.store(size, Ordering::Relaxed);
    }

    pub fn gate(&self) -> &SendGate {
        &self.gate
    }

    /// True while a scripted playback is in flight; echo is suppressed.
    pub fn is_playback_active(&self) -> bool {
        self.playback_active.load(Ordering::SeqCst)
    }

    pub fn set_playback_active(&self, active: bool) {
        self.playback_active.store(active, Ordering::SeqCst);
    }

    /// Audio this side played (playback mode).
    pub fn sent(&self) -> &AudioLog {
        &self.sent
    }

    /// Audio the peer sent back (playback mode).
    pub fn received(&self) -> &AudioLog {
        &self.received
    }

    pub fn verdict(&self) -> Option<EchoVerdict> {
        *self.verdict.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_verdict(&self, verdict: EchoVerdict) {
        *self.verdict.lock().unwrap_or_else(PoisonError::into_inner) = Some(verdict);
    }
}
