//! Capture buffers and the echo verdict for playback mode.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tracing::Instrument;

use ariwire_core::error::Result;
use ariwire_core::protocol::media::{MediaCommand, MediaEvent};

use crate::media::echo::spawn_playback;
use crate::media::flow::FlowAction;
use crate::media::relay::{RelayCx, RelayStrategy};
use crate::media::session::MediaSession;

/// Append-only audio capture shared between tasks.
#[derive(Default)]
pub struct AudioLog {
    buf: Mutex<BytesMut>,
}

impl AudioLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, data: &[u8]) {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
    }

    pub fn len(&self) -> usize {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buf.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Outcome of comparing what was played against what came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoVerdict {
    pub sent: usize,
    /// `sent` rounded up to a whole number of frames; the far end pads the
    /// last frame.
    pub expected: usize,
    pub received: usize,
    pub passed: bool,
}

impl EchoVerdict {
    pub fn compare(sent: &[u8], received: &[u8], frame_size: u32) -> Self {
        let expected = padded_len(sent.len(), frame_size as usize);
        let passed = received.len() >= expected && received.starts_with(sent);
        Self {
            sent: sent.len(),
            expected,
            received: received.len(),
            passed,
        }
    }
}

fn padded_len(len: usize, frame: usize) -> usize {
    if frame == 0 {
        return len;
    }
    len.div_ceil(frame) * frame
}

/// Playback (verification) mode: play the announce source, record what
/// the peer sends back, and judge the round trip after HANGUP.
#[derive(Default)]
pub struct VerifyRelay {
    judging: bool,
}

impl VerifyRelay {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelayStrategy for VerifyRelay {
    async fn on_audio(&mut self, cx: &mut RelayCx, data: Bytes) -> Result<()> {
        cx.session.received().append(&data);
        Ok(())
    }

    async fn on_control(
        &mut self,
        cx: &mut RelayCx,
        _event: &MediaEvent,
        action: FlowAction,
        _raw: &str,
    ) -> Result<()> {
        match action {
            FlowAction::BeginTransmission(_) => {
                if let Some(path) = cx.settings.playback.announce.clone() {
                    spawn_playback(cx, path, Duration::ZERO, true);
                }
            }
            FlowAction::Hangup | FlowAction::ScheduleFollowUp if !self.judging => {
                self.judging = true;
                cx.session.set_playback_active(false);
                cx.out.text(MediaCommand::Hangup.to_string()).await?;
                let session = Arc::clone(&cx.session);
                let closing = cx.closing.clone();
                let settle = Duration::from_millis(cx.settings.playback.settle_ms);
                cx.tasks.spawn(
                    async move {
                        tokio::time::sleep(settle).await;
                        judge(&session);
                        closing.cancel();
                    }
                    .in_current_span(),
                );
            }
            _ => {}
        }
        Ok(())
    }

    /// A peer that leaves before the settle delay still gets a verdict.
    async fn finish(&mut self, cx: &mut RelayCx) {
        if self.judging && cx.session.verdict().is_none() {
            judge(&cx.session);
        }
    }
}

fn judge(session: &MediaSession) {
    let verdict = EchoVerdict::compare(
        &session.sent().snapshot(),
        &session.received().snapshot(),
        session.optimal_frame_size(),
    );
    if verdict.passed {
        tracing::info!(?verdict, "echo verified");
    } else {
        tracing::warn!(?verdict, "echo mismatch");
    }
    session.set_verdict(verdict);
}
