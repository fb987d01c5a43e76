//! Echo strategy with the scripted announce/follow-up flow.
//!
//! Inbound audio is echoed through a gated writer task fed by a bounded
//! queue. The read loop only ever `try_send`s into that queue: while XOFF
//! holds the gate the writer stalls, the queue fills, and further audio is
//! dropped instead of blocking the loop that must still see the XON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::Instrument;

use ariwire_core::error::Result;
use ariwire_core::protocol::media::{MediaCommand, MediaEvent};

use crate::media::flow::FlowAction;
use crate::media::playback::play_file;
use crate::media::relay::{RelayCx, RelayStrategy};
use crate::media::session::MediaSession;
use crate::transport::Outbound;

/// Echo frames waiting for the gate.
pub const ECHO_QUEUE: usize = 256;

pub struct EchoRelay {
    tx: mpsc::Sender<Bytes>,
    follow_up_armed: bool,
    dropped: u64,
}

impl EchoRelay {
    /// Spawn the echo writer into the session's task set.
    pub fn start(cx: &mut RelayCx) -> Self {
        let (tx, rx) = mpsc::channel(ECHO_QUEUE);
        cx.tasks.spawn(
            echo_writer(rx, Arc::clone(&cx.session), cx.out.clone()).in_current_span(),
        );
        Self {
            tx,
            follow_up_armed: false,
            dropped: 0,
        }
    }
}

#[async_trait]
impl RelayStrategy for EchoRelay {
    async fn on_audio(&mut self, cx: &mut RelayCx, data: Bytes) -> Result<()> {
        if cx.session.is_playback_active() {
            return Ok(());
        }
        if self.tx.try_send(data).is_err() {
            self.dropped += 1;
            if self.dropped.is_power_of_two() {
                tracing::debug!(dropped = self.dropped, "echo queue full, dropping audio");
            }
        }
        Ok(())
    }

    async fn on_control(
        &mut self,
        cx: &mut RelayCx,
        event: &MediaEvent,
        action: FlowAction,
        _raw: &str,
    ) -> Result<()> {
        match action {
            FlowAction::BeginTransmission(_) => {
                if let Some(path) = cx.settings.playback.announce.clone() {
                    spawn_playback(cx, path, Duration::ZERO, false);
                }
            }
            FlowAction::ScheduleFollowUp => {
                // The far end finished playing what was buffered.
                cx.session.set_playback_active(false);
                if self.follow_up_armed {
                    return Ok(());
                }
                if let Some(path) = cx.settings.playback.follow_up.clone() {
                    self.follow_up_armed = true;
                    cx.flow.rearm();
                    let delay = Duration::from_millis(cx.settings.playback.follow_up_delay_ms);
                    tracing::info!(delay_ms = delay.as_millis() as u64, "follow-up playback armed");
                    spawn_playback(cx, path, delay, false);
                }
            }
            FlowAction::Hangup => {
                cx.session.set_playback_active(false);
                tracing::info!(?event, "terminal buffering completion, hanging up");
                cx.out.text(MediaCommand::Hangup.to_string()).await?;
                cx.closing.cancel();
            }
            FlowAction::Pause | FlowAction::Resume | FlowAction::Ignore => {}
        }
        Ok(())
    }
}

async fn echo_writer(mut rx: mpsc::Receiver<Bytes>, session: Arc<MediaSession>, out: Outbound) {
    while let Some(data) = rx.recv().await {
        let Ok(_permit) = session.gate().acquire().await else {
            break;
        };
        if out.binary(data).await.is_err() {
            break;
        }
    }
}

/// Play `path` after `delay` as a background task of the session; with
/// `mirror` the sent audio is captured.
///
/// Echo is suppressed from the moment playback begins until the far end
/// reports `MEDIA_BUFFERING_COMPLETED`, not merely until the last chunk is
/// queued. An immediate playback raises the flag before returning so audio
/// already behind `MEDIA_START` on the socket is not echoed.
pub(crate) fn spawn_playback(cx: &mut RelayCx, path: PathBuf, delay: Duration, mirror: bool) {
    let session = Arc::clone(&cx.session);
    let out = cx.out.clone();
    let chunk = cx
        .settings
        .playback
        .chunk_for(session.optimal_frame_size());

    if delay.is_zero() {
        session.set_playback_active(true);
    }
    cx.tasks.spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
            session.set_playback_active(true);
        }
        let log = mirror.then(|| session.sent());
        match play_file(&path, &out, session.gate(), chunk, log).await {
            Ok(report) => {
                tracing::info!(file = %path.display(), frames = report.frames, bytes = report.bytes, "playback sent");
            }
            Err(e) => {
                // No completion will follow a transfer that never started.
                session.set_playback_active(false);
                tracing::warn!(file = %path.display(), error = %e, "playback failed");
            }
        }
    }
    .in_current_span());
}
