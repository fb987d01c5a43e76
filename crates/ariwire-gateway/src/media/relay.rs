//! Media read loop and the strategy seam.
//!
//! One loop per media connection. Control tokens go through the flow state
//! machine first; the loop applies the gate effects (XOFF holds the send
//! gate, XON releases it) and then hands the token to the active
//! [`RelayStrategy`]. Binary audio goes straight to the strategy.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use ariwire_core::error::Result;
use ariwire_core::protocol::media::MediaEvent;

use crate::config::RelayMode;
use crate::media::echo::EchoRelay;
use crate::media::flow::{FlowAction, FlowControl};
use crate::media::proxy::ProxyRelay;
use crate::media::session::{MediaSession, MediaSettings};
use crate::media::verify::VerifyRelay;
use crate::transport::{Connection, Frame, Outbound};

/// Everything a strategy may touch while handling one frame.
pub struct RelayCx {
    pub session: Arc<MediaSession>,
    pub out: Outbound,
    pub settings: Arc<MediaSettings>,
    pub flow: FlowControl,
    /// Background work owned by the session; aborted at teardown.
    pub tasks: JoinSet<()>,
    /// Cancelled to end the session from inside (HANGUP, target gone).
    pub closing: CancellationToken,
}

/// How inbound audio and control tokens are turned into outbound frames.
#[async_trait]
pub trait RelayStrategy: Send {
    async fn on_audio(&mut self, cx: &mut RelayCx, data: Bytes) -> Result<()>;

    /// Called after the flow machine and gate have seen the token.
    async fn on_control(
        &mut self,
        cx: &mut RelayCx,
        event: &MediaEvent,
        action: FlowAction,
        raw: &str,
    ) -> Result<()>;

    /// Session is ending; background tasks are already aborted.
    async fn finish(&mut self, _cx: &mut RelayCx) {}
}

/// Build the strategy for the configured mode.
pub async fn strategy_for(cx: &mut RelayCx) -> Result<Box<dyn RelayStrategy>> {
    Ok(match cx.settings.mode {
        RelayMode::Echo => Box::new(EchoRelay::start(cx)),
        RelayMode::Playback => Box::new(VerifyRelay::new()),
        RelayMode::Proxy => Box::new(ProxyRelay::connect(cx).await?),
    })
}

/// Serve one media connection until the peer leaves, the strategy ends the
/// session, or `shutdown` fires. Returns the session for inspection.
pub async fn run_media_session(
    conn: Connection,
    connection_id: &str,
    settings: Arc<MediaSettings>,
    shutdown: CancellationToken,
) -> Result<Arc<MediaSession>> {
    let span = tracing::info_span!(
        "media",
        id = %connection_id,
        peer = %conn.peer(),
        tag = tracing::field::Empty
    );
    async move {
        let (peer, out, mut inbound) = conn.into_parts();
        let session = Arc::new(MediaSession::new(connection_id, peer));
        tracing::info!(mode = ?settings.mode, "media websocket connected");

        let mut cx = RelayCx {
            session: Arc::clone(&session),
            out: out.clone(),
            flow: FlowControl::new(settings.playback.terminal_marker.clone()),
            settings,
            tasks: JoinSet::new(),
            closing: CancellationToken::new(),
        };

        let mut strategy = match strategy_for(&mut cx).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "media relay setup failed");
                let _ = out.send(Frame::Close).await;
                return Err(e);
            }
        };

        let closing = cx.closing.clone();
        let result = loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                _ = closing.cancelled() => break Ok(()),
                next = inbound.next() => next,
            };

            let frame = match next {
                None => break Ok(()),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "media read failed");
                    break Err(e);
                }
                Some(Ok(frame)) => frame,
            };

            let step = match frame {
                Frame::Binary(data) => strategy.on_audio(&mut cx, data).await,
                Frame::Text(text) => control(&mut cx, strategy.as_mut(), &text).await,
                Frame::Ping(p) => out.send(Frame::Pong(p)).await,
                Frame::Pong(_) => Ok(()),
                Frame::Close => break Ok(()),
            };
            if let Err(e) = step {
                if e.is_fatal() {
                    break Err(e);
                }
                tracing::warn!(error = %e, "media frame handling failed");
            }
        };

        cx.tasks.abort_all();
        session.gate().close();
        strategy.finish(&mut cx).await;
        let _ = out.send(Frame::Close).await;
        tracing::info!(tag = session.tag().as_deref().unwrap_or(""), "media websocket disconnected");
        result.map(|()| session)
    }
    .instrument(span)
    .await
}

async fn control(cx: &mut RelayCx, strategy: &mut dyn RelayStrategy, text: &str) -> Result<()> {
    let event = MediaEvent::parse(text);
    let action = cx.flow.apply(&event);
    tracing::debug!(event = event.name(), state = ?cx.flow.state(), "media control");

    match &action {
        FlowAction::BeginTransmission(start) => {
            if let Some(channel) = &start.channel {
                cx.session.set_tag(channel.as_str());
                tracing::Span::current().record("tag", channel.as_str());
            }
            if let Some(size) = start.optimal_frame_size {
                cx.session.set_optimal_frame_size(size);
            }
            tracing::info!(params = ?start.params, "media started");
        }
        FlowAction::Pause => {
            cx.session.gate().pause().await?;
        }
        FlowAction::Resume => {
            cx.session.gate().resume().await;
        }
        FlowAction::Hangup | FlowAction::ScheduleFollowUp | FlowAction::Ignore => {}
    }

    strategy.on_control(cx, &event, action, text).await
}
