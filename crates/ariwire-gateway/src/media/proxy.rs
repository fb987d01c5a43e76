//! Forwarding strategy: bridge the inbound media connection to a second
//! media endpoint.
//!
//! Client audio goes to the target verbatim. A background task carries
//! target audio back to the client under the send gate, so the client's
//! XOFF also pauses the return path. That task belongs to the session's
//! task set and is aborted when the client side ends; if the target ends
//! first, the task ends the session.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use ariwire_core::error::{AriWireError, Result};
use ariwire_core::protocol::media::MediaEvent;

use crate::media::flow::FlowAction;
use crate::media::relay::{RelayCx, RelayStrategy};
use crate::media::session::MediaSession;
use crate::transport::{client, Frame, FrameStream, Outbound};

/// Where a client control token goes in proxy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardPolicy {
    /// Consumed by the local flow machine only.
    Local,
    /// Applied locally and also sent to the target.
    LocalAndForward,
    /// Unknown here; passed through to the target untouched.
    ForwardOnly,
}

pub fn forward_policy(event: &MediaEvent) -> ForwardPolicy {
    match event {
        MediaEvent::Start(_) => ForwardPolicy::LocalAndForward,
        MediaEvent::Xoff | MediaEvent::Xon | MediaEvent::BufferingCompleted { .. } => {
            ForwardPolicy::Local
        }
        MediaEvent::Other(_) => ForwardPolicy::ForwardOnly,
    }
}

pub struct ProxyRelay {
    target: Outbound,
    target_url: String,
}

impl ProxyRelay {
    /// Open the target connection and start the return-path task.
    pub async fn connect(cx: &mut RelayCx) -> Result<Self> {
        let proxy = cx
            .settings
            .proxy
            .as_ref()
            .ok_or_else(|| AriWireError::BadRequest("proxy mode without a proxy section".into()))?;
        let target_url = proxy.target_for(cx.session.id());
        let conn = client::connect(&target_url, proxy.subprotocol.as_deref()).await?;
        tracing::info!(target = %target_url, "proxy target connected");

        let (_, target, inbound) = conn.into_parts();
        cx.tasks.spawn(
            forward_from_target(
                inbound,
                target.clone(),
                Arc::clone(&cx.session),
                cx.out.clone(),
                cx.closing.clone(),
            )
            .in_current_span(),
        );

        Ok(Self { target, target_url })
    }
}

#[async_trait]
impl RelayStrategy for ProxyRelay {
    async fn on_audio(&mut self, _cx: &mut RelayCx, data: Bytes) -> Result<()> {
        self.target.binary(data).await
    }

    async fn on_control(
        &mut self,
        _cx: &mut RelayCx,
        event: &MediaEvent,
        _action: FlowAction,
        raw: &str,
    ) -> Result<()> {
        match forward_policy(event) {
            ForwardPolicy::Local => Ok(()),
            ForwardPolicy::LocalAndForward | ForwardPolicy::ForwardOnly => {
                self.target.text(raw).await
            }
        }
    }

    async fn finish(&mut self, _cx: &mut RelayCx) {
        let _ = self.target.send(Frame::Close).await;
        tracing::debug!(target = %self.target_url, "proxy target released");
    }
}

async fn forward_from_target(
    mut inbound: FrameStream,
    target: Outbound,
    session: Arc<MediaSession>,
    client: Outbound,
    closing: CancellationToken,
) {
    while let Some(next) = inbound.next().await {
        match next {
            Ok(Frame::Binary(data)) => {
                let Ok(_permit) = session.gate().acquire().await else {
                    break;
                };
                if client.binary(data).await.is_err() {
                    break;
                }
            }
            Ok(Frame::Text(text)) => {
                tracing::info!(%text, "target control message");
            }
            Ok(Frame::Ping(p)) => {
                let _ = target.send(Frame::Pong(p)).await;
            }
            Ok(Frame::Pong(_)) => {}
            Ok(Frame::Close) => break,
            Err(e) => {
                tracing::warn!(error = %e, "proxy target read failed");
                break;
            }
        }
    }
    tracing::info!("proxy target disconnected");
    closing.cancel();
}
