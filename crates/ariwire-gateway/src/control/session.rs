use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use ariwire_core::error::Result;
use ariwire_core::protocol::envelope::{Envelope, EnvelopeKind};

use crate::dispatch::{Dispatcher, EventCtx};
use crate::rpc::{CorrelationTable, Resolution, RestClient};
use crate::transport::{Connection, Frame};

/// A control session running in the background.
pub struct ControlHandle {
    rest: RestClient,
    task: JoinHandle<Result<()>>,
}

impl ControlHandle {
    /// Issue requests on the session's connection.
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Wait for the session to end.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| ariwire_core::AriWireError::Internal(format!("control task: {e}")))?
    }
}

/// Start a control session and hand back a request handle right away
/// (client role, where the application speaks first).
pub fn spawn_control_session(
    conn: Connection,
    dispatcher: Arc<Dispatcher>,
    tag: Arc<str>,
    shutdown: CancellationToken,
) -> ControlHandle {
    let table = Arc::new(CorrelationTable::new());
    let rest = RestClient::new(Arc::clone(&table), conn.outbound(), Arc::clone(&tag));
    let task = tokio::spawn(drive(conn, dispatcher, tag, table, shutdown));
    ControlHandle { rest, task }
}

/// Run a control session to completion on the current task (server role).
pub async fn run_control_session(
    conn: Connection,
    dispatcher: Arc<Dispatcher>,
    tag: Arc<str>,
    shutdown: CancellationToken,
) -> Result<()> {
    let table = Arc::new(CorrelationTable::new());
    drive(conn, dispatcher, tag, table, shutdown).await
}

async fn drive(
    conn: Connection,
    dispatcher: Arc<Dispatcher>,
    tag: Arc<str>,
    table: Arc<CorrelationTable>,
    shutdown: CancellationToken,
) -> Result<()> {
    let span = tracing::info_span!("control", tag = %tag, peer = %conn.peer());
    async move {
        let (peer, out, mut inbound) = conn.into_parts();
        let rest = RestClient::new(Arc::clone(&table), out.clone(), Arc::clone(&tag));
        let ctx = EventCtx::new(Arc::clone(&tag), peer.as_str(), rest);
        tracing::info!("control websocket connected");

        let result = loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = out.send(Frame::Close).await;
                    break Ok(());
                }
                next = inbound.next() => next,
            };

            let frame = match next {
                None => break Ok(()),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "control read failed");
                    break Err(e);
                }
                Some(Ok(frame)) => frame,
            };

            match frame {
                Frame::Text(text) => match Envelope::decode(&text) {
                    Ok(env) => route(&dispatcher, &table, &ctx, env),
                    Err(e) => tracing::warn!(error = %e, len = text.len(), "dropping malformed envelope"),
                },
                Frame::Binary(b) => {
                    tracing::warn!(len = b.len(), "ignoring binary frame on control connection");
                }
                Frame::Ping(p) => {
                    let _ = out.send(Frame::Pong(p)).await;
                }
                Frame::Pong(_) => {}
                Frame::Close => break Ok(()),
            }
        };

        let released = table.close();
        if released > 0 {
            tracing::warn!(released, "released requests still pending at disconnect");
        }
        tracing::info!("control websocket disconnected");
        result
    }
    .instrument(span)
    .await
}

fn route(dispatcher: &Dispatcher, table: &CorrelationTable, ctx: &EventCtx, env: Envelope) {
    match env.kind() {
        EnvelopeKind::Response => match table.resolve(env) {
            Resolution::Resolved { request_id, elapsed, .. } => {
                tracing::debug!(%request_id, elapsed_ms = elapsed.as_millis() as u64, "response correlated");
            }
            Resolution::Unmatched(request_id) => {
                tracing::error!(request_id = request_id.as_deref().unwrap_or("<none>"), "pending request not found");
            }
        },
        EnvelopeKind::Request => {
            tracing::warn!(
                request_id = env.request_id.as_deref().unwrap_or("<none>"),
                "peer sent a RESTRequest; this side does not serve requests"
            );
        }
        EnvelopeKind::Event(_) => {
            dispatcher.dispatch(ctx.clone(), env);
        }
    }
}
