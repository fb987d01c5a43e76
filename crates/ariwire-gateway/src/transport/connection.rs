use std::fmt::Display;

use axum::extract::ws::{Message as AxumMessage, WebSocket};
use bytes::Bytes;
use futures_util::stream::{BoxStream, SplitSink};
use futures_util::{future, Sink, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

use ariwire_core::error::{AriWireError, Result};

use crate::transport::codec::Frame;

/// Outbound queue depth per connection.
pub const OUTBOUND_QUEUE: usize = 1024;

/// Inbound frames of one connection, in wire order.
pub type FrameStream = BoxStream<'static, Result<Frame>>;

/// Cloneable handle that queues frames for a connection's writer task.
#[derive(Clone, Debug)]
pub struct Outbound {
    tx: mpsc::Sender<Frame>,
}

impl Outbound {
    /// Bare outbound queue; the caller owns the receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn send(&self, frame: Frame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| AriWireError::ConnectionClosed)
    }

    pub async fn text(&self, s: impl Into<String>) -> Result<()> {
        self.send(Frame::Text(s.into())).await
    }

    pub async fn binary(&self, b: Bytes) -> Result<()> {
        self.send(Frame::Binary(b)).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One established WebSocket, detached from the library that produced it.
pub struct Connection {
    peer: String,
    out: Outbound,
    inbound: FrameStream,
}

impl Connection {
    /// Wrap a server-side socket accepted by axum.
    pub fn from_axum(socket: WebSocket, peer: impl Into<String>) -> Self {
        let peer = peer.into();
        let (sink, stream): (SplitSink<WebSocket, AxumMessage>, _) = socket.split();
        let inbound = stream
            .map(|r| {
                r.map(Frame::from)
                    .map_err(|e| AriWireError::Transport(e.to_string()))
            })
            .boxed();
        let out = spawn_writer(sink, peer.clone());
        Self { peer, out, inbound }
    }

    /// Wrap a client-side socket opened with tokio-tungstenite.
    pub fn from_tungstenite<S>(ws: WebSocketStream<S>, peer: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let peer = peer.into();
        let (sink, stream): (SplitSink<WebSocketStream<S>, WsMessage>, _) = ws.split();
        let inbound = stream
            .filter_map(|r| {
                future::ready(match r {
                    Ok(msg) => Frame::from_tungstenite(msg).map(Ok),
                    Err(e) => Some(Err(AriWireError::Transport(e.to_string()))),
                })
            })
            .boxed();
        let out = spawn_writer(sink, peer.clone());
        Self { peer, out, inbound }
    }

    /// Assemble from already-split halves (in-process peers, tests).
    pub fn from_parts(peer: impl Into<String>, out: Outbound, inbound: FrameStream) -> Self {
        Self {
            peer: peer.into(),
            out,
            inbound,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn outbound(&self) -> Outbound {
        self.out.clone()
    }

    pub fn into_parts(self) -> (String, Outbound, FrameStream) {
        (self.peer, self.out, self.inbound)
    }
}

/// Drain the outbound queue into the socket until every `Outbound` clone is
/// dropped, a `Close` frame is written, or the socket fails.
fn spawn_writer<S, M>(sink: S, peer: String) -> Outbound
where
    S: Sink<M> + Unpin + Send + 'static,
    S::Error: Display,
    M: From<Frame> + Send + 'static,
{
    let (out, rx) = Outbound::channel(OUTBOUND_QUEUE);
    tokio::spawn(write_loop(sink, rx, peer));
    out
}

async fn write_loop<S, M>(mut sink: S, mut rx: mpsc::Receiver<Frame>, peer: String)
where
    S: Sink<M> + Unpin,
    S::Error: Display,
    M: From<Frame>,
{
    while let Some(frame) = rx.recv().await {
        let closing = matches!(frame, Frame::Close);
        if let Err(e) = sink.send(M::from(frame)).await {
            tracing::debug!(%peer, error = %e, "websocket write failed");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}
