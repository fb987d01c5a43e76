//! In-memory peer for driving sessions without sockets.

#![allow(dead_code)]

use std::time::Duration;

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use tokio::sync::mpsc;

use ariwire_gateway::transport::{Connection, Frame, Outbound};

pub const WAIT: Duration = Duration::from_secs(5);

/// The far end of a [`Connection`] built by [`pipe`].
pub struct Peer {
    tx: mpsc::Sender<Frame>,
    rx: mpsc::Receiver<Frame>,
}

pub fn pipe(label: &str) -> (Connection, Peer) {
    let (out, out_rx) = Outbound::channel(1024);
    let (in_tx, in_rx) = mpsc::channel::<Frame>(1024);
    let inbound = stream::unfold(in_rx, |mut rx| async move {
        rx.recv().await.map(|f| (Ok(f), rx))
    })
    .boxed();
    (
        Connection::from_parts(label, out, inbound),
        Peer {
            tx: in_tx,
            rx: out_rx,
        },
    )
}

impl Peer {
    pub async fn send(&self, frame: Frame) {
        self.tx.send(frame).await.expect("session gone");
    }

    pub async fn text(&self, s: &str) {
        self.send(Frame::text(s)).await;
    }

    pub async fn binary(&self, b: &[u8]) {
        self.send(Frame::Binary(Bytes::copy_from_slice(b))).await;
    }

    /// Next frame the session wrote; panics after [`WAIT`].
    pub async fn recv(&mut self) -> Frame {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("session outbound closed")
    }

    pub async fn recv_text(&mut self) -> String {
        match self.recv().await {
            Frame::Text(s) => s,
            other => panic!("expected text, got {other:?}"),
        }
    }

    pub async fn recv_binary(&mut self) -> Bytes {
        match self.recv().await {
            Frame::Binary(b) => b,
            other => panic!("expected binary, got {other:?}"),
        }
    }

    /// True if nothing arrives within `quiet`.
    pub async fn is_silent_for(&mut self, quiet: Duration) -> bool {
        tokio::time::timeout(quiet, self.rx.recv()).await.is_err()
    }

    /// Stop feeding the session; its inbound stream ends.
    pub fn hang_up(self) -> mpsc::Receiver<Frame> {
        self.rx
    }
}
