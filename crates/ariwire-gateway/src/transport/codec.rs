//! Frame codec shared by both socket libraries.
//!
//! - Text frames carry envelopes (control plane) or tokens (media plane)
//! - Binary frames carry audio and stay opaque (`Bytes`, zero-copy)
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message as AxumMessage;
use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message as WsMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl Frame {
    pub fn text(s: impl Into<String>) -> Self {
        Frame::Text(s.into())
    }

    pub fn binary(b: impl Into<Bytes>) -> Self {
        Frame::Binary(b.into())
    }

    pub fn len(&self) -> usize {
        match self {
            Frame::Text(s) => s.len(),
            Frame::Binary(b) => b.len(),
            Frame::Ping(v) | Frame::Pong(v) => v.len(),
            Frame::Close => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw tungstenite frames never show up on read; they map to `None`.
    pub fn from_tungstenite(msg: WsMessage) -> Option<Self> {
        match msg {
            WsMessage::Text(s) => Some(Frame::Text(s)),
            WsMessage::Binary(b) => Some(Frame::Binary(Bytes::from(b))),
            WsMessage::Ping(v) => Some(Frame::Ping(v)),
            WsMessage::Pong(v) => Some(Frame::Pong(v)),
            WsMessage::Close(_) => Some(Frame::Close),
            WsMessage::Frame(_) => None,
        }
    }
}

impl From<AxumMessage> for Frame {
    fn from(msg: AxumMessage) -> Self {
        match msg {
            AxumMessage::Text(s) => Frame::Text(s),
            AxumMessage::Binary(b) => Frame::Binary(Bytes::from(b)),
            AxumMessage::Ping(v) => Frame::Ping(v),
            AxumMessage::Pong(v) => Frame::Pong(v),
            AxumMessage::Close(_) => Frame::Close,
        }
    }
}

impl From<Frame> for AxumMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(s) => AxumMessage::Text(s),
            // axum::Message::Binary requires Vec<u8>, so Binary clones into Vec.
            Frame::Binary(b) => AxumMessage::Binary(b.to_vec()),
            Frame::Ping(v) => AxumMessage::Ping(v),
            Frame::Pong(v) => AxumMessage::Pong(v),
            Frame::Close => AxumMessage::Close(None),
        }
    }
}

impl From<Frame> for WsMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(s) => WsMessage::Text(s),
            Frame::Binary(b) => WsMessage::Binary(b.to_vec()),
            Frame::Ping(v) => WsMessage::Ping(v),
            Frame::Pong(v) => WsMessage::Pong(v),
            Frame::Close => WsMessage::Close(None),
        }
    }
}
