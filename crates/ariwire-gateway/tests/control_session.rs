#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ariwire_core::error::Result;
use ariwire_core::protocol::envelope::Envelope;
use ariwire_gateway::control::{run_control_session, spawn_control_session};
use ariwire_gateway::dispatch::{Dispatcher, EventCtx, EventHandler, LoggingObserver};
use ariwire_gateway::rpc::RestRequest;
use ariwire_gateway::transport::Frame;

use common::{pipe, WAIT};

/// Looks up the channel named in `StasisStart` and reports the status.
struct Lookup {
    tx: mpsc::UnboundedSender<(u16, String)>,
}

#[async_trait]
impl EventHandler for Lookup {
    fn event_type(&self) -> &str {
        "StasisStart"
    }

    async fn handle(&self, ctx: EventCtx, event: Envelope) -> Result<()> {
        let id = event.field("channel").and_then(|c| c["id"].as_str()).unwrap_or_default();
        let resp = ctx
            .rest()
            .request(RestRequest::get(format!("/ari/channels/{id}")))
            .await?;
        let name = resp.body_json()?["name"].as_str().unwrap_or_default().to_string();
        let _ = self.tx.send((resp.status_code().unwrap_or_default(), name));
        Ok(())
    }
}

fn dispatcher_with(handler: Lookup) -> Arc<Dispatcher> {
    let dispatcher = Dispatcher::new(Arc::new(LoggingObserver::new(["ChannelVarset"])));
    dispatcher.register(Arc::new(handler));
    Arc::new(dispatcher)
}

#[tokio::test]
async fn handler_request_round_trips_through_the_read_loop() {
    let (tx, mut results) = mpsc::unbounded_channel();
    let dispatcher = dispatcher_with(Lookup { tx });
    let (conn, mut peer) = pipe("asterisk");
    let shutdown = CancellationToken::new();
    let session = tokio::spawn(run_control_session(
        conn,
        dispatcher,
        "ari".into(),
        shutdown.clone(),
    ));

    // Garbage and binary frames are dropped without ending the session.
    peer.text("{not json").await;
    peer.binary(b"\x00\x01").await;

    peer.text(
        &json!({
            "type": "StasisStart",
            "timestamp": "2024-01-01T00:00:00.000+0000",
            "channel": {"id": "c-42", "name": "PJSIP/1000-0042"}
        })
        .to_string(),
    )
    .await;

    let req = Envelope::decode(&peer.recv_text().await).unwrap();
    assert_eq!(req.kind, "RESTRequest");
    assert_eq!(req.method.as_deref(), Some("GET"));
    assert_eq!(req.uri.as_deref(), Some("/ari/channels/c-42"));

    // An unrelated response is discarded first.
    peer.text(r#"{"type":"RESTResponse","request_id":"nobody","status_code":200}"#)
        .await;
    peer.text(
        &json!({
            "type": "RESTResponse",
            "request_id": req.request_id.unwrap(),
            "status_code": 200,
            "reason_phrase": "OK",
            "message_body": json!({"id": "c-42", "name": "PJSIP/1000-0042"}).to_string()
        })
        .to_string(),
    )
    .await;

    let (status, name) = tokio::time::timeout(WAIT, results.recv()).await.unwrap().unwrap();
    assert_eq!(status, 200);
    assert_eq!(name, "PJSIP/1000-0042");

    shutdown.cancel();
    tokio::time::timeout(WAIT, session).await.unwrap().unwrap().unwrap();
    assert_eq!(peer.recv().await, Frame::Close);
}

#[tokio::test]
async fn ping_is_answered() {
    let (tx, _results) = mpsc::unbounded_channel();
    let (conn, mut peer) = pipe("asterisk");
    let shutdown = CancellationToken::new();
    let _session = tokio::spawn(run_control_session(
        conn,
        dispatcher_with(Lookup { tx }),
        "ari".into(),
        shutdown,
    ));

    peer.send(Frame::Ping(b"hb".to_vec())).await;
    assert_eq!(peer.recv().await, Frame::Pong(b"hb".to_vec()));
}

#[tokio::test]
async fn pending_requests_fail_when_the_peer_leaves() {
    let (tx, _results) = mpsc::unbounded_channel();
    let (conn, mut peer) = pipe("asterisk");
    let handle = spawn_control_session(
        conn,
        dispatcher_with(Lookup { tx }),
        "client".into(),
        CancellationToken::new(),
    );

    let rest = handle.rest().clone();
    let call = tokio::spawn(async move { rest.request(RestRequest::get("/ari/asterisk/info")).await });
    let _ = peer.recv_text().await;
    assert_eq!(handle.rest().table().len(), 1);

    // Peer goes away without answering.
    drop(peer.hang_up());

    let err = tokio::time::timeout(WAIT, call).await.unwrap().unwrap().unwrap_err();
    assert_eq!(err.code().as_str(), "CONNECTION_CLOSED");
    tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .unwrap()
        .unwrap();
}
