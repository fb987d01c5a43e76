#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use ariwire_core::error::{AriWireError, Result};
use ariwire_core::protocol::envelope::Envelope;
use ariwire_gateway::dispatch::{
    Dispatcher, EventCtx, EventHandler, EventObserver, EventSummary, LoggingObserver, Route,
};
use ariwire_gateway::rpc::{CorrelationTable, RestClient};
use ariwire_gateway::transport::Outbound;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl EventObserver for Recorder {
    fn observe(&self, _ctx: &EventCtx, event: &Envelope) {
        self.seen.lock().unwrap().push(event.kind.clone());
    }
}

struct Forward {
    event: &'static str,
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl EventHandler for Forward {
    fn event_type(&self) -> &str {
        self.event
    }

    async fn handle(&self, _ctx: EventCtx, event: Envelope) -> Result<()> {
        let _ = self.tx.send(event.kind);
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl EventHandler for Failing {
    fn event_type(&self) -> &str {
        "ChannelDestroyed"
    }

    async fn handle(&self, _ctx: EventCtx, _event: Envelope) -> Result<()> {
        Err(AriWireError::Handler("boom".into()))
    }
}

fn ctx() -> EventCtx {
    let (out, _rx) = Outbound::channel(4);
    let rest = RestClient::new(Arc::new(CorrelationTable::new()), out, "test");
    EventCtx::new("test", "127.0.0.1:1", rest)
}

fn event(kind: &str) -> Envelope {
    Envelope::decode(&json!({"type": kind, "timestamp": "2024-01-01T00:00:00.000+0000"}).to_string())
        .unwrap()
}

#[tokio::test]
async fn routes_by_lowercased_type() {
    let recorder = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(recorder.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    dispatcher.register(Arc::new(Forward {
        event: "StasisStart",
        tx,
    }));

    assert!(matches!(dispatcher.route("stasisstart"), Route::Handler(_)));
    assert!(matches!(dispatcher.route("STASISSTART"), Route::Handler(_)));
    assert!(matches!(dispatcher.route("Dial"), Route::ObserverOnly));
    assert_eq!(dispatcher.registered_events(), vec!["stasisstart".to_string()]);

    dispatcher.dispatch(ctx(), event("StasisStart")).await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), "StasisStart");

    // No handler: observer only.
    dispatcher.dispatch(ctx(), event("Dial")).await.unwrap();
    assert!(rx.try_recv().is_err());

    assert_eq!(*recorder.seen.lock().unwrap(), vec!["StasisStart", "Dial"]);
}

#[tokio::test]
async fn failing_handler_is_isolated() {
    let recorder = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(recorder.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    dispatcher.register(Arc::new(Failing));
    dispatcher.register(Arc::new(Forward {
        event: "StasisEnd",
        tx,
    }));

    // The failing dispatch still completes without panicking its task.
    dispatcher.dispatch(ctx(), event("ChannelDestroyed")).await.unwrap();
    dispatcher.dispatch(ctx(), event("StasisEnd")).await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), "StasisEnd");
}

struct Slow {
    release: tokio::sync::Notify,
}

#[async_trait]
impl EventHandler for Slow {
    fn event_type(&self) -> &str {
        "ChannelHold"
    }

    async fn handle(&self, _ctx: EventCtx, _event: Envelope) -> Result<()> {
        self.release.notified().await;
        Ok(())
    }
}

#[tokio::test]
async fn slow_handler_does_not_block_later_dispatches() {
    let dispatcher = Dispatcher::new(Arc::new(Recorder::default()));
    let slow = Arc::new(Slow {
        release: tokio::sync::Notify::new(),
    });
    let (tx, mut rx) = mpsc::unbounded_channel();
    dispatcher.register(slow.clone());
    dispatcher.register(Arc::new(Forward {
        event: "ChannelUnhold",
        tx,
    }));

    let stuck = dispatcher.dispatch(ctx(), event("ChannelHold"));
    dispatcher.dispatch(ctx(), event("ChannelUnhold"));

    let got = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("second dispatch must not wait for the first");
    assert_eq!(got.unwrap(), "ChannelUnhold");
    assert!(!stuck.is_finished());

    slow.release.notify_one();
    stuck.await.unwrap();
}

#[test]
fn summary_moves_timestamp_last_and_names_the_call() {
    let env = Envelope::decode(
        &json!({
            "type": "ChannelEnteredBridge",
            "timestamp": "2024-01-01T00:00:00.000+0000",
            "bridge": {"id": "b-1", "name": ""},
            "channel": {"id": "c-1", "name": "PJSIP/1000-0001"},
            "application": "demo"
        })
        .to_string(),
    )
    .unwrap();

    let summary = EventSummary::of(&env);
    assert_eq!(summary.event, "ChannelEnteredBridge");
    assert_eq!(summary.name, "b-1 PJSIP/1000-0001");
    let keys: Vec<&str> = summary.payload.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["bridge", "channel", "application", "timestamp"]);

    // The envelope itself is untouched.
    assert_eq!(env.fields.keys().next().map(String::as_str), Some("timestamp"));
}

#[test]
fn summary_prefers_bridge_name() {
    let env = Envelope::decode(
        &json!({"type": "BridgeCreated", "bridge": {"id": "b-2", "name": "conf"}}).to_string(),
    )
    .unwrap();
    assert_eq!(EventSummary::of(&env).name, "conf");
}

#[test]
fn quiet_events_match_case_insensitively() {
    let observer = LoggingObserver::new(["ChannelVarset"]);
    assert!(observer.is_quiet("channelvarset"));
    assert!(observer.is_quiet("ChannelVarset"));
    assert!(!observer.is_quiet("StasisStart"));
}
