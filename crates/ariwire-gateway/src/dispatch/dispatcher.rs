use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;

use ariwire_core::error::Result;
use ariwire_core::protocol::envelope::Envelope;

use crate::rpc::RestClient;

/// Per-event context: who sent it and how to talk back.
#[derive(Clone)]
pub struct EventCtx {
    tag: Arc<str>,
    peer: Arc<str>,
    rest: RestClient,
}

impl EventCtx {
    pub fn new(tag: impl Into<Arc<str>>, peer: impl Into<Arc<str>>, rest: RestClient) -> Self {
        Self {
            tag: tag.into(),
            peer: peer.into(),
            rest,
        }
    }

    pub fn tag(&self) -> &str { &self.tag }
    pub fn peer(&self) -> &str { &self.peer }
    /// Requests issued here travel on the connection the event came from.
    pub fn rest(&self) -> &RestClient { &self.rest }
}

/// Handles one event type (e.g. `StasisStart`, `Dial`).
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Event `type` this handler answers to, compared case-insensitively.
    fn event_type(&self) -> &str;
    async fn handle(&self, ctx: EventCtx, event: Envelope) -> Result<()>;
}

/// Sees every non-response envelope before its handler runs.
pub trait EventObserver: Send + Sync {
    fn observe(&self, ctx: &EventCtx, event: &Envelope);
}

/// Where an event goes after the observer.
#[derive(Clone)]
pub enum Route {
    Handler(Arc<dyn EventHandler>),
    ObserverOnly,
}

/// Registry of event handlers keyed by lowercased event type.
pub struct Dispatcher {
    handlers: DashMap<String, Arc<dyn EventHandler>>,
    observer: Arc<dyn EventObserver>,
}

impl Dispatcher {
    pub fn new(observer: Arc<dyn EventObserver>) -> Self {
        Self {
            handlers: DashMap::new(),
            observer,
        }
    }

    /// Later registrations for the same type replace earlier ones.
    pub fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers
            .insert(handler.event_type().to_ascii_lowercase(), handler);
    }

    pub fn registered_events(&self) -> Vec<String> {
        self.handlers.iter().map(|e| e.key().clone()).collect()
    }

    pub fn route(&self, event_type: &str) -> Route {
        match self.handlers.get(&event_type.to_ascii_lowercase()) {
            Some(h) => Route::Handler(Arc::clone(h.value())),
            None => Route::ObserverOnly,
        }
    }

    /// Run observer then handler as an independent task, so a slow or
    /// failing handler never stalls the connection's read loop.
    pub fn dispatch(&self, ctx: EventCtx, event: Envelope) -> JoinHandle<()> {
        let route = self.route(&event.kind);
        let observer = Arc::clone(&self.observer);
        tokio::spawn(async move {
            observer.observe(&ctx, &event);
            let Route::Handler(handler) = route else {
                return;
            };
            let kind = event.kind.clone();
            if let Err(e) = handler.handle(ctx.clone(), event).await {
                tracing::warn!(tag = %ctx.tag(), event = %kind, error = %e, code = e.code().as_str(), "event handler failed");
            }
        })
    }
}
