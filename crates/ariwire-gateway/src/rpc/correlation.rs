use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;

use ariwire_core::error::{AriWireError, Result};
use ariwire_core::protocol::envelope::Envelope;

/// One in-flight request. Owned by the table until resolved or released.
struct PendingRequest {
    method: String,
    uri: String,
    issued_at: Instant,
    /// Distinguishes reuses of the same id.
    generation: u64,
    tx: oneshot::Sender<Result<Envelope>>,
}

/// Outcome of feeding a `RESTResponse` into the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The waiter for `request_id` was released.
    Resolved {
        request_id: String,
        method: String,
        uri: String,
        elapsed: Duration,
    },
    /// No pending entry for that id (or the response carried none).
    Unmatched(Option<String>),
}

/// In-flight requests of one connection, keyed by request id.
///
/// Invariants:
/// - an id is present at most once, from `register` until it is resolved,
///   released by `close`, or its `Waiter` is dropped;
/// - after `close`, nothing new can be registered.
#[derive(Default)]
pub struct CorrelationTable {
    pending: DashMap<String, PendingRequest>,
    generations: AtomicU64,
    closed: AtomicBool,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            generations: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Reserve `request_id`. The returned waiter completes exactly once.
    pub fn register(
        self: &Arc<Self>,
        request_id: &str,
        method: &str,
        uri: &str,
    ) -> Result<Waiter> {
        if self.is_closed() {
            return Err(AriWireError::ConnectionClosed);
        }

        let (tx, rx) = oneshot::channel();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        match self.pending.entry(request_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(AriWireError::DuplicateRequest(request_id.to_string()));
            }
            Entry::Vacant(v) => {
                v.insert(PendingRequest {
                    method: method.to_string(),
                    uri: uri.to_string(),
                    issued_at: Instant::now(),
                    generation,
                    tx,
                });
            }
        }

        // close() may have drained between the check above and the insert.
        if self.is_closed() {
            self.forget(request_id, generation);
            return Err(AriWireError::ConnectionClosed);
        }

        Ok(Waiter {
            request_id: request_id.to_string(),
            generation,
            rx,
            table: Arc::clone(self),
        })
    }

    /// Hand a `RESTResponse` to its waiter and drop the entry.
    pub fn resolve(&self, response: Envelope) -> Resolution {
        let Some(request_id) = response.request_id.clone() else {
            return Resolution::Unmatched(None);
        };
        let Some((_, pending)) = self.pending.remove(&request_id) else {
            return Resolution::Unmatched(Some(request_id));
        };

        let elapsed = pending.issued_at.elapsed();
        if pending.tx.send(Ok(response)).is_err() {
            tracing::debug!(%request_id, "response arrived after its caller gave up");
        }
        Resolution::Resolved {
            request_id,
            method: pending.method,
            uri: pending.uri,
            elapsed,
        }
    }

    /// Refuse new requests and fail every pending waiter with
    /// `ConnectionClosed`. Returns how many were released.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        let mut released = 0;
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                tracing::debug!(request_id = %id, method = %pending.method, uri = %pending.uri, "releasing stalled request");
                let _ = pending.tx.send(Err(AriWireError::ConnectionClosed));
                released += 1;
            }
        }
        released
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.pending.contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove the entry only if it still belongs to that registration.
    fn forget(&self, request_id: &str, generation: u64) {
        self.pending
            .remove_if(request_id, |_, p| p.generation == generation);
    }
}

/// The single waiter of one pending request. Dropping it (e.g. when the
/// caller's own timeout fires) removes the entry from the table.
pub struct Waiter {
    request_id: String,
    generation: u64,
    rx: oneshot::Receiver<Result<Envelope>>,
    table: Arc<CorrelationTable>,
}

impl Waiter {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub async fn wait(mut self) -> Result<Envelope> {
        match (&mut self.rx).await {
            Ok(result) => result,
            Err(_) => Err(AriWireError::ConnectionClosed),
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.table.forget(&self.request_id, self.generation);
    }
}
