//! Generic event observer: one structured log line per event.

use std::collections::HashSet;

use serde_json::{Map, Value};

use ariwire_core::protocol::envelope::Envelope;

use crate::dispatch::dispatcher::{EventCtx, EventObserver};

/// What the observer logs for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    pub event: String,
    /// Bridge name (or id when unnamed) followed by channel name.
    pub name: String,
    /// Domain fields with `timestamp` moved to the end.
    pub payload: Map<String, Value>,
}

impl EventSummary {
    pub fn of(event: &Envelope) -> Self {
        let mut payload = event.fields.clone();
        if let Some(ts) = payload.shift_remove("timestamp") {
            payload.insert("timestamp".into(), ts);
        }

        let mut parts = Vec::new();
        if let Some(bridge) = payload.get("bridge") {
            let name = bridge.get("name").and_then(Value::as_str).unwrap_or_default();
            let label = if name.is_empty() {
                bridge.get("id").and_then(Value::as_str).unwrap_or_default()
            } else {
                name
            };
            if !label.is_empty() {
                parts.push(label.to_string());
            }
        }
        if let Some(channel) = payload.get("channel") {
            if let Some(name) = channel.get("name").and_then(Value::as_str) {
                parts.push(name.to_string());
            }
        }

        Self {
            event: event.kind.clone(),
            name: parts.join(" "),
            payload,
        }
    }
}

/// Logs every event except the configured noisy types.
pub struct LoggingObserver {
    quiet: HashSet<String>,
}

impl LoggingObserver {
    pub fn new<I, S>(quiet: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            quiet: quiet
                .into_iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_quiet(&self, event_type: &str) -> bool {
        self.quiet.contains(&event_type.to_ascii_lowercase())
    }
}

impl EventObserver for LoggingObserver {
    fn observe(&self, ctx: &EventCtx, event: &Envelope) {
        if self.is_quiet(&event.kind) {
            return;
        }
        let summary = EventSummary::of(event);
        tracing::info!(tag = %ctx.tag(), event = %summary.event, name = %summary.name, "received event");
        let payload = Value::Object(summary.payload);
        tracing::debug!(tag = %ctx.tag(), event = %summary.event, %payload, "event payload");
    }
}
