//! Control-plane envelope (JSON, one object per text frame).
//!
//! `type` tags the union: `RESTRequest` and `RESTResponse` carry a
//! `request_id` correlating the pair, every other `type` is an event named
//! by that string. Fields the envelope does not model are kept in `fields`,
//! in wire order, and written back verbatim.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AriWireError, Result};

/// `type` of an outbound REST request.
pub const REST_REQUEST: &str = "RESTRequest";
/// `type` of the matching REST response.
pub const REST_RESPONSE: &str = "RESTResponse";

const RESERVED: [&str; 6] = [
    "type",
    "request_id",
    "method",
    "uri",
    "status_code",
    "reason_phrase",
];

/// Decoded control-plane message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    /// Message type (field name is `type` in JSON).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub reason_phrase: Option<String>,
    /// Everything else, passed through untouched.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Routing class of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind<'a> {
    Request,
    Response,
    Event(&'a str),
}

impl Envelope {
    /// Build a `RESTRequest` envelope.
    pub fn request(
        request_id: impl Into<String>,
        method: impl Into<String>,
        uri: impl Into<String>,
        fields: Map<String, Value>,
    ) -> Self {
        Self {
            kind: REST_REQUEST.to_string(),
            request_id: Some(request_id.into()),
            method: Some(method.into()),
            uri: Some(uri.into()),
            status_code: None,
            reason_phrase: None,
            fields,
        }
    }

    /// Build an event envelope with the given `type`.
    pub fn event(kind: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            request_id: None,
            method: None,
            uri: None,
            status_code: None,
            reason_phrase: None,
            fields,
        }
    }

    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| AriWireError::Decode(e.to_string()))
    }

    /// Encode to a single text frame. Pass-through fields that collide with
    /// modeled ones are skipped so the output never carries duplicate keys.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(&self.to_value())
            .map_err(|e| AriWireError::Internal(format!("envelope encode failed: {e}")))
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::String(self.kind.clone()));
        if let Some(id) = &self.request_id {
            obj.insert("request_id".into(), Value::String(id.clone()));
        }
        if let Some(m) = &self.method {
            obj.insert("method".into(), Value::String(m.clone()));
        }
        if let Some(u) = &self.uri {
            obj.insert("uri".into(), Value::String(u.clone()));
        }
        if let Some(code) = self.status_code {
            obj.insert("status_code".into(), Value::from(code));
        }
        if let Some(r) = &self.reason_phrase {
            obj.insert("reason_phrase".into(), Value::String(r.clone()));
        }
        for (k, v) in &self.fields {
            if !RESERVED.contains(&k.as_str()) {
                obj.insert(k.clone(), v.clone());
            }
        }
        Value::Object(obj)
    }

    pub fn kind(&self) -> EnvelopeKind<'_> {
        match self.kind.as_str() {
            REST_REQUEST => EnvelopeKind::Request,
            REST_RESPONSE => EnvelopeKind::Response,
            other => EnvelopeKind::Event(other),
        }
    }

    /// Handler lookup key: the lowercased `type`.
    pub fn event_key(&self) -> String {
        self.kind.to_ascii_lowercase()
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_response(&self) -> bool {
        self.kind == REST_RESPONSE
    }
}
