use std::sync::Arc;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use ariwire_core::error::{AriWireError, Result};
use ariwire_core::protocol::envelope::Envelope;

use crate::rpc::correlation::CorrelationTable;
use crate::transport::Outbound;

/// A REST call to be carried over the control connection.
#[derive(Debug, Clone)]
pub struct RestRequest {
    method: String,
    uri: String,
    request_id: Option<String>,
    fields: Map<String, Value>,
}

impl RestRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            request_id: None,
            fields: Map::new(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new("GET", uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new("POST", uri)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new("DELETE", uri)
    }

    /// Use a caller-chosen id instead of a generated one.
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Extra envelope field, written verbatim.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Append `{name, value}` to the `query_strings` array.
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        let entry = json!({ "name": name, "value": value });
        match self.fields.get_mut("query_strings") {
            Some(Value::Array(items)) => items.push(entry),
            _ => {
                self.fields
                    .insert("query_strings".into(), Value::Array(vec![entry]));
            }
        }
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

/// A decoded `RESTResponse`.
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse(Envelope);

impl RestResponse {
    pub fn request_id(&self) -> Option<&str> {
        self.0.request_id.as_deref()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.0.status_code
    }

    pub fn reason_phrase(&self) -> Option<&str> {
        self.0.reason_phrase.as_deref()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.0.status_code, Some(200..=299))
    }

    /// ARI ships response bodies as a JSON string in `message_body`.
    pub fn message_body(&self) -> Option<&str> {
        self.0.field("message_body").and_then(Value::as_str)
    }

    pub fn body_json(&self) -> Result<Value> {
        let body = self
            .message_body()
            .ok_or_else(|| AriWireError::Decode("response has no message_body".into()))?;
        serde_json::from_str(body).map_err(|e| AriWireError::Decode(format!("message_body: {e}")))
    }

    pub fn envelope(&self) -> &Envelope {
        &self.0
    }

    pub fn into_envelope(self) -> Envelope {
        self.0
    }
}

impl From<Envelope> for RestResponse {
    fn from(env: Envelope) -> Self {
        Self(env)
    }
}

/// Issues requests on one control connection.
///
/// Cheap to clone; every clone shares the connection's correlation table,
/// so handlers can issue requests concurrently.
#[derive(Clone)]
pub struct RestClient {
    table: Arc<CorrelationTable>,
    out: Outbound,
    tag: Arc<str>,
}

impl RestClient {
    pub fn new(table: Arc<CorrelationTable>, out: Outbound, tag: impl Into<Arc<str>>) -> Self {
        Self {
            table,
            out,
            tag: tag.into(),
        }
    }

    pub fn table(&self) -> &Arc<CorrelationTable> {
        &self.table
    }

    /// Write the request; when `wait_for_response`, suspend until the
    /// matching response arrives or the connection closes.
    ///
    /// No timeout is imposed here. Dropping the returned future abandons the
    /// request and frees its correlation entry.
    pub async fn issue(
        &self,
        req: RestRequest,
        wait_for_response: bool,
    ) -> Result<Option<RestResponse>> {
        let RestRequest {
            method,
            uri,
            request_id,
            fields,
        } = req;
        let request_id = request_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let text = Envelope::request(request_id.clone(), method.clone(), uri.clone(), fields)
            .encode()?;

        // Registered before the write so a fast response cannot miss it.
        let waiter = if wait_for_response {
            Some(self.table.register(&request_id, &method, &uri)?)
        } else {
            None
        };

        tracing::info!(tag = %self.tag, %method, %uri, %request_id, "RESTRequest");
        self.out.text(text).await?;

        let Some(waiter) = waiter else {
            return Ok(None);
        };
        let resp = RestResponse::from(waiter.wait().await?);
        tracing::info!(
            tag = %self.tag,
            %method,
            %uri,
            status = resp.status_code().unwrap_or_default(),
            reason = resp.reason_phrase().unwrap_or_default(),
            "RESTResponse"
        );
        Ok(Some(resp))
    }

    /// Request and wait for the response.
    pub async fn request(&self, req: RestRequest) -> Result<RestResponse> {
        self.issue(req, true)
            .await?
            .ok_or_else(|| AriWireError::Internal("waited request produced no response".into()))
    }

    /// Request, then post-process the raw response.
    pub async fn request_with<T, F>(&self, req: RestRequest, transform: F) -> Result<T>
    where
        F: FnOnce(RestResponse) -> T,
    {
        self.request(req).await.map(transform)
    }

    /// Fire and forget: nothing is registered, any response is unmatched.
    pub async fn notify(&self, req: RestRequest) -> Result<()> {
        self.issue(req, false).await.map(|_| ())
    }
}
