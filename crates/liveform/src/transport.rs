// File: src/transport.rs
// Purpose: Ship form state to the validation endpoint and hand back the reply

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Header carrying the anti-forgery token alongside the `_token` body key.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Body keys owned by the protocol rather than by the form.
pub const RESERVED_KEYS: &[&str] = &["_request", "_field", "_token"];

/// One validation request: every form field plus the reserved keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationPayload {
    #[serde(flatten)]
    fields: BTreeMap<String, String>,

    #[serde(rename = "_request")]
    request: String,

    /// Absent when the whole form is validated at once.
    #[serde(rename = "_field", skip_serializing_if = "Option::is_none")]
    field: Option<String>,

    #[serde(rename = "_token")]
    token: String,
}

impl ValidationPayload {
    /// Build a payload. Form fields that collide with reserved keys are
    /// dropped so the protocol values always win.
    pub fn new(
        mut fields: BTreeMap<String, String>,
        request: impl Into<String>,
        field: Option<String>,
        token: impl Into<String>,
    ) -> Self {
        fields.retain(|name, _| !RESERVED_KEYS.contains(&name.as_str()));
        Self {
            fields,
            request: request.into(),
            field,
            token: token.into(),
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Status and parsed JSON body of an endpoint reply.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// `Value::Null` when the body was not JSON.
    pub body: Value,
}

impl TransportResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends validation payloads. The endpoint is passed per call so one
/// transport can serve validators pointed at different endpoints.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        endpoint: &str,
        payload: &ValidationPayload,
    ) -> Result<TransportResponse, TransportError>;
}

/// JSON-over-HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpTransport {
    /// `base_url` is prefixed to relative endpoints such as `/_liveform/validate`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), Some(base_url.into()))
    }

    pub fn with_client(client: reqwest::Client, base_url: Option<String>) -> Self {
        Self { client, base_url }
    }

    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            ),
            None => endpoint.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        payload: &ValidationPayload,
    ) -> Result<TransportResponse, TransportError> {
        let url = self.url_for(endpoint);
        let body = serde_json::to_vec(payload)?;

        tracing::debug!(url = %url, field = ?payload.field(), "sending validation request");

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header("X-Requested-With", "XMLHttpRequest")
            .header(CSRF_HEADER, payload.token())
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        Ok(TransportResponse { status, body })
    }
}
