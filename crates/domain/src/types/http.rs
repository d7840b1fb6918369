//! Request and response values exchanged with the transport port
//!
//! These types are deliberately independent of any HTTP library so that the
//! dispatcher and the operation waiter can be driven by an in-memory
//! transport in tests.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::HEADER_RETRY_AFTER;
use crate::errors::{FlowError, Result};
use crate::utils::TruncateExt;

/// HTTP verbs used by the orchestration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Upper-case method name as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single API call, constructed per request and never mutated once sent.
///
/// `path` is either relative to the configured API base URL
/// (`workspaces/123/items`) or an absolute URL, which is what status
/// endpoints hand back in `Location` headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Vec<u8>>,
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: None, headers: BTreeMap::new(), timeout: None }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Attach a JSON body and the matching content type.
    ///
    /// # Errors
    /// Returns [`FlowError::InvalidResponse`] if the payload cannot be
    /// serialized.
    pub fn with_json<T: Serialize + ?Sized>(self, payload: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(payload)?;
        Ok(self.with_body(bytes, "application/json"))
    }

    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>, content_type: &str) -> Self {
        self.body = Some(body);
        self.headers.insert("content-type".to_string(), content_type.to_string());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Per-request timeout hint; the transport falls back to its default.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Response handed back by the transport.
///
/// Header names are stored lower-cased so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn new<K, V, I>(status: u16, headers: I, body: Vec<u8>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let headers =
            headers.into_iter().map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into())).collect();
        Self { status, headers, body }
    }

    /// Response with no headers, mostly useful in tests.
    pub fn from_status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: BTreeMap::new(), body: body.into() }
    }

    /// Response carrying a JSON body.
    pub fn json_body(status: u16, body: &Value) -> Self {
        Self::new(status, [("content-type", "application/json")], body.to_string().into_bytes())
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub const fn status(&self) -> u16 {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON, or `None` when empty or not JSON.
    pub fn json_value(&self) -> Option<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// Deserialize the body into `T`.
    ///
    /// # Errors
    /// Returns [`FlowError::InvalidResponse`] when the body does not match.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            FlowError::InvalidResponse(format!(
                "failed to decode {} byte body from status {}: {e}",
                self.body.len(),
                self.status
            ))
        })
    }

    /// `Retry-After` expressed in whole seconds.
    ///
    /// HTTP-date values and garbage are ignored so callers fall back to
    /// their own interval.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header(HEADER_RETRY_AFTER)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Human-readable error text for a non-success response.
    ///
    /// Prefers the structured `code: message` pair from a JSON error body,
    /// falls back to the raw body (truncated), then to the status code.
    pub fn error_message(&self) -> String {
        if let Some((code, message)) = self.json_value().as_ref().and_then(error_parts) {
            let text = match code {
                Some(code) => format!("{code}: {message}"),
                None => message,
            };
            return text.as_str().truncated();
        }

        let text = self.text();
        let text = text.trim();
        if text.is_empty() {
            format!("HTTP {}", self.status)
        } else {
            text.truncated()
        }
    }
}

/// Extract `(code, message)` from the error body shapes the platform and its
/// identity provider use.
fn error_parts(body: &Value) -> Option<(Option<String>, String)> {
    let str_field = |v: &Value, keys: &[&str]| {
        keys.iter().find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
    };

    if let Some(inner) = body.get("error").filter(|v| v.is_object()) {
        let message = str_field(inner, &["message", "errorMessage"])?;
        return Some((str_field(inner, &["code", "errorCode"]), message));
    }

    // OAuth style: {"error": "invalid_client", "error_description": "..."}
    if let Some(description) = str_field(body, &["error_description"]) {
        return Some((str_field(body, &["error"]), description));
    }

    let message = str_field(body, &["message", "errorMessage"])?;
    Some((str_field(body, &["errorCode", "code"]), message))
}
