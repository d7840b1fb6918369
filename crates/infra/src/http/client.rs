use std::time::Duration;

use async_trait::async_trait;
use fabricflow_core::Transport;
use fabricflow_domain::config::ApiConfig;
use fabricflow_domain::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS, MAX_ERROR_BODY_BYTES, USER_AGENT,
};
use fabricflow_domain::{ApiRequest, ApiResponse, FlowError, HttpMethod, Result, Token};
use reqwest::{Client as ReqwestClient, Method, Response};
use tracing::debug;
use url::Url;

use crate::errors::InfraError;

/// [`Transport`] backed by `reqwest`.
///
/// Sends each request exactly once. Retrying is left to the dispatcher, so
/// every HTTP response comes back as `Ok` whatever its status.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
    base_url: Url,
    max_error_body_bytes: usize,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Transport configured from the `api` config section.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let mut builder =
            Self::builder().base_url(config.base_url.as_str()).timeout(config.request_timeout());
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        builder.build()
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an API path against the base URL; absolute URLs pass through.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        let resolved = if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(path)
        } else {
            self.base_url.join(path.trim_start_matches('/'))
        };
        resolved.map_err(|err| FlowError::from(InfraError::from(err)))
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url.as_str())
            .field("max_error_body_bytes", &self.max_error_body_bytes)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest, token: &Token) -> Result<ApiResponse> {
        let url = self.resolve(&request.path)?;
        let method = to_method(request.method);

        let mut builder =
            self.client.request(method.clone(), url.clone()).bearer_auth(&token.value);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        debug!(%method, %url, "sending HTTP request");
        let response = builder.send().await.map_err(InfraError::from)?;

        let status = response.status();
        debug!(%method, %url, %status, "received HTTP response");

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = if status.is_success() {
            response.bytes().await.map_err(InfraError::from)?.to_vec()
        } else {
            read_capped(response, self.max_error_body_bytes).await?
        };

        Ok(ApiResponse::new(status.as_u16(), headers, body))
    }
}

/// Read at most `limit` bytes of an error body.
async fn read_capped(mut response: Response, limit: usize) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(InfraError::from)? {
        let room = limit.saturating_sub(body.len());
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= limit {
            debug!(limit, "error body truncated");
            break;
        }
    }
    Ok(body)
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: Option<String>,
    max_error_body_bytes: usize,
    system_proxy: bool,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: None,
            max_error_body_bytes: MAX_ERROR_BODY_BYTES,
            system_proxy: false,
        }
    }
}

impl ReqwestTransportBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Default timeout for requests that carry no timeout hint.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Bytes kept from non-success response bodies.
    pub fn max_error_body_bytes(mut self, limit: usize) -> Self {
        self.max_error_body_bytes = limit.max(1);
        self
    }

    /// Honour `HTTP(S)_PROXY` from the environment.
    pub fn system_proxy(mut self, enabled: bool) -> Self {
        self.system_proxy = enabled;
        self
    }

    pub fn build(self) -> Result<ReqwestTransport> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            // Url::join replaces the last segment unless the base ends in '/'
            raw.push('/');
        }
        let base_url = Url::parse(&raw).map_err(|err| {
            FlowError::Config(format!("invalid api.base_url '{}': {err}", self.base_url))
        })?;

        let agent = self.user_agent.unwrap_or_else(|| USER_AGENT.to_string());
        let mut builder = ReqwestClient::builder().timeout(self.timeout).user_agent(agent);
        if !self.system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(|err| FlowError::from(InfraError::from(err)))?;

        Ok(ReqwestTransport {
            client,
            base_url,
            max_error_body_bytes: self.max_error_body_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport(server: &MockServer) -> ReqwestTransport {
        ReqwestTransport::builder()
            .base_url(format!("{}/v1", server.uri()))
            .timeout(Duration::from_secs(5))
            .build()
            .expect("transport")
    }

    fn token() -> Token {
        Token::new("secret-token", None)
    }

    #[tokio::test]
    async fn sends_bearer_token_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/workspaces"))
            .and(header("authorization", "Bearer secret-token"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"displayName":"demo"}"#))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"id":"w1"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let request = ApiRequest::post("workspaces")
            .with_json(&serde_json::json!({"displayName": "demo"}))
            .unwrap();
        let response = transport(&server).execute(&request, &token()).await.expect("response");

        assert_eq!(response.status(), 201);
        assert_eq!(response.json_value().unwrap()["id"], "w1");
    }

    #[tokio::test]
    async fn returns_error_statuses_as_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .expect(1)
            .mount(&server)
            .await;

        let response =
            transport(&server).execute(&ApiRequest::get("items"), &token()).await.unwrap();

        assert_eq!(response.status(), 429);
        assert_eq!(response.retry_after(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn absolute_status_urls_bypass_base() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/elsewhere/operations/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"Running"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/elsewhere/operations/1", server.uri());
        let response = transport(&server).execute(&ApiRequest::get(url), &token()).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn caps_error_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(10_000)))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::builder()
            .base_url(server.uri())
            .max_error_body_bytes(100)
            .build()
            .unwrap();
        let response = transport.execute(&ApiRequest::get("boom"), &token()).await.unwrap();
        assert_eq!(response.status(), 500);
        assert_eq!(response.body().len(), 100);
    }

    #[tokio::test]
    async fn slow_response_times_out_as_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let request = ApiRequest::get("slow").with_timeout(Duration::from_millis(50));
        let err = transport(&server).execute(&request, &token()).await.unwrap_err();
        assert!(matches!(err, FlowError::Transport { retryable: true, .. }), "got {err:?}");
    }

    #[test]
    fn resolves_relative_paths_under_base() {
        let transport =
            ReqwestTransport::builder().base_url("https://api.example.com/v1").build().unwrap();
        assert_eq!(
            transport.resolve("/workspaces/1/items").unwrap().as_str(),
            "https://api.example.com/v1/workspaces/1/items"
        );
        assert_eq!(
            transport.resolve("operations/abc").unwrap().as_str(),
            "https://api.example.com/v1/operations/abc"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = ReqwestTransport::builder().base_url("not a url").build().unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }
}
