//! Credential sources for the token cache
//!
//! - [`StaticTokenSource`]: a pre-issued token, e.g. from a pipeline secret
//! - [`ClientCredentialsSource`]: OAuth2 client-credentials grant against the
//!   identity provider's v2 token endpoint

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fabricflow_core::CredentialSource;
use fabricflow_domain::config::AuthConfig;
use fabricflow_domain::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, USER_AGENT};
use fabricflow_domain::{ApiResponse, FlowError, Result, Token};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::errors::InfraError;

/// Hands out the same token every time.
///
/// A rejected static token cannot be replaced, so a 401 after the forced
/// refresh surfaces as an authentication error.
#[derive(Clone)]
pub struct StaticTokenSource {
    token: Token,
}

impl StaticTokenSource {
    pub fn new(value: impl Into<String>) -> Self {
        Self { token: Token::new(value, None) }
    }

    pub const fn from_token(token: Token) -> Self {
        Self { token }
    }
}

impl std::fmt::Debug for StaticTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenSource").field("token", &self.token).finish()
    }
}

#[async_trait]
impl CredentialSource for StaticTokenSource {
    async fn fetch_token(&self) -> Result<Token> {
        Ok(self.token.clone())
    }
}

/// Service-principal credentials exchanged for tokens on demand.
pub struct ClientCredentialsSource {
    client: ReqwestClient,
    token_url: Url,
    client_id: String,
    client_secret: String,
    scope: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "lifetime_secs")]
    expires_in: Option<u64>,
}

/// `expires_in` arrives as a number from the v2 endpoint and as a string
/// from older ones.
fn lifetime_secs<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl ClientCredentialsSource {
    /// Build a source for `{authority_url}/{tenant_id}/oauth2/v2.0/token`.
    ///
    /// # Errors
    /// Returns [`FlowError::Config`] when the authority URL is malformed.
    pub fn new(
        authority_url: &str,
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Result<Self> {
        let raw = format!(
            "{}/{}/oauth2/v2.0/token",
            authority_url.trim_end_matches('/'),
            tenant_id.trim_matches('/')
        );
        let token_url = Url::parse(&raw)
            .map_err(|err| FlowError::Config(format!("invalid token endpoint '{raw}': {err}")))?;

        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .no_proxy()
            .build()
            .map_err(|err| FlowError::from(InfraError::from(err)))?;

        Ok(Self {
            client,
            token_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
        })
    }

    pub const fn token_url(&self) -> &Url {
        &self.token_url
    }
}

impl std::fmt::Debug for ClientCredentialsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsSource")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialSource for ClientCredentialsSource {
    #[instrument(skip(self), fields(client_id = %self.client_id))]
    async fn fetch_token(&self) -> Result<Token> {
        let issued_at = Utc::now();
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .client
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(InfraError::from)?;
        let status = response.status();
        let body = response.bytes().await.map_err(InfraError::from)?;

        if !status.is_success() {
            let response = ApiResponse::from_status(status.as_u16(), body.to_vec());
            return Err(FlowError::Auth(format!(
                "token request failed ({}): {}",
                status.as_u16(),
                response.error_message()
            )));
        }

        let parsed: TokenResponse = serde_json::from_slice(&body)
            .map_err(|err| FlowError::Auth(format!("malformed token response: {err}")))?;
        debug!(expires_in = ?parsed.expires_in, "token issued");

        let lifetime = parsed.expires_in.map(Duration::from_secs);
        Ok(match lifetime {
            Some(lifetime) => Token::expiring_in(parsed.access_token, issued_at, lifetime),
            None => Token::new(parsed.access_token, None),
        })
    }
}

/// Pick the credential source described by `config`.
///
/// A static `token` wins over client credentials.
///
/// # Errors
/// Returns [`FlowError::Config`] when neither is configured.
pub fn credential_source(config: &AuthConfig) -> Result<Arc<dyn CredentialSource>> {
    if let Some(token) = &config.token {
        return Ok(Arc::new(StaticTokenSource::new(token.as_str())));
    }

    match (&config.tenant_id, &config.client_id, &config.client_secret) {
        (Some(tenant), Some(client_id), Some(secret)) => {
            let source = ClientCredentialsSource::new(
                &config.authority_url,
                tenant,
                client_id.as_str(),
                secret.as_str(),
                config.scope.as_str(),
            )?;
            Ok(Arc::new(source))
        }
        _ => Err(FlowError::Config(
            "no credentials configured: set auth.token or auth.tenant_id, auth.client_id and \
             auth.client_secret"
                .into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn source(server: &MockServer) -> ClientCredentialsSource {
        ClientCredentialsSource::new(&server.uri(), "tenant-1", "app", "s3cret", "scope/.default")
            .expect("source")
    }

    #[tokio::test]
    async fn exchanges_client_credentials_for_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "issued"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = source(&server).fetch_token().await.unwrap();
        assert_eq!(token.value, "issued");
        let remaining = token.seconds_until_expiry(Utc::now()).unwrap();
        assert!((3590..=3599).contains(&remaining), "remaining {remaining}");
    }

    #[tokio::test]
    async fn accepts_string_lifetime() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "expires_in": "600",
                "access_token": "legacy"
            })))
            .mount(&server)
            .await;

        let token = source(&server).fetch_token().await.unwrap();
        assert!(token.expires_at.is_some());
    }

    #[tokio::test]
    async fn rejected_credentials_are_auth_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided."
            })))
            .mount(&server)
            .await;

        let err = source(&server).fetch_token().await.unwrap_err();
        match err {
            FlowError::Auth(message) => {
                assert!(message.contains("401"));
                assert!(message.contains("invalid_client"));
            }
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn static_source_returns_configured_token() {
        let source = StaticTokenSource::new("pre-issued");
        assert_eq!(source.fetch_token().await.unwrap().value, "pre-issued");
    }

    #[test]
    fn config_selects_source() {
        let mut config = AuthConfig::default();
        assert!(matches!(credential_source(&config), Err(FlowError::Config(_))));

        config.token = Some("t".into());
        assert!(credential_source(&config).is_ok());

        config.token = None;
        config.tenant_id = Some("tenant".into());
        config.client_id = Some("app".into());
        config.client_secret = Some("secret".into());
        assert!(credential_source(&config).is_ok());
    }
}
