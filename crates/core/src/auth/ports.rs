//! Port interface for credential providers

use async_trait::async_trait;
use fabricflow_domain::{Result, Token};

/// Produces fresh access tokens.
///
/// Implementations talk to an identity provider (or return a pre-issued
/// token). They are called only by
/// [`AuthTokenCache`](super::AuthTokenCache), never per request.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Obtain a new token from the identity provider.
    async fn fetch_token(&self) -> Result<Token>;
}
