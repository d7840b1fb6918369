//! Single-owner token cache with refresh-ahead

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fabricflow_domain::constants::DEFAULT_TOKEN_REFRESH_MARGIN_SECS;
use fabricflow_domain::{FlowError, Result, Token};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::ports::CredentialSource;

/// Caches the current access token and refreshes it before it expires.
///
/// The lock is held across the refresh call, so concurrent callers that
/// find the token stale wait for one refresh instead of each starting their
/// own.
pub struct AuthTokenCache {
    source: Arc<dyn CredentialSource>,
    refresh_margin: Duration,
    current: Mutex<Option<Token>>,
}

impl AuthTokenCache {
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self {
            source,
            refresh_margin: Duration::from_secs(DEFAULT_TOKEN_REFRESH_MARGIN_SECS),
            current: Mutex::new(None),
        }
    }

    /// Refresh tokens that expire within `margin` instead of the default
    /// five minutes.
    #[must_use]
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub const fn refresh_margin(&self) -> Duration {
        self.refresh_margin
    }

    /// Return a token that is valid for at least the refresh margin.
    ///
    /// # Errors
    /// Returns [`FlowError::Auth`] when the credential source fails. Errors
    /// are never cached; the next call tries again.
    #[instrument(skip(self))]
    pub async fn get_token(&self) -> Result<Token> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            if !token.is_stale(self.refresh_margin, Utc::now()) {
                return Ok(token.clone());
            }
            debug!(expires_at = ?token.expires_at, "cached token inside refresh margin");
        }

        let fresh = self.source.fetch_token().await.map_err(|err| match err {
            FlowError::Auth(_) => err,
            other => FlowError::Auth(format!("credential source failed: {other}")),
        })?;

        if fresh.is_stale(self.refresh_margin, Utc::now()) {
            warn!(
                expires_at = ?fresh.expires_at,
                margin_secs = self.refresh_margin.as_secs(),
                "issued token already falls inside the refresh margin"
            );
        } else {
            info!(expires_at = ?fresh.expires_at, "access token refreshed");
        }

        *current = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop `rejected` so the next [`get_token`](Self::get_token) fetches a
    /// new one.
    ///
    /// Does nothing if the cache already holds a different token, which
    /// happens when another task refreshed after `rejected` was handed out.
    /// Returns whether the cached token was dropped.
    pub async fn invalidate(&self, rejected: &Token) -> bool {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(|token| token.value == rejected.value) {
            *current = None;
            debug!("cached token invalidated after rejection");
            true
        } else {
            false
        }
    }

    /// Drop whatever token is cached.
    pub async fn clear(&self) {
        *self.current.lock().await = None;
    }

    /// Currently cached token, without refreshing.
    pub async fn cached(&self) -> Option<Token> {
        self.current.lock().await.clone()
    }
}

impl std::fmt::Debug for AuthTokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokenCache").field("refresh_margin", &self.refresh_margin).finish()
    }
}
