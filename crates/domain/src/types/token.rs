//! Bearer token value owned by the token cache

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access token with optional expiry.
///
/// `Debug` redacts the secret so tokens can sit inside traced structs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { value: value.into(), expires_at }
    }

    /// Token that expires `lifetime` after `issued_at`.
    pub fn expiring_in(
        value: impl Into<String>,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        let expires_at = chrono::Duration::from_std(lifetime)
            .ok()
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime));
        Self::new(value, expires_at)
    }

    /// Seconds until expiry; negative once expired, `None` without expiry.
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|at| (at - now).num_seconds())
    }

    /// True when the token is expired or will expire within `margin`.
    ///
    /// Tokens without an expiry are never stale by time; they are only
    /// replaced after the service rejects them.
    pub fn is_stale(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        let margin = i64::try_from(margin.as_secs()).unwrap_or(i64::MAX);
        self.seconds_until_expiry(now).is_some_and(|remaining| remaining <= margin)
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
