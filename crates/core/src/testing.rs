//! In-memory doubles for the transport and credential ports
//!
//! Available to this crate's tests and, through the `test-utils` feature,
//! to other crates in the workspace.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fabricflow_domain::{ApiRequest, ApiResponse, FlowError, HttpMethod, Result, Token};

use crate::auth::ports::CredentialSource;
use crate::dispatch::ports::Transport;

/// A request seen by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub path: String,
    pub token: String,
}

/// Transport that replays scripted replies per request path.
///
/// Replies for a path are consumed in order; the last one repeats forever,
/// which makes "stuck in Running" easy to express. Unscripted paths answer
/// 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Result<ApiResponse>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `path`.
    pub fn respond(&self, path: &str, response: ApiResponse) -> &Self {
        lock(&self.routes).entry(path.to_string()).or_default().push_back(Ok(response));
        self
    }

    /// Queue a transport error for `path`.
    pub fn fail(&self, path: &str, error: FlowError) -> &Self {
        lock(&self.routes).entry(path.to_string()).or_default().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        lock(&self.calls).iter().filter(|call| call.path == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &ApiRequest, token: &Token) -> Result<ApiResponse> {
        lock(&self.calls).push(RecordedCall {
            method: request.method,
            path: request.path.clone(),
            token: token.value.clone(),
        });

        let mut routes = lock(&self.routes);
        let Some(queue) = routes.get_mut(&request.path) else {
            let body = format!("no scripted route for {}", request.path);
            return Ok(ApiResponse::from_status(404, body));
        };
        let reply = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
        reply.unwrap_or_else(|| Ok(ApiResponse::from_status(404, "empty script")))
    }
}

/// Credential source issuing `token-1`, `token-2`, ... and counting calls.
#[derive(Debug, Default)]
pub struct CountingCredentials {
    calls: AtomicUsize,
    lifetime: Option<Duration>,
    failures: usize,
}

impl CountingCredentials {
    /// Tokens without expiry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue tokens that expire `lifetime` after they are fetched.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Fail the first `count` fetches with a transport error.
    #[must_use]
    pub fn failing_first(mut self, count: usize) -> Self {
        self.failures = count;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for CountingCredentials {
    async fn fetch_token(&self) -> Result<Token> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(FlowError::transient_transport("identity provider unreachable"));
        }
        let value = format!("token-{call}");
        Ok(match self.lifetime {
            Some(lifetime) => Token::expiring_in(value, Utc::now(), lifetime),
            None => Token::new(value, None),
        })
    }
}
