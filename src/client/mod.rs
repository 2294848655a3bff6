//! Authenticated API client: request pipeline, retry, refresh, replay.

pub mod http;
pub mod request;
pub mod response;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};

use crate::auth::gate::AuthGate;
use crate::auth::session::{SessionController, SessionEndedHook};
use crate::auth::store::{MemorySessionStore, SessionStore};
use crate::auth::token::{Session, TokenGrant, UserProfile, DEFAULT_EXPIRY_SKEW_SECS};
use crate::error::{ApiError, Result};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

use http::{bearer_value, shared_client, status_to_error};
use request::RequestDescriptor;
use response::ApiResponse;

const DEFAULT_LOGIN_PATH: &str = "/auth/login";
const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: String,
    login_path: String,
    refresh_path: String,
    timeout: Duration,
    retry: RetryPolicy,
    skew_secs: i64,
    store: Option<Arc<dyn SessionStore>>,
    on_session_end: Option<SessionEndedHook>,
}

impl ApiClientBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            skew_secs: DEFAULT_EXPIRY_SKEW_SECS,
            store: None,
            on_session_end: None,
        }
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Per-request timeout, also applied to refresh calls.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Safety margin subtracted from server-declared token lifetimes.
    pub fn expiry_skew(mut self, skew: Duration) -> Self {
        self.skew_secs = skew.as_secs() as i64;
        self
    }

    /// Session persistence backend. Defaults to an in-memory store.
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Callback fired exactly once when the session ends unrecoverably.
    pub fn on_session_end<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_session_end = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> ApiClient {
        let store: Arc<dyn SessionStore> = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));
        let session = Arc::new(SessionController::new(store.clone(), self.on_session_end));
        let skew = chrono::Duration::seconds(self.skew_secs);
        let gate = AuthGate::new(
            shared_client().clone(),
            join_url(&self.base_url, &self.refresh_path),
            self.timeout,
            skew,
            store.clone(),
            session.clone(),
        );
        ApiClient {
            inner: Arc::new(ClientInner {
                http: shared_client().clone(),
                base_url: self.base_url.clone(),
                login_url: join_url(&self.base_url, &self.login_path),
                timeout: self.timeout,
                retry: self.retry,
                skew_secs: self.skew_secs,
                store,
                session,
                gate,
            }),
        }
    }
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    login_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    skew_secs: i64,
    store: Arc<dyn SessionStore>,
    session: Arc<SessionController>,
    gate: AuthGate,
}

/// Resilient authenticated API client.
///
/// Cheap to clone; all clones share one session store, one retry policy,
/// and one refresh gate, so concurrent requests across clones still
/// coordinate on a single refresh.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url)
    }

    /// Establish a session with the auth backend and cache the user blob.
    pub async fn login<C: Serialize>(&self, credentials: &C) -> Result<Option<UserProfile>> {
        let response = self
            .inner
            .http
            .post(&self.inner.login_url)
            .timeout(self.inner.timeout)
            .json(credentials)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            return Err(status_to_error(status, &body));
        }

        let payload: LoginResponse = serde_json::from_str(&body)?;
        if !payload.success {
            return Err(ApiError::AuthRejected {
                status,
                message: payload
                    .message
                    .unwrap_or_else(|| "login rejected".to_string()),
            });
        }
        let grant = payload
            .tokens
            .ok_or_else(|| ApiError::InvalidResponse("login response missing tokens".to_string()))?;
        let tokens = grant
            .into_token_set(None, chrono::Duration::seconds(self.inner.skew_secs))
            .ok_or_else(|| {
                ApiError::InvalidResponse("login response missing refresh token".to_string())
            })?;

        self.inner.store.save(&Session {
            tokens,
            user: payload.user.clone(),
        })?;
        self.inner.session.rearm();
        Ok(payload.user)
    }

    /// Drop the stored session. Caller-initiated, so the session-ended
    /// callback does not fire.
    pub fn logout(&self) -> Result<()> {
        self.inner.store.clear()?;
        Ok(())
    }

    /// Cached user profile, present iff authenticated.
    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.store.load().ok().flatten().and_then(|s| s.user)
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.execute(RequestDescriptor::get(path)).await
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.execute(RequestDescriptor::post(path, body)).await
    }

    pub async fn put(&self, path: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.execute(RequestDescriptor::put(path, body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.execute(RequestDescriptor::delete(path)).await
    }

    /// Execute a request through the full resilient path: attach the stored
    /// token, retry transient failures, and on an expired-token rejection
    /// refresh once (single-flight) and replay with a fresh retry budget.
    pub async fn execute(&self, request: RequestDescriptor) -> Result<ApiResponse> {
        let mut request = request;
        let policy = if self.inner.retry.retry_mutations || request.is_idempotent() {
            self.inner.retry.clone()
        } else {
            self.inner.retry.single_attempt()
        };

        let first = policy.execute(|| self.dispatch(&request)).await;
        let outcome = match first {
            Err(ApiError::TokenExpired) if !request.retried => {
                request.retried = true;
                with_timeout(self.inner.timeout, self.inner.gate.fresh_access_token()).await?;
                policy.execute(|| self.dispatch(&request)).await
            }
            // Expired again right after a successful refresh: the session is
            // unusable, surface it as a rejection instead of looping.
            Err(ApiError::TokenExpired) => Err(ApiError::AuthRejected {
                status: 401,
                message: "token expired immediately after refresh".to_string(),
            }),
            other => other,
        };

        if let Err(ApiError::AuthRejected { .. }) = &outcome {
            self.inner.session.force_logout();
        }
        outcome
    }

    /// Pre-flight and transport for one attempt. Decorates the call with
    /// whatever token is currently stored; the server, not the local clock,
    /// decides staleness.
    async fn dispatch(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
        let url = join_url(&self.inner.base_url, &request.path);
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), &url)
            .timeout(self.inner.timeout)
            .headers(request.headers.clone());
        if let Some(session) = self.inner.store.load()? {
            if let Some(value) = bearer_value(&session.tokens.access_token) {
                builder = builder.header(AUTHORIZATION, value);
            }
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        if (200..300).contains(&status) {
            Ok(ApiResponse::new(status, headers, body))
        } else {
            Err(status_to_error(status, &body))
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    success: bool,
    #[serde(default)]
    tokens: Option<TokenGrant>,
    #[serde(default)]
    user: Option<UserProfile>,
    #[serde(default)]
    message: Option<String>,
}
