//! Single-flight token refresh coordination.

use std::mem;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::session::SessionController;
use super::store::SessionStore;
use super::token::{Session, TokenGrant, TokenSet};
use crate::client::http::parse_error_body;
use crate::error::{ApiError, RefreshFailure};

/// Outcome delivered to every caller parked on one refresh: the new access
/// token, or the shared failure.
type RefreshOutcome = Result<String, RefreshFailure>;

enum GateState {
    Idle,
    Refreshing(Vec<oneshot::Sender<RefreshOutcome>>),
}

/// Single-flight coordinator for token refresh.
///
/// At most one refresh call is in flight at any time. The first caller to
/// hit an expired token drives the refresh; callers arriving while it runs
/// are parked and settled with that refresh's outcome. A failed refresh is
/// terminal: it is never retried, and it triggers exactly one forced logout.
pub struct AuthGate {
    http: reqwest::Client,
    refresh_url: String,
    timeout: Duration,
    skew: chrono::Duration,
    store: Arc<dyn SessionStore>,
    session: Arc<SessionController>,
    state: Mutex<GateState>,
}

impl AuthGate {
    pub(crate) fn new(
        http: reqwest::Client,
        refresh_url: String,
        timeout: Duration,
        skew: chrono::Duration,
        store: Arc<dyn SessionStore>,
        session: Arc<SessionController>,
    ) -> Self {
        Self {
            http,
            refresh_url,
            timeout,
            skew,
            store,
            session,
            state: Mutex::new(GateState::Idle),
        }
    }

    /// Obtain a fresh access token, joining an in-flight refresh if one is
    /// already running.
    ///
    /// A caller that aborts while parked simply drops its receiver; settling
    /// it becomes a no-op without affecting other waiters or the refresh.
    pub async fn fresh_access_token(&self) -> Result<String, ApiError> {
        let waiter = {
            let mut state = self.lock_state();
            match &mut *state {
                GateState::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                GateState::Idle => {
                    *state = GateState::Refreshing(Vec::new());
                    None
                }
            }
        };

        match waiter {
            Some(rx) => match rx.await {
                Ok(Ok(token)) => Ok(token),
                Ok(Err(failure)) => Err(ApiError::RefreshFailed(failure)),
                Err(_) => Err(ApiError::RefreshFailed(aborted_failure())),
            },
            None => self.drive_refresh().await,
        }
    }

    /// Run the refresh call and settle every parked waiter with its outcome.
    async fn drive_refresh(&self) -> Result<String, ApiError> {
        let guard = SettleGuard::new(self);

        let outcome = match self.call_refresh_endpoint().await {
            Ok(tokens) => match self.persist(tokens) {
                Ok(access_token) => Ok(access_token),
                Err(err) => Err(RefreshFailure {
                    status: None,
                    code: None,
                    message: format!("failed to persist refreshed tokens: {err}"),
                }),
            },
            Err(failure) => Err(failure),
        };

        guard.settle(outcome.clone());

        match outcome {
            Ok(token) => {
                tracing::debug!("token refresh succeeded");
                Ok(token)
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "token refresh failed; ending session");
                self.session.force_logout();
                Err(ApiError::RefreshFailed(failure))
            }
        }
    }

    async fn call_refresh_endpoint(&self) -> Result<TokenSet, RefreshFailure> {
        let session = match self.store.load() {
            Ok(Some(session)) => session,
            Ok(None) => {
                return Err(RefreshFailure {
                    status: None,
                    code: None,
                    message: "no stored session to refresh".to_string(),
                })
            }
            Err(err) => {
                return Err(RefreshFailure {
                    status: None,
                    code: None,
                    message: format!("failed to read stored session: {err}"),
                })
            }
        };
        let previous_refresh = session.tokens.refresh_token;

        let response = self
            .http
            .post(&self.refresh_url)
            .timeout(self.timeout)
            .json(&RefreshRequest {
                refresh_token: &previous_refresh,
            })
            .send()
            .await
            .map_err(|err| RefreshFailure {
                status: None,
                code: None,
                message: format!("refresh request failed: {err}"),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            let (code, message) = parse_error_body(&body);
            return Err(RefreshFailure {
                status: Some(status),
                code,
                message,
            });
        }

        let payload: RefreshResponse =
            serde_json::from_str(&body).map_err(|err| RefreshFailure {
                status: Some(status),
                code: None,
                message: format!("malformed refresh response: {err}"),
            })?;
        if !payload.success {
            return Err(RefreshFailure {
                status: Some(status),
                code: None,
                message: payload
                    .message
                    .unwrap_or_else(|| "refresh rejected".to_string()),
            });
        }
        let grant = payload.tokens.ok_or_else(|| RefreshFailure {
            status: Some(status),
            code: None,
            message: "refresh response missing tokens".to_string(),
        })?;

        grant
            .into_token_set(Some(previous_refresh), self.skew)
            .ok_or_else(|| RefreshFailure {
                status: Some(status),
                code: None,
                message: "refresh response missing refresh token".to_string(),
            })
    }

    /// Persist before settling waiters so replays read the new token.
    fn persist(&self, tokens: TokenSet) -> Result<String, ApiError> {
        let user = self.store.load().ok().flatten().and_then(|s| s.user);
        let access_token = tokens.access_token.clone();
        self.store.save(&Session { tokens, user })?;
        Ok(access_token)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_waiters(&self) -> Vec<oneshot::Sender<RefreshOutcome>> {
        let mut state = self.lock_state();
        match mem::replace(&mut *state, GateState::Idle) {
            GateState::Refreshing(waiters) => waiters,
            GateState::Idle => Vec::new(),
        }
    }
}

fn aborted_failure() -> RefreshFailure {
    RefreshFailure {
        status: None,
        code: None,
        message: "refresh aborted before completion".to_string(),
    }
}

/// Settles parked waiters even if the driving future is dropped mid-refresh
/// (e.g., the driving caller's timeout fires). Waiters must never be left
/// suspended.
struct SettleGuard<'a> {
    gate: &'a AuthGate,
    settled: bool,
}

impl<'a> SettleGuard<'a> {
    fn new(gate: &'a AuthGate) -> Self {
        Self {
            gate,
            settled: false,
        }
    }

    fn settle(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        for waiter in self.gate.take_waiters() {
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let failure = aborted_failure();
        for waiter in self.gate.take_waiters() {
            let _ = waiter.send(Err(failure.clone()));
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    success: bool,
    #[serde(default)]
    tokens: Option<TokenGrant>,
    #[serde(default)]
    message: Option<String>,
}
