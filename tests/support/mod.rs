#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tether::auth::StoreError;
use tether::prelude::*;
use wiremock::{Match, MockServer, Request};

pub fn token_set(access: &str, refresh: &str) -> TokenSet {
    TokenSet {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_at: Utc::now() + chrono::Duration::hours(1),
    }
}

pub fn session(access: &str, refresh: &str) -> Session {
    Session {
        tokens: token_set(access, refresh),
        user: None,
    }
}

/// In-memory store that counts `clear` calls, for logout assertions.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemorySessionStore,
    clears: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(access: &str, refresh: &str) -> Arc<Self> {
        let store = Arc::new(Self::new());
        store.save(&session(access, refresh)).expect("seed session");
        store
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl SessionStore for RecordingStore {
    fn load(&self) -> std::result::Result<Option<Session>, StoreError> {
        self.inner.load()
    }

    fn save(&self, session: &Session) -> std::result::Result<(), StoreError> {
        self.inner.save(session)
    }

    fn clear(&self) -> std::result::Result<(), StoreError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear()
    }
}

/// Matches only requests carrying no Authorization header.
pub struct NoAuthHeader;

impl Match for NoAuthHeader {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}

/// Client against the mock server with fast retries and a session-end
/// counter.
pub fn client_for(
    server: &MockServer,
    store: Arc<RecordingStore>,
) -> (ApiClient, Arc<AtomicUsize>) {
    let ended = Arc::new(AtomicUsize::new(0));
    let hook_ended = ended.clone();
    let client = ApiClient::builder(server.uri())
        .timeout(Duration::from_secs(5))
        .retry_policy(RetryPolicy::new(3, Duration::from_millis(1)))
        .session_store(store)
        .on_session_end(move || {
            hook_ended.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    (client, ended)
}

pub fn session_end_count(ended: &Arc<AtomicUsize>) -> usize {
    ended.load(Ordering::SeqCst)
}
