//! Terminal session teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::store::SessionStore;

/// Callback invoked when the session ends unrecoverably (e.g., navigate the
/// host application back to its login surface).
pub type SessionEndedHook = Box<dyn Fn() + Send + Sync>;

/// Idempotent terminal-failure handler.
///
/// When a refresh fails, every caller parked on it fails at the same moment;
/// `force_logout` guarantees that state is cleared and the session-ended
/// hook fires exactly once regardless of how many of them call it.
pub struct SessionController {
    store: Arc<dyn SessionStore>,
    hook: Option<SessionEndedHook>,
    fired: AtomicBool,
}

impl SessionController {
    pub(crate) fn new(store: Arc<dyn SessionStore>, hook: Option<SessionEndedHook>) -> Self {
        Self {
            store,
            hook,
            fired: AtomicBool::new(false),
        }
    }

    /// Clear session state and signal the host application, exactly once.
    ///
    /// Concurrent and repeated calls after the first are no-ops until a new
    /// session is established.
    pub fn force_logout(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::warn!("session terminated; clearing stored credentials");
        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %err, "failed to clear session store");
        }
        if let Some(hook) = &self.hook {
            hook();
        }
    }

    /// Re-arm after a new session is established via login.
    pub(crate) fn rearm(&self) {
        self.fired.store(false, Ordering::SeqCst);
    }
}
