//! Error types for Tether.

use thiserror::Error;

/// Terminal outcome of a failed token refresh.
///
/// Cloneable so a single refresh outcome can settle every caller parked on
/// the same in-flight refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    /// HTTP status of the refresh response, when one was received.
    pub status: Option<u16>,
    /// Machine-readable error code from the response body, if present.
    pub code: Option<String>,
    pub message: String,
}

impl std::fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status, self.code.as_deref()) {
            (Some(status), Some(code)) => {
                write!(f, "{} (status {status}, code {code})", self.message)
            }
            (Some(status), None) => write!(f, "{} (status {status})", self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

/// Primary error type for all Tether operations.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Request failed (status {status}): {message}")]
    Client {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The server reported an expired access token. Handled internally by
    /// refresh-and-replay; callers only observe it if replay is impossible.
    #[error("Access token expired")]
    TokenExpired,

    #[error("Authentication rejected (status {status}): {message}")]
    AuthRejected { status: u16, message: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(RefreshFailure),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    Store(#[from] crate::auth::error::StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether retrying this error may change the outcome.
    ///
    /// Transient: the request never reached the server (connect/reset/DNS,
    /// timeout) or the server failed internally (5xx). Everything else is
    /// permanent, including expired-token 401s, which are handled by the
    /// refresh path rather than the retry loop.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Server { .. }
        )
    }

    /// HTTP status carried by this error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. }
            | Self::Client { status, .. }
            | Self::AuthRejected { status, .. } => Some(*status),
            Self::RefreshFailed(failure) => failure.status,
            Self::TokenExpired => Some(401),
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = ApiError::Server {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn timeout_is_transient() {
        assert!(ApiError::Timeout(120_000).is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = ApiError::Client {
            status: 422,
            code: None,
            message: "validation".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn token_expired_is_not_transient() {
        // The refresh path owns this case; the retry loop must not consume it.
        assert!(!ApiError::TokenExpired.is_transient());
    }

    #[test]
    fn refresh_failure_is_permanent() {
        let err = ApiError::RefreshFailed(RefreshFailure {
            status: Some(401),
            code: Some("INVALID_REFRESH_TOKEN".to_string()),
            message: "refresh rejected".to_string(),
        });
        assert!(!err.is_transient());
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn refresh_failure_display_includes_status_and_code() {
        let failure = RefreshFailure {
            status: Some(401),
            code: Some("INVALID_REFRESH_TOKEN".to_string()),
            message: "refresh rejected".to_string(),
        };
        let msg = failure.to_string();
        assert!(msg.contains("401"), "expected status in message: {msg}");
        assert!(
            msg.contains("INVALID_REFRESH_TOKEN"),
            "expected code in message: {msg}"
        );
    }
}
