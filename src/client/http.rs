//! Shared HTTP client and response-to-error mapping.

use std::sync::OnceLock;

use reqwest::header::HeaderValue;

use crate::error::ApiError;

/// Machine-readable 401 body code marking a refreshable expiry. Other 401
/// causes (bad credentials, insufficient role) are not refreshable.
pub const TOKEN_EXPIRED_CODE: &str = "TOKEN_EXPIRED";

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub(crate) fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Bearer Authorization header value for `token`.
pub(crate) fn bearer_value(token: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {token}")).ok()
}

/// Parse the machine-readable error body `{ "code": …, "message": … }`.
/// Falls back to the raw body when it is not JSON in that shape.
pub(crate) fn parse_error_body(body: &str) -> (Option<String>, String) {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => {
            let code = value
                .get("code")
                .and_then(|c| c.as_str())
                .map(str::to_string);
            let message = value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            (code, message)
        }
        Err(_) => (None, body.to_string()),
    }
}

/// Map a non-success response to the error taxonomy.
///
/// The expiry discriminator comes from the response body, never from the
/// status code alone.
pub(crate) fn status_to_error(status: u16, body: &str) -> ApiError {
    let (code, message) = parse_error_body(body);
    match status {
        401 if code.as_deref() == Some(TOKEN_EXPIRED_CODE) => ApiError::TokenExpired,
        401 => ApiError::AuthRejected { status, message },
        500..=599 => ApiError::Server { status, message },
        _ => ApiError::Client {
            status,
            code,
            message,
        },
    }
}
