use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default safety margin subtracted from a token's declared lifetime, in
/// seconds. Expiry is detected locally before the server would reject the
/// token, so a proactive refresh beats clock drift.
pub const DEFAULT_EXPIRY_SKEW_SECS: i64 = 300;

/// Bearer token pair with a locally computed expiry.
///
/// # Example
/// ```
/// use tether::auth::TokenSet;
/// use chrono::Duration;
///
/// let tokens = TokenSet::with_lifetime(
///     "access".to_string(),
///     "refresh".to_string(),
///     3600,
///     Duration::seconds(300),
/// );
/// assert!(!tokens.is_expired());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    /// Issue time plus declared lifetime, minus the safety skew.
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    /// Build a token set from a server-declared lifetime, folding `skew`
    /// into the stored expiry.
    pub fn with_lifetime(
        access_token: String,
        refresh_token: String,
        lifetime_secs: i64,
        skew: Duration,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(lifetime_secs) - skew,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// True iff `now` has reached the stored expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Opaque user payload cached alongside the tokens. Present iff
/// authenticated; the client never looks inside it.
pub type UserProfile = serde_json::Value;

/// The unit of persisted authentication state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub tokens: TokenSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

/// Wire form of a token grant issued by the auth backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    /// Only present when the server rotates the refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Declared lifetime in seconds.
    pub expires_in: i64,
}

impl TokenGrant {
    /// Convert into a stored token set, retaining `previous_refresh` when
    /// the server did not rotate the refresh token.
    ///
    /// Returns `None` when neither the grant nor `previous_refresh` carries
    /// a refresh token.
    pub fn into_token_set(self, previous_refresh: Option<String>, skew: Duration) -> Option<TokenSet> {
        let refresh_token = self.refresh_token.or(previous_refresh)?;
        Some(TokenSet::with_lifetime(
            self.access_token,
            refresh_token,
            self.expires_in,
            skew,
        ))
    }
}
