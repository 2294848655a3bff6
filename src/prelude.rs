//! Convenience re-exports for common use.

pub use crate::auth::store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use crate::auth::token::{Session, TokenGrant, TokenSet, UserProfile};
pub use crate::client::request::RequestDescriptor;
pub use crate::client::response::ApiResponse;
pub use crate::client::ApiClient;
pub use crate::error::{ApiError, RefreshFailure, Result};
pub use crate::util::retry::RetryPolicy;
