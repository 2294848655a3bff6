//! Tether — resilient authenticated API client
//!
//! An HTTP client layer that attaches bearer tokens to outbound calls,
//! detects token expiry, coordinates a single-flight token refresh across
//! concurrent in-flight requests, replays failed requests transparently,
//! and applies a bounded retry/backoff policy to transient failures.
//!
//! # Quick Start
//!
//! ```no_run
//! use tether::prelude::*;
//!
//! # async fn example() -> tether::error::Result<()> {
//! let client = ApiClient::builder("https://api.example.com")
//!     .on_session_end(|| println!("session ended — back to login"))
//!     .build();
//!
//! client
//!     .login(&serde_json::json!({ "email": "a@example.com", "password": "pw" }))
//!     .await?;
//!
//! let response = client.get("/profile").await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod prelude;
pub mod util;
