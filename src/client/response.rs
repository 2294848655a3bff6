//! Response surface handed back to callers.

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Successful response from an API call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    body: String,
}

impl ApiResponse {
    pub(crate) fn new(status: u16, headers: HeaderMap, body: String) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Raw body text.
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}
