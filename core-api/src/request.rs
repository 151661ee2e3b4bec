//! Request descriptors

use bridge_traits::http::HttpMethod;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, Result};

/// One logical call against the backend.
///
/// Requests require authentication unless [`ApiRequest::public`] is used.
///
/// ```
/// use core_api::ApiRequest;
/// use serde_json::json;
///
/// let request = ApiRequest::put("/users/42/password")
///     .json(&json!({ "password": "n3w-Secret!" }))
///     .unwrap();
/// assert!(request.requires_auth);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Path relative to the API base URL, starting with `/`
    pub path: String,
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub requires_auth: bool,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            requires_auth: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Serializes `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest {
            message: format!("Failed to serialize request body: {}", e),
        })?;
        self.body = Some(value);
        Ok(self)
    }

    /// Marks the request as not needing a session token (e.g. login).
    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }
}

impl Default for ApiRequest {
    fn default() -> Self {
        Self::get("/")
    }
}
