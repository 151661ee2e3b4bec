//! Authenticated API client
//!
//! [`ApiClient::execute`] performs one logical request: it composes the JSON
//! and bearer headers, bounds every attempt with a timeout, retries transient
//! failures with a growing delay and classifies the outcome into [`ApiError`].

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bytes::Bytes;
use core_runtime::config::{AdminConfig, DEFAULT_REQUEST_TIMEOUT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{server_message, ApiError, Result, UNEXPECTED_RESPONSE_MESSAGE};
use crate::request::ApiRequest;

/// Client for the store's REST API.
///
/// Holds no per-call state, so one instance can serve any number of
/// concurrent requests; each call owns its timer and attempt counter.
///
/// # Example
///
/// ```ignore
/// use core_api::{ApiClient, ApiRequest};
///
/// let client = ApiClient::new(http_client, "https://admin.example.com/api");
/// let users: Vec<User> = client.execute(&ApiRequest::get("/users"), Some(&token)).await?;
/// ```
#[derive(Clone)]
pub struct ApiClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    timeout: Duration,
    retry_policy: RetryPolicy,
}

impl ApiClient {
    /// Creates a client with the default timeout (15 s) and retry policy
    /// (2 attempts, linear 1 s delay).
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            http,
            base_url,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(config.http_client.clone(), config.api_base_url.clone())
            .with_timeout(config.request_timeout)
            .with_retry_policy(config.retry_policy.clone())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Executes `request` and decodes the success body into `T`.
    ///
    /// An empty success body decodes as JSON `null`, so `()` and `Option<_>`
    /// work for endpoints that return nothing.
    ///
    /// # Errors
    ///
    /// - [`ApiError::SessionExpired`] without any network call when the request
    ///   requires authentication and `token` is missing or blank, or when the
    ///   backend answers 401/403 to an authenticated request. Never retried.
    /// - [`ApiError::AuthenticationFailed`] for 401/403 on a public request.
    /// - [`ApiError::Timeout`], [`ApiError::NetworkFailure`] or
    ///   [`ApiError::ServerError`] once every attempt has failed.
    /// - [`ApiError::InvalidRequest`] if the request cannot be composed.
    #[instrument(skip(self, request, token), fields(method = %request.method, path = %request.path))]
    pub async fn execute<T>(&self, request: &ApiRequest, token: Option<&str>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let token = token.map(str::trim).filter(|token| !token.is_empty());

        if request.requires_auth && token.is_none() {
            debug!("No session token for authenticated request");
            return Err(ApiError::session_expired(None));
        }

        let http_request = self.build_request(request, token)?;
        let response = self.dispatch(http_request, request.requires_auth).await?;

        // The server has already acted on the request; a bad body is never re-sent.
        decode_success(&response.body).map_err(|e| {
            warn!(status = response.status, error = %e, "Undecodable success body");
            ApiError::ServerError {
                status: response.status,
                message: UNEXPECTED_RESPONSE_MESSAGE.to_string(),
                detail: Value::Object(Default::default()),
            }
        })
    }

    /// Sends `http_request` until it gets a non-error status or the attempts run out.
    async fn dispatch(&self, http_request: HttpRequest, requires_auth: bool) -> Result<HttpResponse> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!(attempt, max_attempts, "Sending API request");

            let error = match self.attempt(http_request.clone(), requires_auth).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            if !error.is_retryable() {
                debug!(error = %error, "API request failed without retry");
                return Err(error);
            }

            if attempt < max_attempts {
                let delay = self.retry_policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "API request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            } else {
                warn!(attempt, max_attempts, error = %error, "API request failed after all attempts");
            }

            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| ApiError::InvalidRequest {
            message: "No request attempt was made".to_string(),
        }))
    }

    fn build_request(&self, request: &ApiRequest, token: Option<&str>) -> Result<HttpRequest> {
        if !request.path.starts_with('/') {
            return Err(ApiError::InvalidRequest {
                message: format!("Request path must start with '/': {}", request.path),
            });
        }

        let mut http_request =
            HttpRequest::new(request.method, format!("{}{}", self.base_url, request.path))
                .header("Content-Type", "application/json")
                .header("Accept", "application/json")
                .timeout(self.timeout);

        if let Some(token) = token {
            http_request = http_request.bearer_token(token);
        }

        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body).map_err(|e| ApiError::InvalidRequest {
                message: format!("Failed to serialize request body: {}", e),
            })?;
            http_request = http_request.body(Bytes::from(bytes));
        }

        Ok(http_request)
    }

    /// One attempt. A late response is dropped together with the timed-out future.
    async fn attempt(&self, request: HttpRequest, requires_auth: bool) -> Result<HttpResponse> {
        let response = match tokio::time::timeout(self.timeout, self.http.execute(request)).await
        {
            Ok(result) => result?,
            Err(_) => return Err(ApiError::Timeout),
        };

        classify_response(response, requires_auth)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

fn classify_response(response: HttpResponse, requires_auth: bool) -> Result<HttpResponse> {
    let status = response.status;

    if response.is_auth_rejection() {
        let message = server_message(&error_body(&response.body));
        return Err(if requires_auth {
            ApiError::session_expired(message)
        } else {
            ApiError::authentication_failed(message)
        });
    }

    if !response.is_success() {
        return Err(ApiError::server_error(status, error_body(&response.body)));
    }

    Ok(response)
}

/// Error bodies that are not JSON objects become `{}`.
fn error_body(body: &[u8]) -> Value {
    serde_json::from_slice::<Value>(body)
        .ok()
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::Object(Default::default()))
}

/// Empty bodies decode as JSON `null`.
fn decode_success<T: DeserializeOwned>(body: &[u8]) -> serde_json::Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_slice(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_body_tolerates_garbage() {
        assert_eq!(error_body(b"<html>502</html>"), json!({}));
        assert_eq!(error_body(b"[1,2]"), json!({}));
        assert_eq!(error_body(b""), json!({}));
        assert_eq!(error_body(br#"{"message":"x"}"#), json!({"message": "x"}));
    }

    #[test]
    fn test_empty_success_body_is_null() {
        let _: () = decode_success(b"").unwrap();

        let missing: Option<Value> = decode_success(b"  ").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_invalid_success_body_fails_to_decode() {
        assert!(decode_success::<Vec<String>>(b"not json").is_err());
        assert!(decode_success::<Vec<String>>(br#"{"id":1}"#).is_err());
    }

    #[test]
    fn test_classify_passes_success_through() {
        let response = classify_response(HttpResponse::new(201, "garbage"), true).unwrap();
        assert_eq!(response.status, 201);

        let failed = classify_response(HttpResponse::new(500, "garbage"), true).unwrap_err();
        assert_eq!(failed, ApiError::server_error(500, json!({})));
    }

    #[test]
    fn test_classify_auth_rejection() {
        let expired = classify_response(HttpResponse::new(401, r#"{"message":"expired"}"#), true);
        assert_eq!(
            expired.unwrap_err(),
            ApiError::SessionExpired {
                message: "expired".to_string()
            }
        );

        let rejected = classify_response(HttpResponse::new(403, "nope"), false);
        assert_eq!(
            rejected.unwrap_err(),
            ApiError::AuthenticationFailed {
                message: "Authentication failed".to_string()
            }
        );
    }
}
