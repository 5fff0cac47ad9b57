//! Common utilities for the CMDB API client
//!
//! Provides the authenticated HTTP wrapper, the response-envelope decoding and
//! the retry policy shared by every resource kind.

pub mod query;

use crate::error::CmdbError;
use crate::models::ApiResponse;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// CMDB error code for "duplicated item" on create
pub const DEFAULT_DUPLICATE_CODE: i64 = 1_199_014;

/// Fixed-delay retry policy for remote calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, returns a non-retryable error, or the
    /// attempt budget is spent. The last error is surfaced unchanged.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, CmdbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CmdbError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!("{} failed (attempt {}/{}): {}, retrying in {:?}", what, attempt, attempts, e, self.delay);
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Gateway credentials sent with every request
#[derive(Debug, Clone, Serialize)]
pub struct GatewayCredentials {
    pub bk_app_code: String,
    pub bk_app_secret: String,
    pub bk_username: String,
}

impl GatewayCredentials {
    /// Value of the `X-Bkapi-Authorization` header
    pub fn header_value(&self) -> Result<String, CmdbError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode a CMDB response body.
///
/// `result=false` or a non-zero `code` is a failure regardless of the HTTP
/// status; the configured duplicate code is reported as [`CmdbError::Duplicate`].
pub fn decode_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    duplicate_code: i64,
) -> Result<Option<T>, CmdbError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(CmdbError::TooManyRequests(truncate(body)));
    }

    let envelope: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => {
            return Err(CmdbError::InvalidRequest(format!(
                "error decoding response body: {} - Response (first 500 chars): {}",
                e,
                truncate(body)
            )));
        }
        Err(_) if status.is_server_error() => {
            return Err(CmdbError::Unavailable {
                status: status.as_u16(),
                message: truncate(body),
            });
        }
        Err(_) => {
            return Err(CmdbError::Api {
                code: i64::from(status.as_u16()),
                message: truncate(body),
                request_id: String::new(),
            });
        }
    };

    if envelope.code == duplicate_code {
        return Err(CmdbError::Duplicate {
            code: envelope.code,
            message: envelope.message,
        });
    }

    if !envelope.result || envelope.code != 0 {
        let code = if envelope.code == 0 { i64::from(status.as_u16()) } else { envelope.code };
        return Err(CmdbError::Api {
            code,
            message: envelope.message,
            request_id: envelope.request_id,
        });
    }

    Ok(envelope.data)
}

fn truncate(body: &str) -> String {
    body.chars().take(500).collect()
}

/// HTTP client wrapper with gateway authentication and retry
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    auth_header: String,
    retry: RetryPolicy,
    duplicate_code: i64,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(
        client: Client,
        base_url: String,
        credentials: &GatewayCredentials,
        retry: RetryPolicy,
        duplicate_code: i64,
    ) -> Result<Self, CmdbError> {
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header: credentials.header_value()?,
            retry,
            duplicate_code,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Send a JSON request and decode the CMDB envelope, retrying transport
    /// failures, bare 5xx pages and 429 answers per the retry policy.
    pub async fn call<B, T>(&self, method: Method, path: &str, body: &B) -> Result<Option<T>, CmdbError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.build_url(path);
        let what = format!("{} {}", method, path);
        let duplicate_code = self.duplicate_code;

        self.retry
            .run(&what, || {
                let request = self
                    .client
                    .request(method.clone(), &url)
                    .header("X-Bkapi-Authorization", &self.auth_header)
                    .header("Accept", "application/json")
                    .header("Content-Type", "application/json")
                    .json(body);
                let label = format!("{} {}", method, url);
                async move {
                    debug!("{}", label);
                    let response = request.send().await.map_err(CmdbError::Http)?;
                    let status = response.status();
                    let text = response.text().await.map_err(CmdbError::Http)?;
                    decode_envelope(status, &text, duplicate_code)
                }
            })
            .await
    }
}
