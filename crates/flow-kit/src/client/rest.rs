//! Low-level client for the Flow Access REST API.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, de::DeserializeOwned};

use crate::error::RestError;
use crate::types::{
    AccountSnapshot, Address, Block, Identifier, TransactionRequest, TransactionResult,
};

/// Longest slice of an error body carried into an error message.
const BODY_EXCERPT_CHARS: usize = 512;

/// Retry configuration for transient HTTP failures.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries.
    pub max_retries: u32,
    /// Initial delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff with jitter: a delay in `[d/2, d]` where `d`
    /// doubles per attempt up to `max_delay_ms`.
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ceiling = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        let half = ceiling / 2;
        let jitter = rand::thread_rng().gen_range(0..=ceiling - half);
        Duration::from_millis(half + jitter)
    }
}

/// Error body returned by the Access API: `{code, message}`.
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// `GET /v1/blocks` returns a list of `{header: ...}` objects.
#[derive(Debug, Deserialize)]
struct BlockEnvelope {
    header: Block,
}

/// The node echoes the whole transaction; only the id matters.
#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Identifier,
}

/// Low-level client for the Access REST API.
///
/// Every request has its own timeout and is retried on transient failures
/// (connection errors, timeouts, 408, 429 and 5xx) with jittered exponential
/// backoff. Connections are pooled by the underlying `reqwest::Client`.
pub struct RestClient {
    base_url: String,
    client: reqwest::Client,
    retry_config: RetryConfig,
    request_timeout: Duration,
}

impl RestClient {
    /// Create a client with default retries and a 10 second request timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(base_url, RetryConfig::default(), Duration::from_secs(10))
    }

    /// Create a client with custom retry and timeout settings.
    pub fn with_config(
        base_url: impl Into<String>,
        retry_config: RetryConfig,
        request_timeout: Duration,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            retry_config,
            request_timeout,
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /v1/accounts/{address}` with keys and contracts expanded.
    pub async fn account(&self, address: &Address) -> Result<AccountSnapshot, RestError> {
        let path = format!("/v1/accounts/{}?expand=contracts,keys", address.to_hex());
        self.get(&path).await
    }

    /// The latest finalized block.
    pub async fn latest_block(&self) -> Result<Block, RestError> {
        let blocks: Vec<BlockEnvelope> = self.get("/v1/blocks?height=final").await?;
        blocks
            .into_iter()
            .next()
            .map(|b| b.header)
            .ok_or_else(|| RestError::InvalidResponse("empty block list".to_string()))
    }

    /// `POST /v1/transactions`. Returns the id the node assigned.
    pub async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<Identifier, RestError> {
        let response: SendResponse = self
            .with_retries("/v1/transactions", || {
                self.client
                    .post(self.url("/v1/transactions"))
                    .json(request)
            })
            .await?;
        Ok(response.id)
    }

    /// `GET /v1/transaction_results/{id}`.
    pub async fn transaction_result(
        &self,
        transaction_id: &Identifier,
    ) -> Result<TransactionResult, RestError> {
        self.get(&format!("/v1/transaction_results/{transaction_id}"))
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, RestError> {
        self.with_retries(path, || self.client.get(self.url(path)))
            .await
    }

    async fn with_retries<R: DeserializeOwned>(
        &self,
        path: &str,
        request: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<R, RestError> {
        let mut attempt = 0;
        loop {
            match self.try_request(path, request()).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.retry_config.max_retries => {
                    let delay = self.retry_config.backoff(attempt);
                    tracing::debug!(
                        path,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Single attempt.
    async fn try_request<R: DeserializeOwned>(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<R, RestError> {
        tracing::trace!(path, "REST request");

        let response = request
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        match status {
            200..=299 => Ok(serde_json::from_str(&body)?),
            404 => Err(RestError::NotFound(path.to_string())),
            400 => Err(RestError::Rejected {
                status_code: status,
                message: api_message(&body),
            }),
            _ => Err(RestError::network(
                format!("HTTP {status}: {}", excerpt(&body)),
                Some(status),
                is_retryable_status(status),
            )),
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> RestError {
        if e.is_timeout() {
            RestError::Timeout(self.request_timeout)
        } else {
            RestError::Http(e)
        }
    }
}

impl Clone for RestClient {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            client: self.client.clone(),
            retry_config: self.retry_config.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("retry_config", &self.retry_config)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Check if an HTTP status code is retryable.
fn is_retryable_status(status: u16) -> bool {
    // 408 Request Timeout, 429 Too Many Requests, 5xx Server Errors
    status == 408 || status == 429 || (500..600).contains(&status)
}

/// The `message` of an API error body, or an excerpt of the raw body.
fn api_message(body: &str) -> String {
    serde_json::from_str::<ApiError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| excerpt(body))
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
