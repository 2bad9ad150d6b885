use std::error::Error as _;
use std::io;
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_warn};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;

use crate::settings::{HarvestSettings, RetryPolicy};
use crate::{FailureKind, FetchError, FetchedPage, HarvestError};

/// One logical page retrieval, retries included.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, cancel: &CancellationToken)
        -> Result<FetchedPage, FetchError>;
}

/// Limits applied to every response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPolicy {
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl BodyPolicy {
    pub fn from_settings(settings: &HarvestSettings) -> Self {
        Self {
            max_bytes: settings.max_body_bytes,
            allowed_content_types: settings.allowed_content_types.clone(),
        }
    }

    /// Compares the media type only; parameters such as `charset` are ignored.
    pub fn allows_content_type(&self, content_type: &str) -> bool {
        let media_type = content_type.split(';').next().unwrap_or(content_type).trim();
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(media_type))
    }

    fn too_large(&self, actual: Option<u64>) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.max_bytes,
                actual,
            },
            "response body exceeds limit",
        )
    }
}

/// HTTP fetcher sharing one pooled client across a whole batch.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
    body: BodyPolicy,
}

impl ReqwestFetcher {
    /// Builds the batch-wide client. Failure here is fatal for the batch.
    pub fn for_batch(settings: &HarvestSettings) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .timeout(settings.request_timeout)
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|err| HarvestError::ClientSetup(err.to_string()))?;
        Ok(Self::with_client(
            client,
            settings.retry_policy(),
            BodyPolicy::from_settings(settings),
        ))
    }

    pub fn with_client(client: reqwest::Client, policy: RetryPolicy, body: BodyPolicy) -> Self {
        Self {
            client,
            policy,
            body,
        }
    }

    async fn attempt(&self, url: &reqwest::Url) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.body.max_bytes {
                return Err(self.body.too_large(Some(declared)));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        if let Some(ct) = content_type.as_deref() {
            if !self.body.allows_content_type(ct) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "response is not an html page",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.body.max_bytes {
                return Err(self.body.too_large(None));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            bytes,
        })
    }
}

#[async_trait::async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedPage, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                engine_debug!("Fetch of {} cancelled before attempt {}", url, attempt + 1);
                return Err(FetchError::cancelled(attempt));
            }
            attempt += 1;

            let err = match self.attempt(&parsed).await {
                Ok(mut page) => {
                    page.url = url.to_string();
                    return Ok(page);
                }
                Err(err) => err,
            };

            if !err.kind.is_retryable() {
                engine_error!("Fetch of {} failed without retry: {}", url, err.kind);
                return Err(err.with_attempts(attempt));
            }
            engine_warn!(
                "Fetch attempt {}/{} for {} failed ({}): {}",
                attempt,
                max_attempts,
                url,
                err.kind,
                err.message
            );

            if attempt >= max_attempts {
                engine_error!("Max retries reached for {} after {} attempts", url, attempt);
                return Err(err.with_attempts(attempt));
            }
            backoff(self.policy.delay_after(attempt), cancel).await;
        }
    }
}

/// Sleeps for `delay`, waking early if the batch is stopped.
pub(crate) async fn backoff(delay: Duration, cancel: &CancellationToken) {
    if delay.is_zero() {
        return;
    }
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() || is_io_timeout(&err) {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_connect() {
        return FetchError::new(FailureKind::Connection, err.to_string());
    }
    if let Some(status) = err.status() {
        return FetchError::new(FailureKind::HttpStatus(status.as_u16()), err.to_string());
    }
    FetchError::new(FailureKind::Other, err.to_string())
}

/// Read timeouts may surface as a nested `io::ErrorKind::TimedOut`.
fn is_io_timeout(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::TimedOut {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
