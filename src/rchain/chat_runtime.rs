use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};

const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Timeout and retry policy applied to each chat-completions call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout_secs: Option<u64>,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            retries: 2,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug)]
pub(crate) enum RequestFailure {
    Request(reqwest::Error),
    Api { status: StatusCode, body: String },
}

pub(crate) async fn post_with_retry<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    payload: &T,
    policy: RetryPolicy,
) -> Result<reqwest::Response, RequestFailure> {
    let max_attempts = policy.retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        let mut request = client.post(url).bearer_auth(api_key).json(payload);
        if let Some(timeout_secs) = policy.timeout_secs {
            request = request.timeout(Duration::from_secs(timeout_secs));
        }

        debug!(url, attempt, "sending chat request");
        let failure = match request.send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if !is_retryable_status(status) || attempt + 1 >= max_attempts {
                    return Err(RequestFailure::Api { status, body });
                }
                format!("status {status}")
            }
            Err(source) => {
                if !is_retryable_request_error(&source) || attempt + 1 >= max_attempts {
                    return Err(RequestFailure::Request(source));
                }
                source.to_string()
            }
        };

        let delay = retry_delay(attempt, policy.retry_delay_ms);
        warn!(attempt, delay_ms = delay.as_millis() as u64, %failure, "retrying chat request");
        sleep(delay).await;
        attempt += 1;
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_request_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn retry_delay(attempt: u32, base_ms: u64) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_RETRY_DELAY_MS))
}
