use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use thiserror::Error;
use tokio::time::{sleep, timeout};

use crate::{
    api::{FetchError, Upstream},
    schema::{ModerationEvent, ResponseEnvelope},
};

/// How long a request keeps polling the moderation log before giving up.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(rename = "delay_secs")]
    pub delay: Duration,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(rename = "timeout_secs")]
    pub timeout: Duration,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No rated level was found after {attempts} attempt(s): {source}")]
    ScanExhausted {
        attempts: u32,
        #[source]
        source: FetchError,
    },
    #[error("Gave up looking for a rated level after {0:?}")]
    ScanTimeout(Duration),
    #[error("Failed to fetch level details: {0}")]
    Details(#[source] FetchError),
}

/// Scans until a rated level is found, at most `max_attempts` times and within `timeout`.
pub async fn scan_with_retry<U: Upstream>(
    upstream: &U,
    policy: &RetryPolicy,
) -> Result<ModerationEvent, PipelineError> {
    let max_attempts = policy.max_attempts.max(1);
    let attempts = async {
        let mut attempt = 1;
        loop {
            match upstream.scan().await {
                Ok(event) => return Ok(event),
                Err(source) if attempt >= max_attempts => {
                    return Err(PipelineError::ScanExhausted {
                        attempts: attempt,
                        source,
                    })
                }
                Err(e) => {
                    warn!("Scan attempt {attempt}/{max_attempts} failed: {e}");
                    sleep(policy.delay).await;
                    attempt += 1;
                }
            }
        }
    };
    timeout(policy.timeout, attempts)
        .await
        .map_err(|_| PipelineError::ScanTimeout(policy.timeout))?
}

pub async fn newest_rate<U: Upstream>(
    upstream: &U,
    policy: &RetryPolicy,
) -> Result<ResponseEnvelope, PipelineError> {
    let event = scan_with_retry(upstream, policy).await?;
    debug!("Fetching details of level {}", event.level_id);
    let details = upstream
        .level_details(&event.level_id)
        .await
        .map_err(PipelineError::Details)?;
    Ok(ResponseEnvelope::new(event, details))
}
