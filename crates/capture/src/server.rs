//! Dev server availability - health checking the component server before navigating

use std::time::Duration;
use tracing::{debug, info, warn};

use figdiff_common::config::CaptureSettings;
use figdiff_common::{Error, Result, Stage};

use crate::deadline::Deadline;

/// Longest single wait between health check attempts
const MAX_BACKOFF: Duration = Duration::from_secs(4);

/// Polls the dev server root until it answers with a 2xx status
#[derive(Debug, Clone)]
pub struct DevServerProbe {
    client: reqwest::Client,
    attempts: usize,
    backoff: Duration,
    request_timeout: Duration,
}

impl DevServerProbe {
    pub fn new(settings: &CaptureSettings) -> Result<Self> {
        let request_timeout = Duration::from_millis(settings.health_check_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .no_proxy()
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            attempts: settings.health_check_attempts.max(1),
            backoff: Duration::from_millis(settings.health_check_backoff_ms),
            request_timeout,
        })
    }

    /// Wait for `base_url` to respond, retrying with exponential backoff.
    pub async fn wait_until_ready(&self, base_url: &str, deadline: &Deadline) -> Result<()> {
        let schedule = backoff_schedule(self.backoff, self.attempts);
        let mut reason = String::from("no attempt made");
        let mut made = 0;

        for attempt in 1..=self.attempts {
            made = attempt;
            let probe = async {
                self.client
                    .get(base_url)
                    .send()
                    .await
                    .map_err(|e| Error::Availability {
                        url: base_url.to_string(),
                        attempts: attempt,
                        reason: describe_request_error(&e),
                    })
            };

            match deadline.run(Stage::HealthCheck, self.request_timeout, probe).await {
                Ok(resp) if resp.status().is_success() => {
                    debug!("Dev server at {} healthy after {} attempt(s)", base_url, attempt);
                    return Ok(());
                }
                Ok(resp) => {
                    reason = format!("root responded with {}", resp.status());
                    warn!("Health check of {} returned {}", base_url, resp.status());
                }
                Err(Error::Availability { reason: r, .. }) => {
                    if attempt == 1 {
                        info!("Waiting for dev server at {}...", base_url);
                    }
                    reason = r;
                }
                Err(Error::Cancelled { stage }) => return Err(Error::Cancelled { stage }),
                Err(Error::Timeout { after, .. }) => {
                    reason = format!("no response within {}ms", after.as_millis());
                    if deadline.is_expired() {
                        break;
                    }
                }
                Err(e) => return Err(e),
            }

            if let Some(delay) = schedule.get(attempt - 1) {
                if deadline.remaining() <= *delay {
                    break;
                }
                deadline.sleep(Stage::HealthCheck, *delay).await?;
            }
        }

        Err(Error::Availability {
            url: base_url.to_string(),
            attempts: made,
            reason,
        })
    }
}

/// Delays slept after each failed attempt except the last
pub fn backoff_schedule(base: Duration, attempts: usize) -> Vec<Duration> {
    (0..attempts.saturating_sub(1))
        .map(|i| {
            let factor = 1u32 << i.min(16);
            base.saturating_mul(factor).min(MAX_BACKOFF)
        })
        .collect()
}

fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_connect() {
        "connection refused".to_string()
    } else if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    }
}
