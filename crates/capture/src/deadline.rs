//! Per-stage deadlines with cooperative cancellation

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use figdiff_common::{Error, Result, Stage};

/// Absolute deadline for one pipeline invocation.
///
/// Every I/O step runs through [`Deadline::run`], which bounds it by the
/// smaller of its own stage limit and the time left overall.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    token: CancellationToken,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            token: CancellationToken::new(),
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Run `fut` as `stage`, limited to `limit` or the remaining budget.
    pub async fn run<F, T>(&self, stage: Stage, limit: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let budget = limit.min(self.remaining());
        if budget.is_zero() {
            warn!("{} skipped: deadline already passed", stage);
            return Err(Error::Timeout {
                stage,
                after: Duration::ZERO,
            });
        }

        tokio::select! {
            _ = self.token.cancelled() => Err(Error::Cancelled { stage }),
            res = tokio::time::timeout(budget, fut) => match res {
                Ok(inner) => inner,
                Err(_) => {
                    warn!("{} timed out after {:?}", stage, budget);
                    Err(Error::Timeout { stage, after: budget })
                }
            },
        }
    }

    /// Sleep for `duration`, cut short by the deadline or cancellation
    pub async fn sleep(&self, stage: Stage, duration: Duration) -> Result<()> {
        let nap = duration.min(self.remaining());
        tokio::select! {
            _ = self.token.cancelled() => Err(Error::Cancelled { stage }),
            _ = tokio::time::sleep(nap) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_result_through() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let value = deadline
            .run(Stage::Navigation, Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_stage_limit_produces_typed_timeout() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let err = deadline
            .run(Stage::Serialization, Duration::from_millis(20), async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { stage: Stage::Serialization, .. }));
    }

    #[tokio::test]
    async fn test_overall_budget_caps_stage_limit() {
        let deadline = Deadline::after(Duration::from_millis(20));
        let err = deadline
            .run(Stage::Navigation, Duration::from_secs(30), async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        match err {
            Error::Timeout { stage, after } => {
                assert_eq!(stage, Stage::Navigation);
                assert!(after <= Duration::from_millis(20));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation() {
        let token = CancellationToken::new();
        let deadline = Deadline::after(Duration::from_secs(5)).with_token(token.clone());
        token.cancel();
        let err = deadline
            .run(Stage::Readiness, Duration::from_secs(1), async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { stage: Stage::Readiness }));
    }

    #[tokio::test]
    async fn test_expired_deadline_short_circuits() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.is_expired());
        let err = deadline
            .run(Stage::HealthCheck, Duration::from_secs(1), async { Ok(()) })
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
