//! Asynchronous operation polling
//!
//! Provider mutations are accepted asynchronously and referenced by an
//! opaque handle. The poller drives the handle through
//! `submitted → polling → {succeeded, failed, timed_out}` by querying
//! its status at a capped exponential backoff interval. All waiting
//! goes through `tokio::time`, so tests run against a paused clock.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout as bounded};

/// Opaque reference to an in-flight provider operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    /// Provider-side request id
    pub id: String,

    /// Short human label ("create server web01") for logs and errors
    pub label: String,
}

impl OperationHandle {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.label)
    }
}

/// Status reported by the provider for an in-flight operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Queued,
    Running,
    Done,
    Failed(String),
}

/// Source of operation status, implemented by each provider client
#[async_trait]
pub trait OperationSource: Send + Sync {
    async fn operation_status(&self, handle: &OperationHandle) -> Result<OperationStatus>;
}

/// Terminal outcome of waiting for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded,
    Failed(String),
    TimedOut,
}

/// Polling interval configuration (capped exponential backoff)
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl PollConfig {
    /// Interval before poll number `attempt` (0-based), capped at
    /// `max_interval`
    pub fn interval_for_attempt(&self, attempt: u32) -> Duration {
        let millis = self.initial_interval.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = millis.min(self.max_interval.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Poll `handle` until it reaches a terminal state or `timeout` elapses.
///
/// Provider-reported failure stops polling immediately. Transient query
/// errors (network blips, provider 5xx) are retried within the same
/// deadline; any other query error is returned as-is. Each status query
/// is bounded by the remaining time and the deadline is checked before
/// every sleep, so an expired wait returns promptly even when a query
/// hangs.
pub async fn await_completion(
    source: &dyn OperationSource,
    handle: &OperationHandle,
    timeout: Duration,
    config: &PollConfig,
) -> Result<PollOutcome> {
    let deadline = Instant::now() + timeout;
    let mut attempt: u32 = 0;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(PollOutcome::TimedOut);
        }
        let status = match bounded(remaining, source.operation_status(handle)).await {
            Ok(status) => status,
            Err(_) => {
                tracing::debug!("operation {} status query still pending at deadline", handle);
                return Ok(PollOutcome::TimedOut);
            }
        };
        match status {
            Ok(OperationStatus::Done) => {
                tracing::debug!("operation {} completed after {} polls", handle, attempt + 1);
                return Ok(PollOutcome::Succeeded);
            }
            Ok(OperationStatus::Failed(message)) => {
                tracing::debug!("operation {} reported failure: {}", handle, message);
                return Ok(PollOutcome::Failed(message));
            }
            Ok(OperationStatus::Queued | OperationStatus::Running) => {}
            Err(e) if e.is_transient() => {
                tracing::warn!("transient error polling operation {}: {}", handle, e);
            }
            Err(e) => return Err(e),
        }

        let interval = config.interval_for_attempt(attempt);
        attempt += 1;

        if Instant::now() + interval >= deadline {
            tracing::debug!("operation {} still pending at deadline", handle);
            return Ok(PollOutcome::TimedOut);
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloudError;
    use std::sync::Mutex;

    struct ScriptedSource {
        responses: Mutex<Vec<Result<OperationStatus>>>,
    }

    impl ScriptedSource {
        fn new(mut responses: Vec<Result<OperationStatus>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl OperationSource for ScriptedSource {
        async fn operation_status(&self, _handle: &OperationHandle) -> Result<OperationStatus> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(OperationStatus::Running))
        }
    }

    fn handle() -> OperationHandle {
        OperationHandle::new("req-1", "create server web01")
    }

    #[test]
    fn test_interval_backoff_is_capped() {
        let config = PollConfig {
            initial_interval: Duration::from_millis(1000),
            max_interval: Duration::from_millis(10000),
            multiplier: 2.0,
        };

        assert_eq!(config.interval_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(config.interval_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(config.interval_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(config.interval_for_attempt(3), Duration::from_millis(8000));
        assert_eq!(config.interval_for_attempt(4), Duration::from_millis(10000)); // capped at max
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_pending_polls() {
        let source = ScriptedSource::new(vec![
            Ok(OperationStatus::Queued),
            Ok(OperationStatus::Running),
            Ok(OperationStatus::Done),
        ]);

        let outcome = await_completion(
            &source,
            &handle(),
            Duration::from_secs(600),
            &PollConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, PollOutcome::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_stops_polling() {
        let source = ScriptedSource::new(vec![Ok(OperationStatus::Failed("quota".into()))]);

        let outcome = await_completion(
            &source,
            &handle(),
            Duration::from_secs(600),
            &PollConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, PollOutcome::Failed("quota".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let source = ScriptedSource::new(vec![
            Err(CloudError::Provider {
                status: Some(503),
                message: "unavailable".into(),
            }),
            Err(CloudError::Provider {
                status: None,
                message: "connection reset".into(),
            }),
            Ok(OperationStatus::Done),
        ]);

        let outcome = await_completion(
            &source,
            &handle(),
            Duration::from_secs(600),
            &PollConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, PollOutcome::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_error_is_fatal() {
        let source = ScriptedSource::new(vec![Err(CloudError::Provider {
            status: Some(403),
            message: "forbidden".into(),
        })]);

        let err = await_completion(
            &source,
            &handle(),
            Duration::from_secs(600),
            &PollConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CloudError::Provider { status: Some(403), .. }));
    }

    struct HangingSource;

    #[async_trait]
    impl OperationSource for HangingSource {
        async fn operation_status(&self, _handle: &OperationHandle) -> Result<OperationStatus> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_status_query_times_out_at_deadline() {
        let outcome = await_completion(
            &HangingSource,
            &handle(),
            Duration::from_secs(30),
            &PollConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry_times_out() {
        // Never reaches a terminal state
        let source = ScriptedSource::new(vec![]);

        let outcome = await_completion(
            &source,
            &handle(),
            Duration::from_secs(30),
            &PollConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut);
    }
}
