use std::{future::Future, time::Duration};

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use chroma_error::ErrorCodes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::ExecutorError;

fn default_factor() -> f32 {
    2.0
}

fn default_min_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_max_attempts() -> usize {
    5
}

fn default_jitter() -> f64 {
    0.1
}

/// Configuration for the retry policy.
/// # Fields
/// - `factor` - The factor to multiply the delay by after each attempt
/// - `min_delay_ms` - The delay before the second attempt
/// - `max_delay_ms` - The cap on any single delay
/// - `max_attempts` - The total number of attempts, including the first
/// - `jitter` - Each delay is scaled by a random factor in `1 ± jitter`
#[derive(Deserialize, Clone, Serialize, Debug, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_factor")]
    pub factor: f32,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            factor: default_factor(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            jitter: default_jitter(),
        }
    }
}

impl From<&RetryConfig> for ExponentialBuilder {
    fn from(config: &RetryConfig) -> Self {
        ExponentialBuilder::default()
            .with_factor(config.factor)
            .with_min_delay(Duration::from_millis(config.min_delay_ms))
            .with_max_delay(Duration::from_millis(config.max_delay_ms))
            .with_max_times(config.max_attempts.saturating_sub(1))
    }
}

impl RetryConfig {
    /// The delays slept between consecutive attempts, before jitter.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        ExponentialBuilder::from(self).build()
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let scale = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        delay.mul_f64(scale.max(0.0))
    }
}

/// Waits between attempts. Injected so tests can observe the schedule
/// without waiting it out.
#[async_trait]
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub(crate) fn is_retryable_status(status: &tonic::Status) -> bool {
    ErrorCodes::from(status.code()).is_retryable()
}

/// Runs `attempt` against `endpoints`, rotating to the next endpoint after
/// each retryable failure.
///
/// Attempt `i` targets `endpoints[i % len]`. Only unavailable and unknown
/// statuses are retried; any other status, or the last retryable one once
/// attempts run out, is returned as is.
pub async fn retry_across_endpoints<T, F, Fut>(
    endpoints: &[String],
    config: &RetryConfig,
    sleeper: &dyn Sleeper,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, ExecutorError>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<T, tonic::Status>>,
{
    if endpoints.is_empty() {
        return Err(ExecutorError::EmptyMemberlist);
    }
    let max_attempts = config.max_attempts.max(1);
    let mut delays = config.delays();
    let mut index = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }
        let endpoint = endpoints[index % endpoints.len()].as_str();
        let status = match attempt(endpoint).await {
            Ok(result) => return Ok(result),
            Err(status) => status,
        };
        index += 1;
        if !is_retryable_status(&status) || index >= max_attempts {
            return Err(ExecutorError::Grpc(status));
        }
        let delay = config.jittered(
            delays
                .next()
                .unwrap_or(Duration::from_millis(config.max_delay_ms)),
        );
        tracing::warn!(
            endpoint = %endpoint,
            attempt = index,
            delay_ms = delay.as_millis() as u64,
            "Retrying after {}",
            status.message()
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
            _ = sleeper.sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_error::ChromaError;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().push(duration);
        }
    }

    fn endpoints(n: usize) -> Vec<String> {
        (0..n).map(|i| i.to_string()).collect()
    }

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter: 0.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retries_rotate_through_endpoints() {
        let sleeper = RecordingSleeper::default();
        let visited = Arc::new(Mutex::new(Vec::new()));
        let result: Result<(), _> = retry_across_endpoints(
            &endpoints(3),
            &no_jitter(),
            &sleeper,
            &CancellationToken::new(),
            |endpoint| {
                visited.lock().push(endpoint.parse::<usize>().unwrap());
                async { Err(tonic::Status::unavailable("down")) }
            },
        )
        .await;

        assert_eq!(*visited.lock(), vec![0, 1, 2, 0, 1]);
        let err = result.unwrap_err();
        assert_eq!(err.code(), ErrorCodes::Unavailable);
        let slept_ms: Vec<_> = sleeper.slept.lock().iter().map(|d| d.as_millis()).collect();
        assert_eq!(slept_ms, vec![100, 200, 400, 800]);
    }

    #[tokio::test]
    async fn test_succeeds_on_last_attempt() {
        let sleeper = RecordingSleeper::default();
        let visited = Arc::new(Mutex::new(Vec::new()));
        let result = retry_across_endpoints(
            &endpoints(3),
            &no_jitter(),
            &sleeper,
            &CancellationToken::new(),
            |endpoint| {
                let mut visited = visited.lock();
                visited.push(endpoint.parse::<usize>().unwrap());
                let attempt = visited.len();
                async move {
                    if attempt < 5 {
                        Err(tonic::Status::unavailable("down"))
                    } else {
                        Ok(42u32)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*visited.lock(), vec![0, 1, 2, 0, 1]);
        let slept_ms: Vec<_> = sleeper.slept.lock().iter().map(|d| d.as_millis()).collect();
        assert_eq!(slept_ms, vec![100, 200, 400, 800]);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let result: Result<(), _> = retry_across_endpoints(
            &endpoints(3),
            &no_jitter(),
            &sleeper,
            &CancellationToken::new(),
            |_| {
                calls += 1;
                async { Err(tonic::Status::invalid_argument("bad plan")) }
            },
        )
        .await;
        assert_eq!(calls, 1);
        assert_eq!(result.unwrap_err().code(), ErrorCodes::InvalidArgument);
        assert!(sleeper.slept.lock().is_empty());
    }

    #[tokio::test]
    async fn test_succeeds_after_unknown() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let result = retry_across_endpoints(
            &endpoints(2),
            &no_jitter(),
            &sleeper,
            &CancellationToken::new(),
            |endpoint| {
                calls += 1;
                let endpoint = endpoint.to_string();
                let first = calls == 1;
                async move {
                    if first {
                        Err(tonic::Status::unknown("reset"))
                    } else {
                        Ok(endpoint)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), "1");
        assert_eq!(sleeper.slept.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), _> = retry_across_endpoints(
            &endpoints(1),
            &no_jitter(),
            &TokioSleeper,
            &cancel,
            |_| async { Ok(()) },
        )
        .await;
        assert!(matches!(result, Err(ExecutorError::Cancelled)));
    }

    #[test]
    fn test_delays_are_capped_and_jitter_bounded() {
        let config = RetryConfig {
            max_attempts: 10,
            ..Default::default()
        };
        let delays: Vec<_> = config.delays().collect();
        assert_eq!(delays.len(), 9);
        assert_eq!(delays[0], Duration::from_millis(100));
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(5000)));
        assert_eq!(delays[8], Duration::from_millis(5000));
        for _ in 0..100 {
            let jittered = config.jittered(Duration::from_millis(1000));
            assert!(jittered >= Duration::from_millis(899));
            assert!(jittered <= Duration::from_millis(1101));
        }
    }
}
