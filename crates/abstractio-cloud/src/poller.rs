//! Bounded readiness polling
//!
//! Repeatedly fetches the status of an asynchronously provisioned resource
//! (a Cloud Run service, a static address, a VM) until it is ready, reports a
//! terminal failure, or the attempt budget runs out. The poller never acts on
//! the result; callers interpret the returned [`PollOutcome`].

use crate::error::{CloudError, Result};
use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default fixed interval between attempts
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Classification of a single fetched status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Pending,
    TerminalFailure(String),
}

/// Decides what a fetched provider status means
pub trait StatusClassifier<S> {
    fn classify(&self, status: &S) -> Readiness;
}

/// Classifier built from a readiness and a terminal-failure predicate
///
/// The terminal-failure predicate is evaluated first.
pub struct Predicates<R, F> {
    is_ready: R,
    is_terminal_failure: F,
}

impl<R, F> Predicates<R, F> {
    pub fn new(is_ready: R, is_terminal_failure: F) -> Self {
        Self {
            is_ready,
            is_terminal_failure,
        }
    }
}

impl<S, R, F> StatusClassifier<S> for Predicates<R, F>
where
    R: Fn(&S) -> bool,
    F: Fn(&S) -> bool,
{
    fn classify(&self, status: &S) -> Readiness {
        if (self.is_terminal_failure)(status) {
            Readiness::TerminalFailure("provider reported a terminal status".to_string())
        } else if (self.is_ready)(status) {
            Readiness::Ready
        } else {
            Readiness::Pending
        }
    }
}

/// Delay strategy between attempts
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(DEFAULT_INTERVAL)
    }
}

impl Backoff {
    /// Delay to wait after the given zero-based attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(interval) => *interval,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let factor = multiplier.powi(attempt.min(i32::MAX as u32) as i32);
                let secs = initial.as_secs_f64() * factor;
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }
}

/// What to do when the status fetch itself fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchErrorPolicy {
    /// Count the attempt as pending and keep polling
    #[default]
    Retry,
    /// Stop at the first fetch error
    FailFast,
}

/// Poller settings
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub on_fetch_error: FetchErrorPolicy,
}

impl PollConfig {
    /// Fixed-interval polling, the default strategy
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(interval),
            on_fetch_error: FetchErrorPolicy::default(),
        }
    }

    /// Fixed-interval polling with the interval given in (fractional) seconds
    pub fn from_secs(max_attempts: u32, interval_seconds: f64) -> Result<Self> {
        let interval = Duration::try_from_secs_f64(interval_seconds).map_err(|_| {
            CloudError::InvalidConfig(format!(
                "poll interval must be a finite, non-negative number of seconds, got {interval_seconds}"
            ))
        })?;
        Ok(Self::fixed(max_attempts, interval))
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_fetch_error_policy(mut self, policy: FetchErrorPolicy) -> Self {
        self.on_fetch_error = policy;
        self
    }
}

/// Result of a complete poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<S, E> {
    Ready(S),
    TerminalFailure {
        reason: String,
        last_status: Option<S>,
        attempts: u32,
    },
    TransientError {
        error: E,
        last_status: Option<S>,
        attempts: u32,
    },
    Cancelled {
        last_status: Option<S>,
        attempts: u32,
    },
}

/// Reason carried by [`PollOutcome::TerminalFailure`] when the budget runs out
pub const RETRIES_EXHAUSTED: &str = "retries exhausted";

impl<S, E> PollOutcome<S, E> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready(_))
    }

    pub fn last_status(&self) -> Option<&S> {
        match self {
            PollOutcome::Ready(status) => Some(status),
            PollOutcome::TerminalFailure { last_status, .. }
            | PollOutcome::TransientError { last_status, .. }
            | PollOutcome::Cancelled { last_status, .. } => last_status.as_ref(),
        }
    }
}

impl<S: Debug, E: Display> PollOutcome<S, E> {
    /// Turn a non-ready outcome into an error naming the resource
    pub fn into_result(self, resource: &str) -> Result<S> {
        match self {
            PollOutcome::Ready(status) => Ok(status),
            PollOutcome::TerminalFailure {
                reason,
                last_status,
                ..
            } => Err(CloudError::TerminalFailure {
                resource: resource.to_string(),
                reason,
                last_status: describe(last_status.as_ref()),
            }),
            PollOutcome::TransientError {
                error, attempts, ..
            } => Err(CloudError::Transient {
                resource: resource.to_string(),
                error: error.to_string(),
                attempts,
            }),
            PollOutcome::Cancelled { attempts, .. } => Err(CloudError::Cancelled {
                resource: resource.to_string(),
                attempts,
            }),
        }
    }
}

pub(crate) fn describe<S: Debug>(status: Option<&S>) -> String {
    status
        .map(|s| format!("{s:?}"))
        .unwrap_or_else(|| "none observed".to_string())
}

/// Bounded, cancellable poller
///
/// Holds no state between calls; one `poll` per watched resource.
#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    config: PollConfig,
}

impl ReadinessPoller {
    pub fn new(config: PollConfig) -> Result<Self> {
        if config.max_attempts == 0 {
            return Err(CloudError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if let Backoff::Exponential { multiplier, .. } = config.backoff {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(CloudError::InvalidConfig(format!(
                    "backoff multiplier must be >= 1.0, got {multiplier}"
                )));
            }
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll with a readiness and a terminal-failure predicate
    pub async fn poll_until<S, E, F, Fut, R, T>(
        &self,
        fetch: F,
        is_ready: R,
        is_terminal_failure: T,
        cancel: &CancellationToken,
    ) -> PollOutcome<S, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<S, E>>,
        E: Display,
        R: Fn(&S) -> bool,
        T: Fn(&S) -> bool,
    {
        let classifier = Predicates::new(is_ready, is_terminal_failure);
        self.poll(fetch, &classifier, cancel).await
    }

    /// Poll `fetch` until `classifier` reports ready or terminal failure
    pub async fn poll<S, E, F, Fut, C>(
        &self,
        mut fetch: F,
        classifier: &C,
        cancel: &CancellationToken,
    ) -> PollOutcome<S, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<S, E>>,
        E: Display,
        C: StatusClassifier<S> + ?Sized,
    {
        let max_attempts = self.config.max_attempts;
        let mut last_status: Option<S> = None;
        let mut last_error: Option<E> = None;
        let mut attempts = 0;

        while attempts < max_attempts {
            if cancel.is_cancelled() {
                tracing::info!(attempts, "Polling cancelled");
                return PollOutcome::Cancelled {
                    last_status,
                    attempts,
                };
            }

            attempts += 1;
            tracing::debug!(attempt = attempts, max_attempts, "Fetching status");

            match fetch().await {
                Ok(status) => {
                    last_error = None;
                    match classifier.classify(&status) {
                        Readiness::Ready => {
                            tracing::info!(attempt = attempts, "Resource is ready");
                            return PollOutcome::Ready(status);
                        }
                        Readiness::TerminalFailure(reason) => {
                            tracing::warn!(attempt = attempts, %reason, "Resource failed");
                            return PollOutcome::TerminalFailure {
                                reason,
                                last_status: Some(status),
                                attempts,
                            };
                        }
                        Readiness::Pending => last_status = Some(status),
                    }
                }
                Err(error) => {
                    tracing::warn!(attempt = attempts, %error, "Status fetch failed");
                    if self.config.on_fetch_error == FetchErrorPolicy::FailFast {
                        return PollOutcome::TransientError {
                            error,
                            last_status,
                            attempts,
                        };
                    }
                    last_error = Some(error);
                }
            }

            if attempts < max_attempts {
                let delay = self.config.backoff.delay_for_attempt(attempts - 1);
                tracing::debug!(delay_ms = delay.as_millis() as u64, "Waiting before next attempt");
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!(attempts, "Polling cancelled while waiting");
                        return PollOutcome::Cancelled { last_status, attempts };
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        match last_error {
            Some(error) => {
                tracing::warn!(attempts, %error, "Retries exhausted on fetch errors");
                PollOutcome::TransientError {
                    error,
                    last_status,
                    attempts,
                }
            }
            None => {
                tracing::warn!(attempts, "Retries exhausted before resource became ready");
                PollOutcome::TerminalFailure {
                    reason: RETRIES_EXHAUSTED.to_string(),
                    last_status,
                    attempts,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn poller(max_attempts: u32, interval: Duration) -> ReadinessPoller {
        ReadinessPoller::new(PollConfig::fixed(max_attempts, interval)).unwrap()
    }

    /// Fetch returning the call number (1-based) and counting calls
    fn counting_fetch(
        calls: &Arc<AtomicU32>,
    ) -> impl FnMut() -> std::future::Ready<std::result::Result<u32, String>> + '_ {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Ok(n))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let outcome = poller(10, Duration::from_secs(5))
            .poll_until(counting_fetch(&calls), |_| true, |_| false, &cancel)
            .await;

        assert_eq!(outcome, PollOutcome::Ready(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_calls_fetch_max_attempts_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let outcome = poller(4, Duration::from_secs(5))
            .poll_until(counting_fetch(&calls), |_| false, |_| false, &cancel)
            .await;

        assert_eq!(
            outcome,
            PollOutcome::TerminalFailure {
                reason: RETRIES_EXHAUSTED.to_string(),
                last_status: Some(4),
                attempts: 4,
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // no wait after the final attempt
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_stops_early() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let outcome = poller(10, Duration::from_secs(1))
            .poll_until(counting_fetch(&calls), |_| false, |n| *n == 3, &cancel)
            .await;

        assert!(matches!(
            outcome,
            PollOutcome::TerminalFailure { attempts: 3, last_status: Some(3), .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_checked_before_ready() {
        let cancel = CancellationToken::new();

        let outcome = poller(3, Duration::ZERO)
            .poll_until(
                || std::future::ready(Ok::<_, String>("both")),
                |_| true,
                |_| true,
                &cancel,
            )
            .await;

        assert!(matches!(outcome, PollOutcome::TerminalFailure { attempts: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_errors_surface_as_transient_after_exhaustion() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err::<u32, _>("connection reset".to_string()))
        };

        let outcome = poller(3, Duration::from_secs(1))
            .poll_until(fetch, |_| true, |_| false, &cancel)
            .await;

        assert_eq!(
            outcome,
            PollOutcome::TransientError {
                error: "connection reset".to_string(),
                last_status: None,
                attempts: 3,
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovered_fetch_error_ends_as_exhaustion() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let fetch = || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            let result = if n == 1 { Err("timeout".to_string()) } else { Ok(n) };
            std::future::ready(result)
        };

        let outcome = poller(3, Duration::from_secs(1))
            .poll_until(fetch, |_| false, |_| false, &cancel)
            .await;

        assert!(matches!(
            outcome,
            PollOutcome::TerminalFailure { ref reason, attempts: 3, .. } if reason == RETRIES_EXHAUSTED
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_on_fetch_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err::<u32, _>("403 forbidden".to_string()))
        };
        let config = PollConfig::fixed(5, Duration::from_secs(1))
            .with_fetch_error_policy(FetchErrorPolicy::FailFast);

        let outcome = ReadinessPoller::new(config)
            .unwrap()
            .poll_until(fetch, |_| true, |_| false, &cancel)
            .await;

        assert!(matches!(outcome, PollOutcome::TransientError { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait_returns_promptly() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        let outcome = poller(100, Duration::from_secs(10))
            .poll_until(counting_fetch(&calls), |_| false, |_| false, &cancel)
            .await;

        assert_eq!(
            outcome,
            PollOutcome::Cancelled {
                last_status: Some(2),
                attempts: 2,
            }
        );
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = poller(3, Duration::from_secs(1))
            .poll_until(counting_fetch(&calls), |_| true, |_| false, &cancel)
            .await;

        assert_eq!(
            outcome,
            PollOutcome::Cancelled {
                last_status: None,
                attempts: 0,
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(ReadinessPoller::new(PollConfig::fixed(0, Duration::from_secs(1))).is_err());
        assert!(PollConfig::from_secs(3, -1.0).is_err());
        assert!(PollConfig::from_secs(3, f64::NAN).is_err());
        assert_eq!(
            PollConfig::from_secs(3, 0.5).unwrap().backoff,
            Backoff::Fixed(Duration::from_millis(500))
        );

        let shrinking = PollConfig::fixed(3, Duration::from_secs(1)).with_backoff(Backoff::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
            multiplier: 0.5,
        });
        assert!(ReadinessPoller::new(shrinking).is_err());
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(1000),
            max: Duration::from_millis(10000),
            multiplier: 2.0,
        };

        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(8000));
        assert_eq!(backoff.delay_for_attempt(4), Duration::from_millis(10000));
        assert_eq!(backoff.delay_for_attempt(400), Duration::from_millis(10000));
        assert_eq!(backoff.delay_for_attempt(u32::MAX), Duration::from_millis(10000));
        assert_eq!(
            backoff.delay_for_attempt(i32::MAX as u32 + 1),
            Duration::from_millis(10000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_backoff_between_attempts() {
        let config = PollConfig::fixed(5, Duration::ZERO).with_backoff(Backoff::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(5),
            multiplier: 2.0,
        });
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let outcome = ReadinessPoller::new(config)
            .unwrap()
            .poll_until(counting_fetch(&calls), |_| false, |_| false, &CancellationToken::new())
            .await;

        // 1s + 2s + 4s + 5s (capped), nothing after the last attempt
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(12), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(13), "elapsed {elapsed:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(matches!(outcome, PollOutcome::TerminalFailure { attempts: 5, .. }));
    }

    #[test]
    fn test_into_result_carries_context() {
        let outcome: PollOutcome<&str, String> = PollOutcome::TerminalFailure {
            reason: RETRIES_EXHAUSTED.to_string(),
            last_status: Some("Unknown"),
            attempts: 3,
        };

        let err = outcome.into_result("svc-1").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("svc-1"));
        assert!(message.contains(RETRIES_EXHAUSTED));
        assert!(message.contains("Unknown"));
    }
}
