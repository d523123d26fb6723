//! Bounded retry with exponential backoff, independent of the operation being retried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 behave as 1.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 10_000,
            backoff: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff: f64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: initial_delay.as_millis() as u64,
            backoff,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Sleep between attempt `attempt` (1-based) and the next one:
    /// `initial × backoff^(attempt-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff.powi(exponent);
        if !factor.is_finite() || factor <= 0.0 {
            return self.initial_delay();
        }
        Duration::try_from_secs_f64(self.initial_delay().as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Classification of one failed attempt.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// Worth another attempt if any remain.
    Retry(E),
    /// Stop immediately.
    Abort(E),
}

#[derive(Debug)]
pub enum RetryOutcome<E> {
    Aborted { error: E, attempts: u32 },
    Exhausted { error: E, attempts: u32 },
}

impl<E> RetryOutcome<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Aborted { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn into_error(self) -> E {
        match self {
            RetryOutcome::Aborted { error, .. } | RetryOutcome::Exhausted { error, .. } => error,
        }
    }
}

pub struct Retrier<'a, S: Sleeper + ?Sized> {
    policy: RetryPolicy,
    sleeper: &'a S,
}

impl<'a, S: Sleeper + ?Sized> Retrier<'a, S> {
    pub fn new(policy: RetryPolicy, sleeper: &'a S) -> Self {
        Self { policy, sleeper }
    }

    /// Runs `op` until it succeeds, aborts, or the attempts run out.
    ///
    /// `op` receives the 1-based attempt number. `notify` is called with the
    /// attempt number, its error and the upcoming delay before every sleep.
    pub async fn run<T, E, F, Fut, N>(&self, mut op: F, mut notify: N) -> Result<T, RetryOutcome<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AttemptError<E>>>,
        N: FnMut(u32, &E, Duration),
    {
        let max_attempts = self.policy.attempts();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(AttemptError::Abort(error)) => {
                    return Err(RetryOutcome::Aborted {
                        error,
                        attempts: attempt,
                    })
                }
                Err(AttemptError::Retry(error)) => {
                    if attempt >= max_attempts {
                        return Err(RetryOutcome::Exhausted {
                            error,
                            attempts: attempt,
                        });
                    }
                    let delay = self.policy.delay_after(attempt);
                    notify(attempt, &error, delay);
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
