use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::error::{PipelineError, PipelineResult};

/// Statuses from the generation collaborator that are worth another try.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 3] = [429, 502, 503];

/// Bounded retry shared by every synthesis path.
///
/// Attempt `n` (1-based) that fails retryably waits `n * base_delay` plus a
/// uniform jitter in `[0, max_jitter]` before attempt `n + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(3000),
            max_jitter: Duration::from_millis(2000),
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
        }
    }
}

/// A value together with the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Same attempt budget and predicate, no waiting.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn is_retryable(&self, err: &PipelineError) -> bool {
        match err {
            PipelineError::Upstream { status, .. } => self.retryable_statuses.contains(status),
            other => other.retryable(),
        }
    }

    pub fn delay_before_next(&self, failed_attempt: u32) -> Duration {
        let linear = self.base_delay.saturating_mul(failed_attempt);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return linear;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
        linear + Duration::from_millis(jitter)
    }

    /// Runs `op` until it succeeds, fails non-retryably, or the attempt
    /// budget is spent. The last error is returned unchanged.
    pub fn run<T>(
        &self,
        label: &str,
        mut op: impl FnMut(u32) -> PipelineResult<T>,
    ) -> PipelineResult<Attempted<T>> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    })
                }
                Err(err) => {
                    if attempt >= max_attempts || !self.is_retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_before_next(attempt);
                    tracing::warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::RetryPolicy;
    use crate::error::PipelineError;

    fn upstream(status: u16) -> PipelineError {
        PipelineError::Upstream {
            collaborator: "image",
            status,
            message: "busy".to_string(),
        }
    }

    #[test]
    fn rate_limited_every_time_stops_after_three_attempts() {
        let mut calls = 0;
        let result: Result<_, _> = RetryPolicy::immediate().run("test", |_| -> Result<(), _> {
            calls += 1;
            Err(upstream(429))
        });
        assert_eq!(calls, 3);
        assert!(matches!(result, Err(PipelineError::Upstream { status: 429, .. })));
    }

    #[test]
    fn quota_and_other_statuses_fail_fast() {
        for err in [
            PipelineError::Quota {
                collaborator: "image",
                message: String::new(),
            },
            upstream(400),
            upstream(500),
        ] {
            let mut pending = Some(err);
            let mut calls = 0;
            let result = RetryPolicy::immediate().run("test", |_| -> Result<(), _> {
                calls += 1;
                Err(pending.take().unwrap_or(PipelineError::NoImageProduced))
            });
            assert_eq!(calls, 1);
            assert!(result.is_err());
        }
    }

    #[test]
    fn recovers_on_a_later_attempt() {
        let result = RetryPolicy::immediate().run("test", |attempt| {
            if attempt < 3 {
                Err(upstream(503))
            } else {
                Ok("done")
            }
        });
        let attempted = result.unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(attempted.value, "done");
        assert_eq!(attempted.attempts, 3);
    }

    #[test]
    fn empty_success_bodies_are_retried() {
        let mut calls = 0;
        let _ = RetryPolicy::immediate().run("test", |_| -> Result<(), _> {
            calls += 1;
            Err(PipelineError::NoImageProduced)
        });
        assert_eq!(calls, 3);
    }

    #[test]
    fn backoff_grows_linearly_with_bounded_jitter() {
        let policy = RetryPolicy::default();
        for attempt in 1..=2u32 {
            let delay = policy.delay_before_next(attempt);
            let floor = Duration::from_millis(3000 * attempt as u64);
            assert!(delay >= floor);
            assert!(delay <= floor + Duration::from_millis(2000));
        }
    }
}
