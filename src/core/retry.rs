//! Purpose: Bounded retry with jittered exponential backoff for 429 responses.
//! Exports: `RetryPolicy`, `run_with_retry`.
//! Role: The single retry contract shared by every outbound HTTP call.
//! Invariants: Retry applies only to `RateLimited`; other errors fail fast.
//! Invariants: Delays never decrease across attempts and never exceed the cap.

use crate::core::error::{Error, ErrorKind};
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Doubling schedule without jitter: base, 2x, 4x, ... capped.
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = base.saturating_mul(factor);
        Duration::from_millis(millis).min(self.max_delay)
    }

    /// Schedule with additive jitter in `[0, raw/2]`, still capped. Doubling
    /// keeps the result monotone: the next raw delay is at least twice the
    /// previous one, which dominates the previous jittered value.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.raw_delay(attempt);
        let jitter = raw.mul_f64(jitter_fraction() * 0.5);
        (raw + jitter).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(32_000), 5)
    }
}

fn jitter_fraction() -> f64 {
    let mut buf = [0u8; 8];
    if getrandom::fill(&mut buf).is_err() {
        return 0.0;
    }
    (u64::from_le_bytes(buf) >> 11) as f64 / (1u64 << 53) as f64
}

/// Explicit bounded retry loop. `sleep` is injected so tests can observe the
/// schedule without waiting on it.
pub fn run_with_retry<T>(
    policy: &RetryPolicy,
    sleep: &mut dyn FnMut(Duration),
    mut op: impl FnMut() -> Result<T, Error>,
) -> Result<T, Error> {
    let mut attempt = 0u32;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.kind() == ErrorKind::RateLimited => {
                if attempt + 1 >= policy.max_attempts {
                    return Err(err.with_attempts(policy.max_attempts));
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
