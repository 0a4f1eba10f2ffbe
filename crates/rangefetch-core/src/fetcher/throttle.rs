//! Per-unit speed throttle.
//!
//! Each chunk must take at least `chunk_len / limit` seconds, measured from
//! the moment the unit resumed reading after the previous chunk; whatever is
//! missing is returned as a pause during which the unit stops reading its
//! stream. Time is passed in by the caller so tests can drive a synthetic clock.
//!
//! This is stricter than measuring from the previous chunk's arrival: a pause
//! served after one chunk does not count towards the next chunk's time, so
//! chunks delivered back to back never exceed the limit on average. Every
//! pause is at least as long as the arrival-anchored one would be.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Throttle {
    /// Bytes per second; 0 = unlimited.
    limit: u64,
    resumed_at: Instant,
}

impl Throttle {
    pub fn new(limit: u64, started_at: Instant) -> Self {
        Self {
            limit,
            resumed_at: started_at,
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Minimum time a chunk of `chunk_len` bytes must take under this limit.
    pub fn required(&self, chunk_len: usize) -> Duration {
        if self.limit == 0 {
            return Duration::ZERO;
        }
        let nanos = (chunk_len as u128 * 1_000_000_000) / self.limit as u128;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Record a chunk arriving at `now`; returns how long to hold off before
    /// accepting more data, or `None` when the unit is within its budget.
    pub fn on_chunk(&mut self, now: Instant, chunk_len: usize) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.resumed_at);
        let pause = self
            .required(chunk_len)
            .checked_sub(elapsed)
            .filter(|pause| !pause.is_zero());
        self.resumed_at = now + pause.unwrap_or_default();
        pause
    }
}
