use std::time::Duration;

use tokio::time::Instant;

/// Per-client token bucket state.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    pub capacity: f64,
    pub refill_rate: f64,
    pub tokens: f64,
    pub last_refill: Instant,
}

impl TokenBucket {
    /// A new bucket starts full.
    pub fn full(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self {
            capacity,
            refill_rate,
            tokens: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        // `now` earlier than `last_refill` saturates to zero elapsed
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Refills, then takes one token. On rejection returns how long until a token is available.
    pub fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(secs_or_max((1.0 - self.tokens) / self.refill_rate))
        }
    }

    /// Time after `last_refill` at which the bucket is guaranteed to be full again.
    pub fn time_to_full(&self) -> Duration {
        secs_or_max(self.capacity / self.refill_rate)
    }
}

/// Zero rates divide to infinity and tiny ones overflow `Duration`; both mean "never".
fn secs_or_max(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
