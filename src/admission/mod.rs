//! Per-client admission control.
//!
//! Every client identifier owns a [`TokenBucket`], created full on first
//! sight. The registry is a sharded concurrent map, so the refill, check and
//! deduct for one client run under that entry's lock and two requests from
//! the same client can never spend the same token.

mod bucket;
mod identity;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub use bucket::TokenBucket;
pub use identity::{UNKNOWN_CLIENT, resolve_client_id};

pub struct AdmissionController {
    capacity: f64,
    refill_rate: f64,
    idle_timeout: Duration,
    buckets: DashMap<String, TokenBucket>,
}

impl AdmissionController {
    pub fn new(capacity: u32, refill_rate: f64, idle_timeout: Duration) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_rate: refill_rate.max(0.0),
            idle_timeout,
            buckets: DashMap::new(),
        }
    }

    pub fn admit(&self, client_id: &str) -> bool {
        self.try_admit(client_id).is_ok()
    }

    /// Like [`admit`](Self::admit) but reports the wait until the next token on rejection.
    pub fn try_admit(&self, client_id: &str) -> Result<(), Duration> {
        self.admit_at(client_id, Instant::now())
    }

    pub fn admit_at(&self, client_id: &str, now: Instant) -> Result<(), Duration> {
        // Fast path avoids allocating the key for known clients.
        if let Some(mut bucket) = self.buckets.get_mut(client_id) {
            return bucket.try_take(now);
        }
        self.buckets
            .entry(client_id.to_string())
            .or_insert_with(|| TokenBucket::full(self.capacity, self.refill_rate, now))
            .try_take(now)
    }

    /// Drops buckets that have been idle long enough to be full again.
    ///
    /// A dropped client is recreated full on its next request, which is the
    /// state its bucket would have reached anyway. Returns the number removed.
    pub fn sweep_idle(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            let idle = now.saturating_duration_since(bucket.last_refill);
            idle < self.idle_timeout.max(bucket.time_to_full())
        });
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Runs [`sweep_idle`](Self::sweep_idle) every `every` for the life of the process.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = limiter.sweep_idle(Instant::now());
                if removed > 0 {
                    tracing::debug!(
                        "Evicted {} idle rate-limit buckets, {} tracked",
                        removed,
                        limiter.tracked_clients()
                    );
                }
            }
        })
    }
}
