use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use super::backend::{CacheBackend, CacheError};

/// Result of a cache-aside read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached {
    pub payload: String,
    pub from_cache: bool,
}

/// Cache-aside reads over a [`CacheBackend`], with concurrent misses for one
/// key collapsed into a single computation.
///
/// Every backend call is bounded by `op_timeout`. Backend failures and
/// timeouts degrade to a miss (reads) or are skipped (writes and deletes);
/// they never fail the caller.
///
/// Each key carries a generation bumped by [`invalidate`](Self::invalidate).
/// A computation that started under an older generation never leaves its
/// result in the backend.
#[derive(Clone)]
pub struct CacheAside {
    backend: Arc<dyn CacheBackend>,
    op_timeout: Duration,
    inflight: Arc<DashMap<String, Arc<Mutex<()>>>>,
    generations: Arc<DashMap<String, u64>>,
}

impl CacheAside {
    pub fn new(backend: Arc<dyn CacheBackend>, op_timeout: Duration) -> Self {
        Self {
            backend,
            op_timeout,
            inflight: Arc::new(DashMap::new()),
            generations: Arc::new(DashMap::new()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .unwrap_or_else(|_| {
                Err(CacheError::Unavailable(format!(
                    "no reply within {:?}",
                    self.op_timeout
                )))
            })
    }

    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).map_or(0, |g| *g)
    }

    async fn lookup(&self, key: &str) -> Option<String> {
        match self.bounded(self.backend.get(key)).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!("Cache read failed for {}, treating as miss: {}", key, e);
                None
            }
        }
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), CacheError> {
        self.bounded(self.backend.delete(keys)).await
    }

    /// Stores `payload` unless `key` was invalidated after `generation` was read.
    async fn store(&self, key: &str, payload: &str, ttl: Duration, generation: u64) {
        if self.generation(key) != generation {
            tracing::debug!("Discarding result for {}, invalidated during compute", key);
            return;
        }
        if let Err(e) = self.bounded(self.backend.set(key, payload, ttl)).await {
            tracing::warn!("Cache write failed for {}: {}", key, e);
            return;
        }
        // An invalidation that landed between the check and the write has
        // already issued its delete; undo the write ourselves.
        if self.generation(key) != generation {
            if let Err(e) = self.remove(&[key]).await {
                tracing::warn!("Failed to drop stale entry {}: {}", key, e);
            }
        }
    }

    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<Cached, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(payload) = self.lookup(key).await {
            tracing::debug!("Cache hit: {}", key);
            return Ok(Cached {
                payload,
                from_cache: true,
            });
        }

        let flight = self.inflight.entry(key.to_string()).or_default().clone();
        let _guard = flight.lock().await;

        // Whoever held the lock before us may have filled the entry.
        let result = match self.lookup(key).await {
            Some(payload) => {
                tracing::debug!("Cache filled while waiting: {}", key);
                Ok(Cached {
                    payload,
                    from_cache: true,
                })
            }
            None => {
                tracing::info!("Cache miss, computing {}", key);
                let generation = self.generation(key);
                match compute().await {
                    Ok(payload) => {
                        self.store(key, &payload, ttl, generation).await;
                        Ok(Cached {
                            payload,
                            from_cache: false,
                        })
                    }
                    Err(e) => Err(e),
                }
            }
        };

        // map + our clone: nobody else is queued on this key
        self.inflight
            .remove_if(key, |_, lock| Arc::strong_count(lock) <= 2);
        result
    }

    pub async fn invalidate(&self, keys: &[&str]) {
        for key in keys {
            *self.generations.entry((*key).to_string()).or_insert(0) += 1;
        }
        if let Err(e) = self.remove(keys).await {
            tracing::warn!("Cache invalidation failed for {:?}: {}", keys, e);
        } else {
            tracing::debug!("Invalidated {:?}", keys);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures_util::future::join_all;

    use super::*;
    use crate::cache::backend::{CacheError, MemoryCache};

    const OP_TIMEOUT: Duration = Duration::from_secs(1);

    struct DownBackend;

    /// Accepts the request and never answers, like a blackholed Redis.
    struct StalledBackend;

    #[async_trait]
    impl CacheBackend for StalledBackend {
        async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
            std::future::pending().await
        }

        async fn set(&self, _: &str, _: &str, _: Duration) -> Result<(), CacheError> {
            std::future::pending().await
        }

        async fn delete(&self, _: &[&str]) -> Result<(), CacheError> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl CacheBackend for DownBackend {
        async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set(&self, _: &str, _: &str, _: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _: &[&str]) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    fn memory() -> CacheAside {
        CacheAside::new(Arc::new(MemoryCache::new()), OP_TIMEOUT)
    }

    async fn counted(calls: &AtomicUsize, payload: &str) -> Result<String, String> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{payload}#{n}"))
    }

    #[tokio::test]
    async fn second_read_within_ttl_is_served_verbatim() {
        let cache = memory();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(600);

        let first = cache
            .get_or_compute("properties", ttl, || counted(&calls, "listing"))
            .await
            .unwrap();
        let second = cache
            .get_or_compute("properties", ttl, || counted(&calls, "listing"))
            .await
            .unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.payload, second.payload);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_scenario_recomputes_after_expiry() {
        let cache = memory();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(10);

        let t0 = cache
            .get_or_compute("properties", ttl, || counted(&calls, "p"))
            .await
            .unwrap();
        assert!(!t0.from_cache);

        tokio::time::advance(Duration::from_secs(5)).await;
        let t5 = cache
            .get_or_compute("properties", ttl, || counted(&calls, "p"))
            .await
            .unwrap();
        assert!(t5.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        let t11 = cache
            .get_or_compute("properties", ttl, || counted(&calls, "p"))
            .await
            .unwrap();
        assert!(!t11.from_cache);
        assert_eq!(t11.payload, "p#2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_compute_once() {
        let cache = memory();
        let calls = Arc::new(AtomicUsize::new(0));

        let reads = (0..10).map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            async move {
                cache
                    .get_or_compute("properties", Duration::from_secs(60), || async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>("slow listing".to_string())
                    })
                    .await
                    .unwrap()
            }
        });
        let results = join_all(reads).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.payload == "slow listing"));
        assert_eq!(results.iter().filter(|r| !r.from_cache).count(), 1);
        assert!(cache.inflight.is_empty());
    }

    #[tokio::test]
    async fn compute_failure_is_not_cached() {
        let cache = memory();
        let ttl = Duration::from_secs(60);

        let err = cache
            .get_or_compute("properties", ttl, || async {
                Err::<String, _>("relation \"properties\" does not exist")
            })
            .await
            .unwrap_err();
        assert!(err.contains("does not exist"));

        let calls = AtomicUsize::new(0);
        let next = cache
            .get_or_compute("properties", ttl, || counted(&calls, "ok"))
            .await
            .unwrap();
        assert!(!next.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unavailable_backend_falls_through_to_compute() {
        let cache = CacheAside::new(Arc::new(DownBackend), OP_TIMEOUT);
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        for _ in 0..2 {
            let read = cache
                .get_or_compute("properties", ttl, || counted(&calls, "fresh"))
                .await
                .unwrap();
            assert!(!read.from_cache);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // invalidation errors are swallowed too
        cache.invalidate(&["properties"]).await;
    }

    #[tokio::test]
    async fn invalidate_forces_next_read_to_compute() {
        let cache = memory();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(600);

        cache
            .get_or_compute("properties", ttl, || counted(&calls, "v"))
            .await
            .unwrap();
        cache.invalidate(&["properties"]).await;
        let after = cache
            .get_or_compute("properties", ttl, || counted(&calls, "v"))
            .await
            .unwrap();

        assert!(!after.from_cache);
        assert_eq!(after.payload, "v#2");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backend_costs_at_most_the_op_timeout() {
        let cache = CacheAside::new(Arc::new(StalledBackend), OP_TIMEOUT);
        let calls = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let read = cache
            .get_or_compute("properties", Duration::from_secs(60), || counted(&calls, "db"))
            .await
            .unwrap();
        assert!(!read.from_cache);
        assert_eq!(read.payload, "db#1");
        // lookup, re-check and write-back each give up after one timeout
        let waited = started.elapsed();
        assert!(waited >= OP_TIMEOUT * 3 && waited < OP_TIMEOUT * 4, "{waited:?}");

        let started = tokio::time::Instant::now();
        cache.invalidate(&["properties"]).await;
        let waited = started.elapsed();
        assert!(waited >= OP_TIMEOUT && waited < OP_TIMEOUT * 2, "{waited:?}");
    }

    #[tokio::test]
    async fn invalidation_during_compute_discards_the_stale_result() {
        let cache = memory();
        let ttl = Duration::from_secs(600);
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute("properties", ttl, || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, String>("pre-write rows".to_string())
                    })
                    .await
                    .unwrap()
            })
        };

        started_rx.await.unwrap();
        cache.invalidate(&["properties"]).await;
        release_tx.send(()).unwrap();

        let stale = reader.await.unwrap();
        assert_eq!(stale.payload, "pre-write rows");
        assert!(cache.backend().get("properties").await.unwrap().is_none());

        let calls = AtomicUsize::new(0);
        let next = cache
            .get_or_compute("properties", ttl, || counted(&calls, "post-write rows"))
            .await
            .unwrap();
        assert!(!next.from_cache);
        assert_eq!(next.payload, "post-write rows#1");
    }
}
