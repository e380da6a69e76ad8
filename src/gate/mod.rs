//! Write serialization.
//!
//! Every create, update and delete against the store runs inside
//! [`MutationGate::with_exclusive_write`]. The guard is dropped on every exit
//! path (success, error, panic, or the caller's future being dropped), so a
//! failed write never leaves the gate held.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    User,
    Property,
    Appointment,
}

impl Resource {
    fn index(self) -> usize {
        match self {
            Resource::User => 0,
            Resource::Property => 1,
            Resource::Appointment => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    /// One lock for all resources.
    Global,
    /// One lock per resource type.
    PerResource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("write lock not acquired within {waited:?}")]
pub struct LockTimeout {
    pub waited: Duration,
}

pub struct MutationGate {
    scope: LockScope,
    timeout: Duration,
    locks: [Mutex<()>; 3],
}

impl MutationGate {
    pub fn new(scope: LockScope, timeout: Duration) -> Self {
        Self {
            scope,
            timeout,
            locks: [Mutex::new(()), Mutex::new(()), Mutex::new(())],
        }
    }

    pub fn scope(&self) -> LockScope {
        self.scope
    }

    fn lock_for(&self, resource: Resource) -> &Mutex<()> {
        match self.scope {
            LockScope::Global => &self.locks[0],
            LockScope::PerResource => &self.locks[resource.index()],
        }
    }

    /// Runs `write` while holding the lock for `resource`.
    ///
    /// Waits at most the configured timeout for the lock; expiry is reported
    /// through `E: From<LockTimeout>` and `write` is not run.
    pub async fn with_exclusive_write<F, Fut, T, E>(
        &self,
        resource: Resource,
        write: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockTimeout>,
    {
        let lock = self.lock_for(resource);
        let _guard = match tokio::time::timeout(self.timeout, lock.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!(
                    "Write lock for {:?} not acquired within {:?}",
                    resource,
                    self.timeout
                );
                return Err(LockTimeout {
                    waited: self.timeout,
                }
                .into());
            }
        };
        tracing::debug!("Write lock acquired for {:?}", resource);
        write().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

    use futures_util::future::join_all;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Busy,
        Constraint,
    }

    impl From<LockTimeout> for TestError {
        fn from(_: LockTimeout) -> Self {
            TestError::Busy
        }
    }

    /// Store whose insert and id readback are separate steps, like a
    /// prepare/execute/last-insert-id sequence.
    #[derive(Default)]
    struct TwoStepStore {
        next_id: AtomicI64,
        last_insert_id: AtomicI64,
    }

    impl TwoStepStore {
        async fn insert(&self, pause: Duration) -> i64 {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.last_insert_id.store(id, Ordering::SeqCst);
            tokio::time::sleep(pause).await;
            id
        }

        fn last_insert_id(&self) -> i64 {
            self.last_insert_id.load(Ordering::SeqCst)
        }
    }

    fn gate(scope: LockScope) -> Arc<MutationGate> {
        Arc::new(MutationGate::new(scope, Duration::from_secs(30)))
    }

    #[tokio::test(start_paused = true)]
    async fn interleaved_writers_never_see_each_others_ids() {
        let gate = gate(LockScope::Global);
        let store = Arc::new(TwoStepStore::default());

        let writers = (0..12u64).map(|i| {
            let gate = Arc::clone(&gate);
            let store = Arc::clone(&store);
            let resource = match i % 3 {
                0 => Resource::User,
                1 => Resource::Property,
                _ => Resource::Appointment,
            };
            async move {
                tokio::time::sleep(Duration::from_millis((i * 7) % 5)).await;
                gate.with_exclusive_write(resource, || async {
                    let inserted = store.insert(Duration::from_millis((i * 13) % 11)).await;
                    Ok::<_, TestError>((inserted, store.last_insert_id()))
                })
                .await
                .unwrap()
            }
        });

        let results = join_all(writers).await;
        for (inserted, read_back) in &results {
            assert_eq!(inserted, read_back);
        }
        let mut ids: Vec<_> = results.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn failed_write_releases_the_lock() {
        let gate = MutationGate::new(LockScope::Global, Duration::from_millis(100));

        let failed: Result<(), TestError> = gate
            .with_exclusive_write(Resource::Property, || async { Err(TestError::Constraint) })
            .await;
        assert_eq!(failed, Err(TestError::Constraint));

        let next: Result<i32, TestError> = gate
            .with_exclusive_write(Resource::Property, || async { Ok(7) })
            .await;
        assert_eq!(next, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_past_timeout_is_a_distinct_error() {
        let gate = Arc::new(MutationGate::new(LockScope::Global, Duration::from_millis(10)));

        let holder = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                gate.with_exclusive_write(Resource::User, || async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok::<_, TestError>(())
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        let ran = AtomicBool::new(false);
        let waited: Result<(), TestError> = gate
            .with_exclusive_write(Resource::Appointment, || async {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert_eq!(waited, Err(TestError::Busy));
        assert!(!ran.load(Ordering::SeqCst));

        holder.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn per_resource_scope_only_blocks_same_resource() {
        let gate = Arc::new(MutationGate::new(
            LockScope::PerResource,
            Duration::from_millis(10),
        ));

        let holder = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                gate.with_exclusive_write(Resource::Property, || async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok::<_, TestError>(())
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        let other: Result<(), TestError> = gate
            .with_exclusive_write(Resource::User, || async { Ok(()) })
            .await;
        assert_eq!(other, Ok(()));

        let same: Result<(), TestError> = gate
            .with_exclusive_write(Resource::Property, || async { Ok(()) })
            .await;
        assert_eq!(same, Err(TestError::Busy));

        holder.await.unwrap().unwrap();
    }
}
