pub mod appointment;
pub mod property;
pub mod user;

use crate::AppState;

/// Drops cached payloads built from rows a write just changed.
///
/// Called once the write has committed and the write lock is released, so a
/// slow cache never holds up other writers. A listing computed concurrently
/// from pre-write rows is discarded by the cache's generation check.
pub(crate) async fn invalidate_after_write(state: &AppState, keys: &[&str]) {
    if state.config.cache_invalidate_on_write {
        state.cache.invalidate(keys).await;
    } else {
        tracing::debug!("Write invalidation disabled, {:?} expire by TTL", keys);
    }
}
