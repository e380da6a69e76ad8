// Read-path caching: backends, the cache-aside store and key names.

pub mod aside;
pub mod backend;
pub mod keys;

pub use aside::{CacheAside, Cached};
pub use backend::{CacheBackend, CacheError, MemoryCache, RedisCache};
