use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::gate::LockScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub rate_limit_capacity: u32,
    pub rate_limit_refill_per_sec: f64,
    pub rate_limit_idle_secs: u64,
    pub rate_limit_sweep_secs: u64,
    pub cache_backend: CacheBackendKind,
    pub cache_ttl_secs: u64,
    pub cache_timeout_ms: u64,
    pub cache_invalidate_on_write: bool,
    pub write_lock_scope: LockScope,
    pub write_lock_timeout_ms: u64,
    pub jwt_secret: Option<String>,
    pub auth_required: bool,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

/// Reads an optional variable, falling back to `default` when it is unset or unparsable.
fn var_or<T: FromStr>(key: &str, default: T) -> T {
    let Ok(raw) = env::var(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}, using default", key, raw);
            default
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let cache_backend = match env::var("CACHE_BACKEND").as_deref() {
            Ok("memory") => CacheBackendKind::Memory,
            Ok("redis") | Err(_) => CacheBackendKind::Redis,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    key: "CACHE_BACKEND",
                    reason: format!("expected redis or memory, got {:?}", other),
                });
            }
        };
        let redis_url = match cache_backend {
            CacheBackendKind::Redis => Some(required("REDIS_URL")?),
            CacheBackendKind::Memory => env::var("REDIS_URL").ok(),
        };
        let write_lock_scope = match env::var("WRITE_LOCK_SCOPE").as_deref() {
            Ok("resource") => LockScope::PerResource,
            Ok("global") | Err(_) => LockScope::Global,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    key: "WRITE_LOCK_SCOPE",
                    reason: format!("expected global or resource, got {:?}", other),
                });
            }
        };

        let config = Config {
            database_url: required("DATABASE_URL")?,
            redis_url,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            server_port: var_or("SERVER_PORT", 9090),
            db_max_connections: var_or("DB_MAX_CONNECTIONS", 10),
            run_migrations: var_or("RUN_MIGRATIONS", true),
            rate_limit_capacity: var_or("RATE_LIMIT_CAPACITY", 5),
            rate_limit_refill_per_sec: var_or("RATE_LIMIT_REFILL_PER_SEC", 2.0),
            rate_limit_idle_secs: var_or("RATE_LIMIT_IDLE_SECS", 600),
            rate_limit_sweep_secs: var_or("RATE_LIMIT_SWEEP_SECS", 60),
            cache_backend,
            cache_ttl_secs: var_or("CACHE_TTL_SECS", 600),
            cache_timeout_ms: var_or("CACHE_TIMEOUT_MS", 500),
            cache_invalidate_on_write: var_or("CACHE_INVALIDATE_ON_WRITE", true),
            write_lock_scope,
            write_lock_timeout_ms: var_or("WRITE_LOCK_TIMEOUT_MS", 5000),
            jwt_secret: env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            auth_required: var_or("AUTH_REQUIRED", false),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the admission controller and cache cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_CAPACITY",
                reason: "must be at least 1".into(),
            });
        }
        let rate = self.rate_limit_refill_per_sec;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_REFILL_PER_SEC",
                reason: format!("must be a positive number, got {}", rate),
            });
        }
        if self.cache_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "CACHE_TIMEOUT_MS",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    pub fn rate_limit_idle(&self) -> Duration {
        Duration::from_secs(self.rate_limit_idle_secs)
    }

    pub fn rate_limit_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sweep_secs.max(1))
    }

    pub fn write_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.write_lock_timeout_ms)
    }
}

impl Default for Config {
    /// Local development settings: the `from_env` defaults, except that the
    /// cache is in-process so no Redis is needed.
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/property_app".into(),
            redis_url: None,
            server_host: "127.0.0.1".into(),
            server_port: 9090,
            db_max_connections: 10,
            run_migrations: true,
            rate_limit_capacity: 5,
            rate_limit_refill_per_sec: 2.0,
            rate_limit_idle_secs: 600,
            rate_limit_sweep_secs: 60,
            cache_backend: CacheBackendKind::Memory,
            cache_ttl_secs: 600,
            cache_timeout_ms: 500,
            cache_invalidate_on_write: true,
            write_lock_scope: LockScope::Global,
            write_lock_timeout_ms: 5000,
            jwt_secret: None,
            auth_required: false,
        }
    }
}
