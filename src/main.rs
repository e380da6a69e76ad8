use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use property_backend::{
    AppState,
    admission::AdmissionController,
    cache::{CacheAside, CacheBackend, MemoryCache, RedisCache},
    config::{CacheBackendKind, Config},
    gate::MutationGate,
    router::create_router,
    utils::Authenticator,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'property_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    if config.run_migrations {
        sqlx::migrate!()
            .run(&pool)
            .await
            .expect("Failed to run database migrations");
        tracing::info!("Database migrations applied");
    }

    let backend: Arc<dyn CacheBackend> = match config.cache_backend {
        CacheBackendKind::Redis => {
            let url = config
                .redis_url
                .clone()
                .expect("REDIS_URL is required when CACHE_BACKEND=redis");
            let client = redis::Client::open(url).expect("Failed to create Redis client");
            tracing::info!("Using Redis cache backend");
            Arc::new(RedisCache::new(client, config.cache_timeout()))
        }
        CacheBackendKind::Memory => {
            tracing::info!("Using in-process cache backend");
            Arc::new(MemoryCache::new())
        }
    };

    let limiter = Arc::new(AdmissionController::new(
        config.rate_limit_capacity,
        config.rate_limit_refill_per_sec,
        config.rate_limit_idle(),
    ));
    limiter.spawn_sweeper(config.rate_limit_sweep_interval());

    let authenticator = config
        .jwt_secret
        .as_deref()
        .map(|secret| Arc::new(Authenticator::new(secret)));
    if config.auth_required && authenticator.is_none() {
        tracing::warn!("AUTH_REQUIRED is set but JWT_SECRET is empty; writes will fail with 500");
    }

    let state = AppState {
        pool,
        config: config.clone(),
        cache: CacheAside::new(backend, config.cache_timeout()),
        gate: Arc::new(MutationGate::new(
            config.write_lock_scope,
            config.write_lock_timeout(),
        )),
        limiter,
        authenticator,
    };

    let app = create_router(state);

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
