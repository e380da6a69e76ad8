use std::sync::Arc;

use config::Config;
use sqlx::PgPool;

pub mod admission;
pub mod cache;
pub mod config;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod router;
pub mod utils;

pub mod routes;

use admission::AdmissionController;
use cache::CacheAside;
use gate::MutationGate;
use utils::Authenticator;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub cache: CacheAside,
    pub gate: Arc<MutationGate>,
    pub limiter: Arc<AdmissionController>,
    pub authenticator: Option<Arc<Authenticator>>,
}
