use std::sync::Arc;

use axum::{Router, routing::get};

use crate::{
    AppState,
    middleware::{log_errors, rate_limit},
    routes::{appointment, property, user},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(user::view_user).post(user::create_user))
        .route("/user/{id}", axum::routing::put(user::update_user).delete(user::delete_user))
}

pub fn property_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/property",
            get(property::view_properties).post(property::create_property),
        )
        .route(
            "/property/{id}",
            axum::routing::put(property::update_property).delete(property::delete_property),
        )
}

pub fn appointment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/appointment",
            get(appointment::view_appointments).post(appointment::create_appointment),
        )
        .route(
            "/appointment/{id}",
            axum::routing::put(appointment::update_appointment)
                .delete(appointment::delete_appointment),
        )
}

/// Full application: every route sits behind admission control, and 5xx
/// bodies are logged on the way out.
pub fn create_router(state: AppState) -> Router {
    let limiter = Arc::clone(&state.limiter);

    let router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(user_routes())
        .merge(property_routes())
        .merge(appointment_routes())
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn_with_state(limiter, rate_limit));

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    router.with_state(state)
}
