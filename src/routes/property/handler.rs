use axum::{
    extract::{Json, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    cache::keys::{PROPERTIES_KEY, PROPERTY_DEPENDENT_KEYS},
    error::{AppError, AppResult},
    gate::Resource,
    middleware::AuthUser,
    routes::invalidate_after_write,
    utils::{ApiResponse, success_to_api_response},
};

use super::model::{Property, PropertyListing, PropertyRequest};

/// Reports whether a listing came from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

#[axum::debug_handler]
pub async fn view_properties(State(state): State<AppState>) -> AppResult<Response> {
    tracing::debug!("Checking cache for properties");

    let cached = state
        .cache
        .get_or_compute(PROPERTIES_KEY, state.config.cache_ttl(), || async {
            let listings = PropertyListing::find_all(&state.pool).await?;
            tracing::info!("Fetched {} properties from database, caching", listings.len());
            let Json(body) = success_to_api_response(listings);
            serde_json::to_string(&body).map_err(|e| AppError::Internal(e.to_string()))
        })
        .await?;

    if cached.from_cache {
        tracing::info!("Serving properties from cache");
    }

    let mut response = cached.payload.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(if cached.from_cache { "HIT" } else { "MISS" }),
    );
    Ok(response)
}

#[axum::debug_handler]
pub async fn create_property(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(req): Json<PropertyRequest>,
) -> AppResult<Json<ApiResponse<Property>>> {
    req.validate()?;

    let property = state
        .gate
        .with_exclusive_write(Resource::Property, || async {
            let property = Property::create(&state.pool, &req).await?;
            Ok::<_, AppError>(property)
        })
        .await?;
    invalidate_after_write(&state, PROPERTY_DEPENDENT_KEYS).await;

    tracing::info!("Created property {}", property.property_id);
    Ok(success_to_api_response(property))
}

#[axum::debug_handler]
pub async fn update_property(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(property_id): Path<i32>,
    Json(req): Json<PropertyRequest>,
) -> AppResult<Json<ApiResponse<Property>>> {
    req.validate()?;

    let property = state
        .gate
        .with_exclusive_write(Resource::Property, || async {
            let property = Property::update(&state.pool, property_id, &req)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("No property found with ID {}", property_id))
                })?;
            Ok::<_, AppError>(property)
        })
        .await?;
    invalidate_after_write(&state, PROPERTY_DEPENDENT_KEYS).await;

    Ok(success_to_api_response(property))
}

#[axum::debug_handler]
pub async fn delete_property(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(property_id): Path<i32>,
) -> AppResult<StatusCode> {
    state
        .gate
        .with_exclusive_write(Resource::Property, || async {
            if Property::delete(&state.pool, property_id).await? == 0 {
                return Err(AppError::NotFound(format!(
                    "No property found with ID {}",
                    property_id
                )));
            }
            Ok::<_, AppError>(())
        })
        .await?;
    invalidate_after_write(&state, PROPERTY_DEPENDENT_KEYS).await;

    tracing::info!("Deleted property {}", property_id);
    Ok(StatusCode::NO_CONTENT)
}
