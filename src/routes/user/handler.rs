use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    cache::keys::USER_DEPENDENT_KEYS,
    error::{AppError, AppResult},
    gate::Resource,
    middleware::AuthUser,
    routes::{invalidate_after_write, property::Property},
    utils::{ApiResponse, success_to_api_response},
};

use super::model::{
    CreateUserRequest, UpdateUserRequest, User, UserQuery, UserWithProperties,
    hash_password_blocking,
};

#[axum::debug_handler]
pub async fn view_user(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<ApiResponse<UserWithProperties>>> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::Validation("User ID required".into()))?;

    let user = User::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No user found with ID {}", user_id)))?;
    let properties = Property::find_by_owner(&state.pool, user_id).await?;

    Ok(success_to_api_response(UserWithProperties { user, properties }))
}

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    req.validate()?;
    // hashing is slow; keep it outside the write lock
    let password_hash = hash_password_blocking(req.password.clone()).await?;

    let user = state
        .gate
        .with_exclusive_write(Resource::User, || async {
            Ok::<_, AppError>(User::create(&state.pool, &req, &password_hash).await?)
        })
        .await?;
    invalidate_after_write(&state, USER_DEPENDENT_KEYS).await;

    tracing::info!("Created user {}", user.user_id);
    Ok(success_to_api_response(user))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<i32>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    req.validate()?;
    let password_hash = match req.password.clone() {
        Some(password) => Some(hash_password_blocking(password).await?),
        None => None,
    };

    let user = state
        .gate
        .with_exclusive_write(Resource::User, || async {
            let user = User::update(&state.pool, user_id, &req, password_hash.as_deref())
                .await?
                .ok_or_else(|| AppError::NotFound(format!("No user found with ID {}", user_id)))?;
            Ok::<_, AppError>(user)
        })
        .await?;
    invalidate_after_write(&state, USER_DEPENDENT_KEYS).await;

    Ok(success_to_api_response(user))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<i32>,
) -> AppResult<StatusCode> {
    state
        .gate
        .with_exclusive_write(Resource::User, || async {
            if User::delete(&state.pool, user_id).await? == 0 {
                return Err(AppError::NotFound(format!(
                    "No user found with ID {}",
                    user_id
                )));
            }
            Ok::<_, AppError>(())
        })
        .await?;
    invalidate_after_write(&state, USER_DEPENDENT_KEYS).await;

    tracing::info!("Deleted user {}", user_id);
    Ok(StatusCode::NO_CONTENT)
}
