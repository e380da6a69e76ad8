use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    gate::Resource,
    middleware::AuthUser,
    utils::{ApiResponse, success_to_api_response},
};

use super::model::{Appointment, AppointmentQuery, AppointmentRequest};

#[axum::debug_handler]
pub async fn view_appointments(
    State(state): State<AppState>,
    Query(query): Query<AppointmentQuery>,
) -> AppResult<Json<ApiResponse<Vec<Appointment>>>> {
    let appointments = Appointment::find(&state.pool, query.user_id).await?;
    Ok(success_to_api_response(appointments))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(req): Json<AppointmentRequest>,
) -> AppResult<Json<ApiResponse<Appointment>>> {
    req.validate()?;

    let appointment = state
        .gate
        .with_exclusive_write(Resource::Appointment, || async {
            Ok::<_, AppError>(Appointment::create(&state.pool, &req).await?)
        })
        .await?;

    tracing::info!("Created appointment {}", appointment.appointment_id);
    Ok(success_to_api_response(appointment))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(appointment_id): Path<i32>,
    Json(req): Json<AppointmentRequest>,
) -> AppResult<Json<ApiResponse<Appointment>>> {
    req.validate()?;

    let appointment = state
        .gate
        .with_exclusive_write(Resource::Appointment, || async {
            Appointment::update(&state.pool, appointment_id, &req)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "No appointment found with ID {}",
                        appointment_id
                    ))
                })
        })
        .await?;

    Ok(success_to_api_response(appointment))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(appointment_id): Path<i32>,
) -> AppResult<StatusCode> {
    state
        .gate
        .with_exclusive_write(Resource::Appointment, || async {
            if Appointment::delete(&state.pool, appointment_id).await? == 0 {
                return Err(AppError::NotFound(format!(
                    "No appointment found with ID {}",
                    appointment_id
                )));
            }
            Ok::<_, AppError>(())
        })
        .await?;

    tracing::info!("Deleted appointment {}", appointment_id);
    Ok(StatusCode::NO_CONTENT)
}
