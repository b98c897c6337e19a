// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{
    AppointmentError, AppointmentSearchQuery, CreateAppointmentRequest, SlotQuery, UpdateAppointmentRequest,
    UpdateStatusRequest,
};
use crate::router::AppointmentServices;

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::InvalidInput(msg) => AppError::BadRequest(msg),
            AppointmentError::ProviderUnavailable | AppointmentError::InvalidTransition { .. } => {
                AppError::BadRequest(e.to_string())
            }
            AppointmentError::SchedulingConflict => AppError::Conflict(e.to_string()),
            AppointmentError::NotFound(_) => AppError::NotFound(e.to_string()),
            AppointmentError::Database(msg) => AppError::Database(msg),
        }
    }
}

// ==============================================================================
// BOOKING & LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppointmentServices>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state.lifecycle.create_appointment(request).await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentServices>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.lifecycle.get_appointment_details(appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppointmentServices>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.lifecycle.update_appointment(appointment_id, request).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppointmentServices>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.lifecycle.update_status(appointment_id, request.status).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentServices>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.lifecycle.cancel_appointment(appointment_id).await?;

    Ok(Json(json!({
        "message": "Appointment cancelled successfully",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppointmentServices>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.lifecycle.delete_appointment(appointment_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppointmentServices>>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.lifecycle.search_appointments(query).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppointmentServices>>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.lifecycle.patient_appointments(patient_id, query).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppointmentServices>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.lifecycle.doctor_appointments(doctor_id, query).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppointmentServices>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    debug!("Listing slots for doctor {} on {}", doctor_id, query.date);

    let mut slots = state
        .slots
        .enumerate_slots(doctor_id, query.date, query.duration_minutes)
        .await?;
    if query.available_only {
        slots.retain(|slot| slot.is_available);
    }

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "slots": slots,
        "total": slots.len()
    })))
}
