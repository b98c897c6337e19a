use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{
    CreateAvailabilityRequest, CreateDoctorRequest, DoctorError, DoctorListQuery,
    UpdateAvailabilityRequest, UpdateDoctorRequest,
};
use crate::router::DoctorState;

impl From<DoctorError> for AppError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
            DoctorError::AvailabilityNotFound => AppError::NotFound("Availability rule not found".to_string()),
            DoctorError::EmailAlreadyExists { .. } => AppError::BadRequest(e.to_string()),
            DoctorError::HasDependencies => AppError::Conflict(e.to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

// ==============================================================================
// DOCTOR PROFILE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<DoctorState>>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor = state.doctors.create_doctor(request).await?;

    Ok((StatusCode::CREATED, Json(json!(doctor))))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = state.doctors.get_doctor_with_availability(doctor_id).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = state.doctors.update_doctor(doctor_id, request).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.doctors.delete_doctor(doctor_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<DoctorState>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = state.doctors.list_doctors(query).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn doctors_by_specialization(
    State(state): State<Arc<DoctorState>>,
    Path(specialization): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctors = state.doctors.find_by_specialization(&specialization).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let rules = state.availability.get_doctor_availability(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "availabilities": rules
    })))
}

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let rule = state.availability.create_availability(doctor_id, request).await?;

    Ok((StatusCode::CREATED, Json(json!(rule))))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<Arc<DoctorState>>,
    Path((doctor_id, availability_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let rule = state
        .availability
        .update_availability(doctor_id, availability_id, request)
        .await?;

    Ok(Json(json!(rule)))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<DoctorState>>,
    Path((doctor_id, availability_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.availability.delete_availability(doctor_id, availability_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
