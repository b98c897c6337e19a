use axum::{routing::get, Json, Router};
use serde_json::json;

use appointment_cell::appointment_routes;
use doctor_cell::doctor_routes;
use patient_cell::create_patient_router;

use crate::state::AppState;

pub fn create_router(state: &AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .nest("/patients", create_patient_router(state.patients.clone()))
        .nest("/doctors", doctor_routes(state.doctors.clone()))
        .nest("/appointments", appointment_routes(state.appointments.clone()))
}
