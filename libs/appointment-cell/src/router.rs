// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::handlers;
use crate::services::{AppointmentLifecycleService, SlotService};

/// Shared state for the appointment routes.
pub struct AppointmentServices {
    pub lifecycle: Arc<AppointmentLifecycleService>,
    pub slots: Arc<SlotService>,
}

pub fn appointment_routes(state: Arc<AppointmentServices>) -> Router {
    Router::new()
        // Core appointment management
        .route("/", get(handlers::search_appointments).post(handlers::create_appointment))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment)
                .put(handlers::update_appointment)
                .delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/status", put(handlers::update_appointment_status))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))

        // Appointment listings
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_appointments))

        // Slot enumeration
        .route("/doctors/{doctor_id}/available-slots", get(handlers::get_available_slots))
        .with_state(state)
}
