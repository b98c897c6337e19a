use std::sync::Arc;

use axum::{
    Router,
    routing::{get, put},
};

use crate::handlers;
use crate::services::{AvailabilityService, DoctorService};

/// Shared state for the doctor routes.
pub struct DoctorState {
    pub doctors: Arc<DoctorService>,
    pub availability: Arc<AvailabilityService>,
}

pub fn doctor_routes(state: Arc<DoctorState>) -> Router {
    Router::new()
        // Doctor profile management
        .route("/", get(handlers::list_doctors).post(handlers::create_doctor))
        .route(
            "/{doctor_id}",
            get(handlers::get_doctor)
                .put(handlers::update_doctor)
                .delete(handlers::delete_doctor),
        )
        .route("/specialization/{specialization}", get(handlers::doctors_by_specialization))

        // Availability management
        .route(
            "/{doctor_id}/availability",
            get(handlers::get_doctor_availability).post(handlers::create_availability),
        )
        .route(
            "/{doctor_id}/availability/{availability_id}",
            put(handlers::update_availability).delete(handlers::delete_availability),
        )
        .with_state(state)
}
