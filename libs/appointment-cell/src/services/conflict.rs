use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};
use crate::services::repository::AppointmentRepository;

/// Half-open intervals `[a, b)` and `[c, d)` overlap iff `a < d && c < b`.
/// Touching intervals (`b == c`) do not overlap.
pub fn intervals_overlap(a: NaiveDateTime, b: NaiveDateTime, c: NaiveDateTime, d: NaiveDateTime) -> bool {
    a < d && c < b
}

/// Active appointments in `existing` that overlap `[start, end)`, skipping `exclude`.
pub fn find_conflicts<'a>(
    existing: &'a [Appointment],
    start: NaiveDateTime,
    end: NaiveDateTime,
    exclude_appointment_id: Option<Uuid>,
) -> Vec<&'a Appointment> {
    existing
        .iter()
        .filter(|a| Some(a.id) != exclude_appointment_id)
        .filter(|a| a.is_active())
        .filter(|a| a.overlaps(start, end))
        .collect()
}

pub struct ConflictDetectionService {
    repository: Arc<dyn AppointmentRepository>,
}

impl ConflictDetectionService {
    pub fn new(repository: Arc<dyn AppointmentRepository>) -> Self {
        Self { repository }
    }

    /// Whether `[start, end)` overlaps any live appointment of the doctor.
    /// Availability is not considered here.
    pub async fn has_conflict(
        &self,
        doctor_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        Ok(!self
            .conflicting_appointments(doctor_id, start, end, exclude_appointment_id)
            .await?
            .is_empty())
    }

    pub async fn conflicting_appointments(
        &self,
        doctor_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Checking conflicts for doctor {} from {} to {}", doctor_id, start, end);

        let candidates = self.repository.find_overlapping(doctor_id, start, end).await?;
        let conflicts: Vec<Appointment> = find_conflicts(&candidates, start, end, exclude_appointment_id)
            .into_iter()
            .cloned()
            .collect();

        if !conflicts.is_empty() {
            warn!(
                "Conflict detected for doctor {} - {} conflicting appointments",
                doctor_id,
                conflicts.len()
            );
        }

        Ok(conflicts)
    }
}
