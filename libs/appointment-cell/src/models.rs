// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::DoctorError;
use patient_cell::PatientError;
use shared_database::DatabaseError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Cancelled appointments never block a time range.
    pub fn is_active(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        crate::services::conflict::intervals_overlap(self.start_time, self.end_time, start, end)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Completed,
        AppointmentStatus::NoShow,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Cancelled | AppointmentStatus::Completed | AppointmentStatus::NoShow
        )
    }

    /// Statuses reachable from `self`. Non-terminal appointments may be moved
    /// to any status; terminal ones are frozen.
    pub fn allowed_transitions(&self) -> &'static [AppointmentStatus] {
        if self.is_terminal() {
            &[]
        } else {
            &Self::ALL
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appointment joined with the names the listings and notifications need.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentWithDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
    pub patient_email: Option<String>,
    pub doctor_name: String,
    pub doctor_specialization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    /// Only appointments starting at or after this instant.
    pub start_date: Option<NaiveDateTime>,
    /// Only appointments ending at or before this instant.
    pub end_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub include_cancelled: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Bookable candidate interval. Derived on every request, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub available_only: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Doctor not available at requested time")]
    ProviderUnavailable,

    #[error("Appointment conflicts with existing booking")]
    SchedulingConflict,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Database error: {0}")]
    Database(String),
}

impl AppointmentError {
    pub fn appointment_not_found() -> Self {
        AppointmentError::NotFound("Appointment".to_string())
    }
}

/// Name of the exclusion constraint that keeps live appointments of a doctor disjoint.
pub const NO_DOUBLE_BOOKING_CONSTRAINT: &str = "appointments_no_double_booking";

/// Postgres SQLSTATE for `exclusion_violation`.
const EXCLUSION_VIOLATION: &str = "23P01";

impl From<DatabaseError> for AppointmentError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Conflict(ref body)
                if body.contains(NO_DOUBLE_BOOKING_CONSTRAINT) || body.contains(EXCLUSION_VIOLATION) =>
            {
                AppointmentError::SchedulingConflict
            }
            other => AppointmentError::Database(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound => AppointmentError::NotFound("Doctor".to_string()),
            DoctorError::ValidationError(msg) => AppointmentError::InvalidInput(msg),
            other => AppointmentError::Database(other.to_string()),
        }
    }
}

impl From<PatientError> for AppointmentError {
    fn from(e: PatientError) -> Self {
        match e {
            PatientError::NotFound => AppointmentError::NotFound("Patient".to_string()),
            PatientError::ValidationError(msg) => AppointmentError::InvalidInput(msg),
            other => AppointmentError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_exclusion_constraint_means_double_booking() {
        let exclusion = DatabaseError::Conflict(
            r#"{"code":"23P01","message":"conflicting key value violates exclusion constraint \"appointments_no_double_booking\""}"#
                .to_string(),
        );
        assert!(matches!(AppointmentError::from(exclusion), AppointmentError::SchedulingConflict));

        let duplicate_key = DatabaseError::Conflict(
            r#"{"code":"23505","message":"duplicate key value violates unique constraint \"appointments_pkey\""}"#.to_string(),
        );
        assert!(matches!(
            AppointmentError::from(duplicate_key),
            AppointmentError::Database(msg) if msg.contains("appointments_pkey")
        ));
    }
}
