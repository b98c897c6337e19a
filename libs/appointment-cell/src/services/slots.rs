use std::sync::Arc;

use chrono::{Days, Duration, NaiveDate};
use tracing::debug;
use uuid::Uuid;

use doctor_cell::{AvailabilityService, DoctorService, TimeWindow};

use crate::models::{Appointment, AppointmentError, Slot};
use crate::services::repository::AppointmentRepository;

/// Slots never outlast a single day.
pub const MAX_SLOT_MINUTES: i64 = 24 * 60;

pub struct SlotService {
    doctors: Arc<DoctorService>,
    availability: Arc<AvailabilityService>,
    repository: Arc<dyn AppointmentRepository>,
    default_duration_minutes: i64,
}

impl SlotService {
    pub fn new(
        doctors: Arc<DoctorService>,
        availability: Arc<AvailabilityService>,
        repository: Arc<dyn AppointmentRepository>,
        default_duration_minutes: i64,
    ) -> Self {
        Self {
            doctors,
            availability,
            repository,
            default_duration_minutes,
        }
    }

    /// Fixed-length slots covering the doctor's open windows on `date`, each
    /// tagged against the live appointments of that day. Recomputed on every call.
    pub async fn enumerate_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        duration_minutes: Option<i64>,
    ) -> Result<Vec<Slot>, AppointmentError> {
        let minutes = duration_minutes.unwrap_or(self.default_duration_minutes);
        if !(1..=MAX_SLOT_MINUTES).contains(&minutes) {
            return Err(AppointmentError::InvalidInput(format!(
                "slot duration must be between 1 and {} minutes, got {}",
                MAX_SLOT_MINUTES, minutes
            )));
        }

        self.doctors.get_doctor(doctor_id).await?;
        let windows = self.availability.open_windows(doctor_id, date).await?;
        if windows.is_empty() {
            debug!("Doctor {} has no open windows on {}", doctor_id, date);
            return Ok(Vec::new());
        }

        let day_start = date.and_time(chrono::NaiveTime::MIN);
        let day_end = date
            .checked_add_days(Days::new(1))
            .map(|next| next.and_time(chrono::NaiveTime::MIN))
            .ok_or_else(|| AppointmentError::InvalidInput(format!("date out of range: {}", date)))?;
        let booked: Vec<Appointment> = self
            .repository
            .find_overlapping(doctor_id, day_start, day_end)
            .await?
            .into_iter()
            .filter(Appointment::is_active)
            .collect();

        Ok(build_slots(&windows, date, Duration::minutes(minutes), &booked))
    }
}

/// Walk each window in `duration` steps, emitting only slots that end inside
/// the window. A slot is unavailable when it overlaps any appointment in `booked`.
pub fn build_slots(windows: &[TimeWindow], date: NaiveDate, duration: Duration, booked: &[Appointment]) -> Vec<Slot> {
    let mut slots = Vec::new();
    if duration <= Duration::zero() {
        return slots;
    }

    for window in windows {
        let window_end = date.and_time(window.end);
        let mut cursor = date.and_time(window.start);

        while let Some(end) = cursor.checked_add_signed(duration).filter(|end| *end <= window_end) {
            slots.push(Slot {
                start_time: cursor,
                end_time: end,
                is_available: !booked.iter().any(|a| a.overlaps(cursor, end)),
            });
            cursor = end;
        }
    }

    slots.sort_by_key(|slot| slot.start_time);
    slots
}
