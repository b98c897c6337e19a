// libs/appointment-cell/src/services/repository.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::DoctorRepository;
use patient_cell::PatientRepository;
use shared_config::AppConfig;
use shared_database::{encode_filter, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, AppointmentWithDetails,
};
use crate::services::conflict::intervals_overlap;

const DEFAULT_PAGE_SIZE: usize = 100;

/// Storage seam for appointments.
///
/// `insert_exclusive` and `update_exclusive` must make the overlap check and
/// the write one atomic step: two live appointments of the same doctor may
/// never overlap, whatever the interleaving of concurrent writers. A write
/// that would break this fails with `SchedulingConflict`.
///
/// `update_exclusive` only applies to a stored row whose status is still
/// non-terminal. If a concurrent writer moved the row to a terminal status
/// first, the update fails with `InvalidTransition` and nothing is written.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    async fn get_with_details(&self, id: Uuid) -> Result<Option<AppointmentWithDetails>, AppointmentError>;

    async fn search_with_details(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<AppointmentWithDetails>, AppointmentError>;

    /// Appointments of `doctor_id` (any status) intersecting `[from, to)`, ascending by start.
    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn insert_exclusive(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    async fn update_exclusive(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    async fn delete(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;
}

/// `scheduled,confirmed`, for PostgREST `in.(...)` filters.
fn non_terminal_filter() -> String {
    AppointmentStatus::ALL
        .iter()
        .filter(|status| !status.is_terminal())
        .map(AppointmentStatus::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn timestamp_filter(value: NaiveDateTime) -> String {
    encode_filter(&value.format("%Y-%m-%dT%H:%M:%S").to_string())
}

// ==============================================================================
// SUPABASE
// ==============================================================================

const DETAILS_SELECT: &str =
    "*,patient:patients(first_name,last_name,email),doctor:doctors(first_name,last_name,specialization)";

#[derive(Debug, Deserialize)]
struct PatientRef {
    first_name: String,
    last_name: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DoctorRef {
    first_name: String,
    last_name: String,
    specialization: String,
}

/// Row shape of an appointment with embedded patient and doctor.
#[derive(Debug, Deserialize)]
struct AppointmentDetailsRow {
    #[serde(flatten)]
    appointment: Appointment,
    patient: Option<PatientRef>,
    doctor: Option<DoctorRef>,
}

impl From<AppointmentDetailsRow> for AppointmentWithDetails {
    fn from(row: AppointmentDetailsRow) -> Self {
        let (patient_name, patient_email) = match row.patient {
            Some(p) => (format!("{} {}", p.first_name, p.last_name), p.email),
            None => (String::new(), None),
        };
        let (doctor_name, doctor_specialization) = match row.doctor {
            Some(d) => (format!("{} {}", d.first_name, d.last_name), d.specialization),
            None => (String::new(), String::new()),
        };

        AppointmentWithDetails {
            appointment: row.appointment,
            patient_name,
            patient_email,
            doctor_name,
            doctor_specialization,
        }
    }
}

/// PostgREST-backed store. Double-booking protection comes from the
/// `appointments_no_double_booking` exclusion constraint; its violation is
/// answered with HTTP 409 and surfaces as `SchedulingConflict`.
pub struct SupabaseAppointmentRepository {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn search_path(query: &AppointmentSearchQuery) -> String {
        let mut query_parts = vec![format!("select={}", DETAILS_SELECT)];

        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(start) = query.start_date {
            query_parts.push(format!("start_time=gte.{}", timestamp_filter(start)));
        }
        if let Some(end) = query.end_date {
            query_parts.push(format!("end_time=lte.{}", timestamp_filter(end)));
        }
        if !query.include_cancelled {
            query_parts.push("status=neq.cancelled".to_string());
        }

        query_parts.push("order=start_time.asc".to_string());
        query_parts.push(format!("limit={}", query.limit.unwrap_or(DEFAULT_PAGE_SIZE)));
        query_parts.push(format!("offset={}", query.offset.unwrap_or(0)));

        format!("/rest/v1/appointments?{}", query_parts.join("&"))
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        Ok(self.supabase.select_one(&path).await?)
    }

    async fn get_with_details(&self, id: Uuid) -> Result<Option<AppointmentWithDetails>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&select={}", id, DETAILS_SELECT);
        let row: Option<AppointmentDetailsRow> = self.supabase.select_one(&path).await?;
        Ok(row.map(Into::into))
    }

    async fn search_with_details(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<AppointmentWithDetails>, AppointmentError> {
        let rows: Vec<AppointmentDetailsRow> = self.supabase.select(&Self::search_path(query)).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&start_time=lt.{}&end_time=gt.{}&order=start_time.asc",
            doctor_id,
            timestamp_filter(to),
            timestamp_filter(from)
        );
        Ok(self.supabase.select(&path).await?)
    }

    async fn insert_exclusive(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        debug!("Inserting appointment {} for doctor {}", appointment.id, appointment.doctor_id);
        let body = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        Ok(self.supabase.insert("appointments", body).await?)
    }

    async fn update_exclusive(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=in.({})",
            appointment.id,
            non_terminal_filter()
        );
        let body = json!({
            "start_time": appointment.start_time,
            "end_time": appointment.end_time,
            "status": appointment.status,
            "notes": appointment.notes,
            "updated_at": appointment.updated_at,
        });

        if let Some(updated) = self.supabase.update(&path, body).await? {
            return Ok(updated);
        }

        // Nothing matched: the row is gone or already terminal.
        match self.get(appointment.id).await? {
            Some(stored) => {
                warn!(
                    "Appointment {} is already {}, refusing update to {}",
                    stored.id, stored.status, appointment.status
                );
                Err(AppointmentError::InvalidTransition {
                    from: stored.status,
                    to: appointment.status,
                })
            }
            None => Err(AppointmentError::appointment_not_found()),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        Ok(self.supabase.delete(&path).await?)
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

/// Process-local store. The overlap check and the write happen under one
/// write lock, which serialises concurrent bookings.
pub struct InMemoryAppointmentRepository {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    patients: Arc<dyn PatientRepository>,
    doctors: Arc<dyn DoctorRepository>,
}

impl InMemoryAppointmentRepository {
    pub fn new(patients: Arc<dyn PatientRepository>, doctors: Arc<dyn DoctorRepository>) -> Self {
        Self {
            appointments: RwLock::new(HashMap::new()),
            patients,
            doctors,
        }
    }

    async fn with_details(&self, appointment: Appointment) -> Result<AppointmentWithDetails, AppointmentError> {
        let patient = self.patients.get(appointment.patient_id).await?;
        let doctor = self.doctors.get(appointment.doctor_id).await?;

        if patient.is_none() || doctor.is_none() {
            warn!("Appointment {} references a missing patient or doctor", appointment.id);
        }

        Ok(AppointmentWithDetails {
            patient_name: patient.as_ref().map(|p| p.full_name()).unwrap_or_default(),
            patient_email: patient.map(|p| p.email),
            doctor_name: doctor.as_ref().map(|d| d.full_name()).unwrap_or_default(),
            doctor_specialization: doctor.map(|d| d.specialization).unwrap_or_default(),
            appointment,
        })
    }
}

fn blocks(existing: &Appointment, candidate: &Appointment) -> bool {
    existing.id != candidate.id
        && existing.doctor_id == candidate.doctor_id
        && existing.is_active()
        && intervals_overlap(existing.start_time, existing.end_time, candidate.start_time, candidate.end_time)
}

fn matches_query(appointment: &Appointment, query: &AppointmentSearchQuery) -> bool {
    query.patient_id.map_or(true, |id| appointment.patient_id == id)
        && query.doctor_id.map_or(true, |id| appointment.doctor_id == id)
        && query.start_date.map_or(true, |start| appointment.start_time >= start)
        && query.end_date.map_or(true, |end| appointment.end_time <= end)
        && (query.include_cancelled || appointment.is_active())
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn get_with_details(&self, id: Uuid) -> Result<Option<AppointmentWithDetails>, AppointmentError> {
        match self.get(id).await? {
            Some(appointment) => Ok(Some(self.with_details(appointment).await?)),
            None => Ok(None),
        }
    }

    async fn search_with_details(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<AppointmentWithDetails>, AppointmentError> {
        let mut selected: Vec<Appointment> = {
            let appointments = self.appointments.read().await;
            appointments
                .values()
                .filter(|a| matches_query(a, query))
                .cloned()
                .collect()
        };
        selected.sort_by_key(|a| a.start_time);

        let mut results = Vec::new();
        for appointment in selected
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        {
            results.push(self.with_details(appointment).await?);
        }
        Ok(results)
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.overlaps(from, to))
            .cloned()
            .collect();
        found.sort_by_key(|a| a.start_time);
        Ok(found)
    }

    async fn insert_exclusive(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;

        if appointment.is_active() && appointments.values().any(|existing| blocks(existing, &appointment)) {
            return Err(AppointmentError::SchedulingConflict);
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_exclusive(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;

        let stored = appointments
            .get(&appointment.id)
            .ok_or_else(AppointmentError::appointment_not_found)?;
        if stored.status.is_terminal() {
            return Err(AppointmentError::InvalidTransition {
                from: stored.status,
                to: appointment.status,
            });
        }
        if appointment.is_active() && appointments.values().any(|existing| blocks(existing, &appointment)) {
            return Err(AppointmentError::SchedulingConflict);
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.write().await.remove(&id))
    }
}
