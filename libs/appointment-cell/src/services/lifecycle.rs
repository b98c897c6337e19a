// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::{AvailabilityService, DoctorService};
use notification_cell::{NotificationEvent, NotificationPublisher, NotificationType};
use patient_cell::PatientService;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, AppointmentWithDetails,
    CreateAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::repository::AppointmentRepository;

/// Orchestrates booking, rescheduling, status changes and cancellation.
///
/// Every successful mutation publishes exactly one lifecycle event after the
/// write has been stored. Publishing is best-effort and never fails the call.
pub struct AppointmentLifecycleService {
    repository: Arc<dyn AppointmentRepository>,
    patients: Arc<PatientService>,
    doctors: Arc<DoctorService>,
    availability: Arc<AvailabilityService>,
    conflicts: Arc<ConflictDetectionService>,
    publisher: Arc<dyn NotificationPublisher>,
}

impl AppointmentLifecycleService {
    pub fn new(
        repository: Arc<dyn AppointmentRepository>,
        patients: Arc<PatientService>,
        doctors: Arc<DoctorService>,
        availability: Arc<AvailabilityService>,
        conflicts: Arc<ConflictDetectionService>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            repository,
            patients,
            doctors,
            availability,
            conflicts,
            publisher,
        }
    }

    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id))]
    pub async fn create_appointment(&self, request: CreateAppointmentRequest) -> Result<Appointment, AppointmentError> {
        validate_interval(request.start_time, request.end_time)?;

        let patient = self.patients.get_patient(request.patient_id).await?;
        let doctor = self.doctors.get_doctor(request.doctor_id).await?;

        self.ensure_bookable(request.doctor_id, request.start_time, request.end_time, None)
            .await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            start_time: request.start_time,
            end_time: request.end_time,
            status: AppointmentStatus::Scheduled,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        let appointment = self.repository.insert_exclusive(appointment).await?;
        info!("Appointment {} booked for patient {}", appointment.id, appointment.patient_id);

        let details = AppointmentWithDetails {
            appointment: appointment.clone(),
            patient_name: patient.full_name(),
            patient_email: Some(patient.email),
            doctor_name: doctor.full_name(),
            doctor_specialization: doctor.specialization,
        };
        self.publish(NotificationType::Created, &details, None).await;

        Ok(appointment)
    }

    /// Reschedule and/or change status and notes. A new time range needs both
    /// ends and is validated exactly like a booking, ignoring this appointment.
    #[instrument(skip(self, request))]
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointment = self.get_appointment(appointment_id).await?;

        let new_interval = match (request.start_time, request.end_time) {
            (Some(start), Some(end)) => Some((start, end)),
            (None, None) => None,
            _ => {
                return Err(AppointmentError::InvalidInput(
                    "start_time and end_time must be updated together".to_string(),
                ))
            }
        };

        if let Some(status) = request.status {
            ensure_transition(appointment.status, status)?;
        } else if new_interval.is_some() && appointment.status.is_terminal() {
            return Err(AppointmentError::InvalidTransition {
                from: appointment.status,
                to: appointment.status,
            });
        }

        if let Some((start, end)) = new_interval {
            validate_interval(start, end)?;
            self.ensure_bookable(appointment.doctor_id, start, end, Some(appointment_id))
                .await?;
            appointment.start_time = start;
            appointment.end_time = end;
        }
        if let Some(status) = request.status {
            appointment.status = status;
        }
        if request.notes.is_some() {
            appointment.notes = request.notes;
        }
        appointment.updated_at = Utc::now();

        let appointment = self.repository.update_exclusive(appointment).await?;
        info!("Appointment {} updated", appointment_id);

        let details = self.details_for(&appointment).await;
        self.publish(NotificationType::Updated, &details, None).await;

        Ok(appointment)
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointment = self.get_appointment(appointment_id).await?;
        ensure_transition(appointment.status, status)?;

        let previous = appointment.status;
        appointment.status = status;
        appointment.updated_at = Utc::now();

        let appointment = self.repository.update_exclusive(appointment).await?;
        info!("Appointment {} status changed {} -> {}", appointment_id, previous, status);

        let details = self.details_for(&appointment).await;
        self.publish(NotificationType::StatusUpdated, &details, Some(status)).await;

        Ok(appointment)
    }

    /// Soft delete: the appointment becomes `Cancelled`, drops out of default
    /// listings and no longer blocks its time range.
    #[instrument(skip(self))]
    pub async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let snapshot = self.get_appointment_details(appointment_id).await?;
        let mut appointment = snapshot.appointment.clone();
        ensure_transition(appointment.status, AppointmentStatus::Cancelled)?;

        appointment.status = AppointmentStatus::Cancelled;
        appointment.updated_at = Utc::now();

        let appointment = self.repository.update_exclusive(appointment).await?;
        info!("Appointment {} cancelled", appointment_id);

        self.publish(NotificationType::Cancelled, &snapshot, None).await;

        Ok(appointment)
    }

    /// Administrative hard delete. Emits the same `cancelled` event as `cancel_appointment`.
    #[instrument(skip(self))]
    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        let snapshot = self.get_appointment_details(appointment_id).await?;

        self.repository
            .delete(appointment_id)
            .await?
            .ok_or_else(AppointmentError::appointment_not_found)?;
        warn!("Appointment {} permanently deleted", appointment_id);

        self.publish(NotificationType::Cancelled, &snapshot, None).await;

        Ok(())
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.repository
            .get(appointment_id)
            .await?
            .ok_or_else(AppointmentError::appointment_not_found)
    }

    pub async fn get_appointment_details(&self, appointment_id: Uuid) -> Result<AppointmentWithDetails, AppointmentError> {
        self.repository
            .get_with_details(appointment_id)
            .await?
            .ok_or_else(AppointmentError::appointment_not_found)
    }

    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
    ) -> Result<Vec<AppointmentWithDetails>, AppointmentError> {
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if start > end {
                return Err(AppointmentError::InvalidInput("start_date must not be after end_date".to_string()));
            }
        }
        self.repository.search_with_details(&query).await
    }

    pub async fn patient_appointments(
        &self,
        patient_id: Uuid,
        query: AppointmentSearchQuery,
    ) -> Result<Vec<AppointmentWithDetails>, AppointmentError> {
        self.patients.get_patient(patient_id).await?;
        self.search_appointments(AppointmentSearchQuery {
            patient_id: Some(patient_id),
            ..query
        })
        .await
    }

    pub async fn doctor_appointments(
        &self,
        doctor_id: Uuid,
        query: AppointmentSearchQuery,
    ) -> Result<Vec<AppointmentWithDetails>, AppointmentError> {
        self.doctors.get_doctor(doctor_id).await?;
        self.search_appointments(AppointmentSearchQuery {
            doctor_id: Some(doctor_id),
            ..query
        })
        .await
    }

    /// Availability first, then conflicts. The repository write repeats the
    /// conflict check atomically.
    async fn ensure_bookable(
        &self,
        doctor_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        if !self.availability.is_open(doctor_id, start, end).await? {
            debug!("Doctor {} is not available from {} to {}", doctor_id, start, end);
            return Err(AppointmentError::ProviderUnavailable);
        }
        if self
            .conflicts
            .has_conflict(doctor_id, start, end, exclude_appointment_id)
            .await?
        {
            return Err(AppointmentError::SchedulingConflict);
        }
        Ok(())
    }

    async fn details_for(&self, appointment: &Appointment) -> AppointmentWithDetails {
        match self.repository.get_with_details(appointment.id).await {
            Ok(Some(details)) => details,
            Ok(None) => {
                warn!("Appointment {} vanished before its notification was built", appointment.id);
                bare_details(appointment)
            }
            Err(e) => {
                warn!("Could not load details for appointment {}: {}", appointment.id, e);
                bare_details(appointment)
            }
        }
    }

    async fn publish(&self, kind: NotificationType, details: &AppointmentWithDetails, status: Option<AppointmentStatus>) {
        let event = NotificationEvent {
            kind,
            appointment_id: details.appointment.id,
            patient_id: Some(details.appointment.patient_id),
            provider_id: Some(details.appointment.doctor_id),
            patient_email: details.patient_email.clone(),
            patient_name: details.patient_name.clone(),
            provider_name: details.doctor_name.clone(),
            appointment_time: details.appointment.start_time,
            status: status.map(|s| s.to_string()),
        };
        self.publisher.publish(event).await;
    }
}

fn bare_details(appointment: &Appointment) -> AppointmentWithDetails {
    AppointmentWithDetails {
        appointment: appointment.clone(),
        patient_name: String::new(),
        patient_email: None,
        doctor_name: String::new(),
        doctor_specialization: String::new(),
    }
}

fn validate_interval(start: NaiveDateTime, end: NaiveDateTime) -> Result<(), AppointmentError> {
    if start >= end {
        return Err(AppointmentError::InvalidInput(format!(
            "start_time {} must be before end_time {}",
            start, end
        )));
    }
    Ok(())
}

fn ensure_transition(from: AppointmentStatus, to: AppointmentStatus) -> Result<(), AppointmentError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        warn!("Invalid status transition attempted: {} -> {}", from, to);
        Err(AppointmentError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;

    use doctor_cell::{
        AvailabilityRepository, CreateAvailabilityRequest, CreateDoctorRequest, DoctorRepository,
        InMemoryAvailabilityRepository, InMemoryDoctorRepository,
    };
    use patient_cell::{CreatePatientRequest, InMemoryPatientRepository, PatientRepository};

    use crate::services::repository::InMemoryAppointmentRepository;

    mock! {
        pub Publisher {}

        #[async_trait]
        impl NotificationPublisher for Publisher {
            async fn publish(&self, event: NotificationEvent);
        }
    }

    struct Fixture {
        service: AppointmentLifecycleService,
        patient_id: Uuid,
        doctor_id: Uuid,
    }

    async fn fixture(publisher: MockPublisher) -> Fixture {
        let patient_repo: Arc<dyn PatientRepository> = Arc::new(InMemoryPatientRepository::new());
        let doctor_repo: Arc<dyn DoctorRepository> = Arc::new(InMemoryDoctorRepository::new());
        let rule_repo: Arc<dyn AvailabilityRepository> = Arc::new(InMemoryAvailabilityRepository::new());
        let repository: Arc<dyn AppointmentRepository> =
            Arc::new(InMemoryAppointmentRepository::new(patient_repo.clone(), doctor_repo.clone()));

        let patients = Arc::new(PatientService::new(patient_repo));
        let doctors = Arc::new(DoctorService::new(doctor_repo.clone(), rule_repo.clone()));
        let availability = Arc::new(AvailabilityService::new(doctor_repo, rule_repo));

        let patient = patients
            .create_patient(CreatePatientRequest {
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                email: "jane@example.com".to_string(),
                phone: String::new(),
                date_of_birth: None,
                address: String::new(),
                insurance_provider: None,
                insurance_id: None,
            })
            .await
            .unwrap();
        let doctor = doctors
            .create_doctor(CreateDoctorRequest {
                first_name: "Gregory".to_string(),
                last_name: "House".to_string(),
                email: "house@example.com".to_string(),
                phone: String::new(),
                specialization: "Diagnostics".to_string(),
            })
            .await
            .unwrap();
        availability
            .create_availability(
                doctor.id,
                CreateAvailabilityRequest {
                    day_of_week: 0,
                    start_time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    end_time: chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                    is_available: true,
                },
            )
            .await
            .unwrap();

        let service = AppointmentLifecycleService::new(
            repository.clone(),
            patients,
            doctors,
            availability,
            Arc::new(ConflictDetectionService::new(repository)),
            Arc::new(publisher),
        );

        Fixture {
            service,
            patient_id: patient.id,
            doctor_id: doctor.id,
        }
    }

    // 2024-01-01 is a Monday.
    fn monday_at(h: u32, m: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn booking(f: &Fixture, start: NaiveDateTime, end: NaiveDateTime) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            patient_id: f.patient_id,
            doctor_id: f.doctor_id,
            start_time: start,
            end_time: end,
            notes: None,
        }
    }

    #[tokio::test]
    async fn successful_booking_publishes_one_created_event() {
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .withf(|event| {
                event.kind == NotificationType::Created
                    && event.patient_name == "Jane Doe"
                    && event.provider_name == "Gregory House"
                    && event.patient_email.as_deref() == Some("jane@example.com")
            })
            .times(1)
            .return_const(());

        let f = fixture(publisher).await;
        let appointment = f
            .service
            .create_appointment(booking(&f, monday_at(10, 0), monday_at(10, 30)))
            .await
            .unwrap();

        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    }

    #[tokio::test]
    async fn rejected_booking_publishes_nothing() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();

        let f = fixture(publisher).await;
        let outside_hours = f
            .service
            .create_appointment(booking(&f, monday_at(18, 0), monday_at(18, 30)))
            .await;

        assert!(matches!(outside_hours, Err(AppointmentError::ProviderUnavailable)));
    }

    #[tokio::test]
    async fn inverted_interval_is_invalid_input() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();

        let f = fixture(publisher).await;
        let result = f
            .service
            .create_appointment(booking(&f, monday_at(11, 0), monday_at(10, 0)))
            .await;

        assert!(matches!(result, Err(AppointmentError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn partial_time_update_is_rejected_without_changes() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().times(1).return_const(());

        let f = fixture(publisher).await;
        let appointment = f
            .service
            .create_appointment(booking(&f, monday_at(10, 0), monday_at(10, 30)))
            .await
            .unwrap();

        let result = f
            .service
            .update_appointment(
                appointment.id,
                UpdateAppointmentRequest {
                    start_time: Some(monday_at(11, 0)),
                    ..UpdateAppointmentRequest::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppointmentError::InvalidInput(_))));
        let stored = f.service.get_appointment(appointment.id).await.unwrap();
        assert_eq!(stored.start_time, monday_at(10, 0));
    }

    #[tokio::test]
    async fn terminal_appointments_reject_status_changes() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().times(2).return_const(());

        let f = fixture(publisher).await;
        let appointment = f
            .service
            .create_appointment(booking(&f, monday_at(10, 0), monday_at(10, 30)))
            .await
            .unwrap();
        f.service
            .update_status(appointment.id, AppointmentStatus::Completed)
            .await
            .unwrap();

        let result = f.service.update_status(appointment.id, AppointmentStatus::Confirmed).await;
        assert!(matches!(
            result,
            Err(AppointmentError::InvalidTransition {
                from: AppointmentStatus::Completed,
                to: AppointmentStatus::Confirmed
            })
        ));

        let cancel = f.service.cancel_appointment(appointment.id).await;
        assert!(matches!(cancel, Err(AppointmentError::InvalidTransition { .. })));
    }
}
