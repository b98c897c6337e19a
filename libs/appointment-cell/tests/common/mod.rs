// Shared in-memory wiring for the appointment integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use uuid::Uuid;

use appointment_cell::*;
use doctor_cell::{
    AvailabilityRepository, AvailabilityService, CreateAvailabilityRequest, CreateDoctorRequest, DoctorRepository,
    DoctorService, InMemoryAvailabilityRepository, InMemoryDoctorRepository,
};
use notification_cell::{InMemoryNotificationQueue, NotificationDispatcher, NotificationEvent, NotificationQueue};
use patient_cell::{CreatePatientRequest, InMemoryPatientRepository, PatientRepository, PatientService};

pub struct World {
    pub lifecycle: Arc<AppointmentLifecycleService>,
    pub slots: Arc<SlotService>,
    pub patients: Arc<PatientService>,
    pub doctors: Arc<DoctorService>,
    pub availability: Arc<AvailabilityService>,
    pub queue: Arc<InMemoryNotificationQueue>,
}

impl World {
    pub fn new() -> Self {
        Self::with_rules(Arc::new(InMemoryAvailabilityRepository::new()))
    }

    /// Same wiring, with a caller-supplied availability rule store.
    pub fn with_rules(rule_repo: Arc<dyn AvailabilityRepository>) -> Self {
        let patient_repo: Arc<dyn PatientRepository> = Arc::new(InMemoryPatientRepository::new());
        let doctor_repo: Arc<dyn DoctorRepository> = Arc::new(InMemoryDoctorRepository::new());
        let repository: Arc<dyn AppointmentRepository> =
            Arc::new(InMemoryAppointmentRepository::new(patient_repo.clone(), doctor_repo.clone()));

        let patients = Arc::new(PatientService::new(patient_repo));
        let doctors = Arc::new(DoctorService::new(doctor_repo.clone(), rule_repo.clone()));
        let availability = Arc::new(AvailabilityService::new(doctor_repo, rule_repo));
        let queue = Arc::new(InMemoryNotificationQueue::new());

        let lifecycle = Arc::new(AppointmentLifecycleService::new(
            repository.clone(),
            patients.clone(),
            doctors.clone(),
            availability.clone(),
            Arc::new(ConflictDetectionService::new(repository.clone())),
            Arc::new(NotificationDispatcher::new(queue.clone())),
        ));
        let slots = Arc::new(SlotService::new(doctors.clone(), availability.clone(), repository, 30));

        Self {
            lifecycle,
            slots,
            patients,
            doctors,
            availability,
            queue,
        }
    }

    pub fn services(&self) -> Arc<AppointmentServices> {
        Arc::new(AppointmentServices {
            lifecycle: self.lifecycle.clone(),
            slots: self.slots.clone(),
        })
    }

    pub async fn patient(&self, first_name: &str, email: &str) -> Uuid {
        self.patients
            .create_patient(CreatePatientRequest {
                first_name: first_name.to_string(),
                last_name: "Doe".to_string(),
                email: email.to_string(),
                phone: String::new(),
                date_of_birth: None,
                address: String::new(),
                insurance_provider: None,
                insurance_id: None,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn doctor(&self, email: &str) -> Uuid {
        self.doctors
            .create_doctor(CreateDoctorRequest {
                first_name: "Gregory".to_string(),
                last_name: "House".to_string(),
                email: email.to_string(),
                phone: String::new(),
                specialization: "Diagnostics".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    /// Open `doctor_id` on `day_of_week` (0 = Monday) between the given hours.
    pub async fn open(&self, doctor_id: Uuid, day_of_week: u8, from_hour: u32, to_hour: u32) {
        self.availability
            .create_availability(
                doctor_id,
                CreateAvailabilityRequest {
                    day_of_week,
                    start_time: NaiveTime::from_hms_opt(from_hour, 0, 0).unwrap(),
                    end_time: NaiveTime::from_hms_opt(to_hour, 0, 0).unwrap(),
                    is_available: true,
                },
            )
            .await
            .unwrap();
    }

    /// Drain queued notification events in publish order.
    pub async fn drain_events(&self) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        while let Some(payload) = self.queue.reserve(Duration::from_millis(1)).await.unwrap() {
            self.queue.ack(&payload).await.unwrap();
            events.push(serde_json::from_str(&payload).unwrap());
        }
        events
    }
}
