use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use appointment_cell::{
    AppointmentLifecycleService, AppointmentRepository, AppointmentServices, ConflictDetectionService,
    InMemoryAppointmentRepository, SlotService, SupabaseAppointmentRepository,
};
use doctor_cell::{
    AvailabilityRepository, AvailabilityService, DoctorRepository, DoctorService, DoctorState,
    InMemoryAvailabilityRepository, InMemoryDoctorRepository, SupabaseAvailabilityRepository,
    SupabaseDoctorRepository,
};
use notification_cell::{
    email_transport, ConsumerConfig, InMemoryNotificationQueue, NotificationConsumerService, NotificationDispatcher,
    NotificationQueue, RedisNotificationQueue,
};
use patient_cell::{InMemoryPatientRepository, PatientRepository, PatientService, SupabasePatientRepository};
use shared_config::{AppConfig, QueueBackend, StorageBackend};

/// Everything the HTTP layer needs, wired for the configured backends.
pub struct AppState {
    pub patients: Arc<PatientService>,
    pub doctors: Arc<DoctorState>,
    pub appointments: Arc<AppointmentServices>,
    /// Present when notifications stay in this process.
    pub consumer: Option<Arc<NotificationConsumerService>>,
}

impl AppState {
    pub async fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let (patient_repo, doctor_repo, rule_repo, appointment_repo) = repositories(config);

        let queue: Arc<dyn NotificationQueue> = match config.queue_backend {
            QueueBackend::Redis => Arc::new(RedisNotificationQueue::new(config).await?),
            QueueBackend::InMemory => {
                info!("Using in-process notification queue; consumer runs inside the API");
                Arc::new(InMemoryNotificationQueue::new())
            }
        };
        let consumer = match config.queue_backend {
            QueueBackend::Redis => None,
            QueueBackend::InMemory => Some(Arc::new(NotificationConsumerService::new(
                queue.clone(),
                email_transport(config),
                ConsumerConfig::from_app_config(config),
            ))),
        };

        let patients = Arc::new(PatientService::new(patient_repo));
        let doctors = Arc::new(DoctorService::new(doctor_repo.clone(), rule_repo.clone()));
        let availability = Arc::new(AvailabilityService::new(doctor_repo, rule_repo));

        let lifecycle = Arc::new(AppointmentLifecycleService::new(
            appointment_repo.clone(),
            patients.clone(),
            doctors.clone(),
            availability.clone(),
            Arc::new(ConflictDetectionService::new(appointment_repo.clone())),
            Arc::new(NotificationDispatcher::with_timeout(
                queue,
                Duration::from_millis(config.notification_publish_timeout_ms),
            )),
        ));
        let slots = Arc::new(SlotService::new(
            doctors.clone(),
            availability.clone(),
            appointment_repo,
            config.slot_duration_minutes,
        ));

        Ok(Self {
            patients,
            doctors: Arc::new(DoctorState { doctors, availability }),
            appointments: Arc::new(AppointmentServices { lifecycle, slots }),
            consumer,
        })
    }
}

type Repositories = (
    Arc<dyn PatientRepository>,
    Arc<dyn DoctorRepository>,
    Arc<dyn AvailabilityRepository>,
    Arc<dyn AppointmentRepository>,
);

fn repositories(config: &AppConfig) -> Repositories {
    match config.storage_backend {
        StorageBackend::Supabase => {
            info!("Using Supabase storage at {}", config.supabase_url);
            (
                Arc::new(SupabasePatientRepository::new(config)),
                Arc::new(SupabaseDoctorRepository::new(config)),
                Arc::new(SupabaseAvailabilityRepository::new(config)),
                Arc::new(SupabaseAppointmentRepository::new(config)),
            )
        }
        StorageBackend::InMemory => {
            warn!("Using in-memory storage; data is lost on restart");
            let patients: Arc<dyn PatientRepository> = Arc::new(InMemoryPatientRepository::new());
            let doctors: Arc<dyn DoctorRepository> = Arc::new(InMemoryDoctorRepository::new());
            (
                patients.clone(),
                doctors.clone(),
                Arc::new(InMemoryAvailabilityRepository::new()),
                Arc::new(InMemoryAppointmentRepository::new(patients, doctors)),
            )
        }
    }
}
