use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorError, DoctorListQuery, DoctorWithAvailability, UpdateDoctorRequest,
};
use crate::services::repository::{AvailabilityRepository, DoctorRepository};

const DEFAULT_PAGE_SIZE: usize = 100;

pub struct DoctorService {
    doctors: Arc<dyn DoctorRepository>,
    rules: Arc<dyn AvailabilityRepository>,
}

impl DoctorService {
    pub fn new(doctors: Arc<dyn DoctorRepository>, rules: Arc<dyn AvailabilityRepository>) -> Self {
        Self { doctors, rules }
    }

    pub async fn create_doctor(&self, request: CreateDoctorRequest) -> Result<Doctor, DoctorError> {
        debug!("Creating doctor profile for: {}", request.email);

        require_non_empty(&request.first_name, "first_name")?;
        require_non_empty(&request.last_name, "last_name")?;
        require_non_empty(&request.specialization, "specialization")?;
        validate_email(&request.email)?;

        if self.doctors.get_by_email(&request.email).await?.is_some() {
            return Err(DoctorError::EmailAlreadyExists { email: request.email });
        }

        let now = Utc::now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email.trim().to_string(),
            phone: request.phone,
            specialization: request.specialization.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        let doctor = self.doctors.insert(doctor).await?;
        info!("Doctor profile created with ID: {}", doctor.id);
        Ok(doctor)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        self.doctors.get(doctor_id).await?.ok_or(DoctorError::NotFound)
    }

    /// Doctor record together with all of its availability rules.
    pub async fn get_doctor_with_availability(&self, doctor_id: Uuid) -> Result<DoctorWithAvailability, DoctorError> {
        let doctor = self.get_doctor(doctor_id).await?;
        let availabilities = self.rules.find_for_doctor(doctor_id).await?;
        Ok(DoctorWithAvailability { doctor, availabilities })
    }

    pub async fn update_doctor(&self, doctor_id: Uuid, request: UpdateDoctorRequest) -> Result<Doctor, DoctorError> {
        let mut doctor = self.get_doctor(doctor_id).await?;

        if let Some(first_name) = request.first_name {
            require_non_empty(&first_name, "first_name")?;
            doctor.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = request.last_name {
            require_non_empty(&last_name, "last_name")?;
            doctor.last_name = last_name.trim().to_string();
        }
        if let Some(email) = request.email {
            validate_email(&email)?;
            if let Some(existing) = self.doctors.get_by_email(&email).await? {
                if existing.id != doctor_id {
                    return Err(DoctorError::EmailAlreadyExists { email });
                }
            }
            doctor.email = email.trim().to_string();
        }
        if let Some(phone) = request.phone {
            doctor.phone = phone;
        }
        if let Some(specialization) = request.specialization {
            require_non_empty(&specialization, "specialization")?;
            doctor.specialization = specialization.trim().to_string();
        }
        doctor.updated_at = Utc::now();

        self.doctors.update(doctor).await
    }

    /// Removes the doctor and its availability rules.
    pub async fn delete_doctor(&self, doctor_id: Uuid) -> Result<(), DoctorError> {
        self.get_doctor(doctor_id).await?;

        for rule in self.rules.find_for_doctor(doctor_id).await? {
            if self.rules.delete(rule.id).await?.is_none() {
                warn!("Availability rule {} vanished during doctor delete", rule.id);
            }
        }

        self.doctors.delete(doctor_id).await?.ok_or(DoctorError::NotFound)?;
        info!("Doctor {} deleted", doctor_id);
        Ok(())
    }

    pub async fn list_doctors(&self, query: DoctorListQuery) -> Result<Vec<Doctor>, DoctorError> {
        self.doctors
            .list(query.limit.unwrap_or(DEFAULT_PAGE_SIZE), query.offset.unwrap_or(0))
            .await
    }

    pub async fn find_by_specialization(&self, specialization: &str) -> Result<Vec<Doctor>, DoctorError> {
        self.doctors.find_by_specialization(specialization).await
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<(), DoctorError> {
    if value.trim().is_empty() {
        return Err(DoctorError::ValidationError(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), DoctorError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(DoctorError::ValidationError(format!("invalid email address: {}", email))),
    }
}
