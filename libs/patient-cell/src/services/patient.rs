use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{CreatePatientRequest, Patient, PatientError, PatientListQuery, UpdatePatientRequest};
use crate::services::repository::PatientRepository;

const DEFAULT_PAGE_SIZE: usize = 100;

pub struct PatientService {
    repository: Arc<dyn PatientRepository>,
}

impl PatientService {
    pub fn new(repository: Arc<dyn PatientRepository>) -> Self {
        Self { repository }
    }

    pub async fn create_patient(&self, request: CreatePatientRequest) -> Result<Patient, PatientError> {
        debug!("Creating new patient record for: {}", request.email);

        validate_name(&request.first_name, "first_name")?;
        validate_name(&request.last_name, "last_name")?;
        validate_email(&request.email)?;

        if self.repository.get_by_email(&request.email).await?.is_some() {
            return Err(PatientError::EmailAlreadyExists { email: request.email });
        }

        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email.trim().to_string(),
            phone: request.phone,
            date_of_birth: request.date_of_birth,
            address: request.address,
            insurance_provider: request.insurance_provider,
            insurance_id: request.insurance_id,
            created_at: now,
            updated_at: now,
        };

        let patient = self.repository.insert(patient).await?;
        info!("Patient record created with ID: {}", patient.id);

        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: Uuid) -> Result<Patient, PatientError> {
        self.repository
            .get(patient_id)
            .await?
            .ok_or(PatientError::NotFound)
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        let mut patient = self.get_patient(patient_id).await?;

        if let Some(first_name) = request.first_name {
            validate_name(&first_name, "first_name")?;
            patient.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = request.last_name {
            validate_name(&last_name, "last_name")?;
            patient.last_name = last_name.trim().to_string();
        }
        if let Some(email) = request.email {
            validate_email(&email)?;
            if let Some(existing) = self.repository.get_by_email(&email).await? {
                if existing.id != patient_id {
                    return Err(PatientError::EmailAlreadyExists { email });
                }
            }
            patient.email = email.trim().to_string();
        }
        if let Some(phone) = request.phone {
            patient.phone = phone;
        }
        if request.date_of_birth.is_some() {
            patient.date_of_birth = request.date_of_birth;
        }
        if let Some(address) = request.address {
            patient.address = address;
        }
        if request.insurance_provider.is_some() {
            patient.insurance_provider = request.insurance_provider;
        }
        if request.insurance_id.is_some() {
            patient.insurance_id = request.insurance_id;
        }
        patient.updated_at = Utc::now();

        self.repository.update(patient).await
    }

    pub async fn list_patients(&self, query: PatientListQuery) -> Result<Vec<Patient>, PatientError> {
        self.repository
            .list(query.limit.unwrap_or(DEFAULT_PAGE_SIZE), query.offset.unwrap_or(0))
            .await
    }
}

fn validate_name(value: &str, field: &str) -> Result<(), PatientError> {
    if value.trim().is_empty() {
        return Err(PatientError::ValidationError(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), PatientError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(PatientError::ValidationError(format!("invalid email address: {}", email))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::repository::InMemoryPatientRepository;
    use assert_matches::assert_matches;

    fn service() -> PatientService {
        PatientService::new(Arc::new(InMemoryPatientRepository::new()))
    }

    fn request(email: &str) -> CreatePatientRequest {
        CreatePatientRequest {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            phone: "555-0100".to_string(),
            date_of_birth: None,
            address: String::new(),
            insurance_provider: None,
            insurance_id: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let service = service();
        service.create_patient(request("jane@example.com")).await.unwrap();

        let result = service.create_patient(request("jane@example.com")).await;
        assert_matches!(result, Err(PatientError::EmailAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn malformed_email_is_a_validation_error() {
        let result = service().create_patient(request("not-an-email")).await;
        assert_matches!(result, Err(PatientError::ValidationError(_)));
    }

    #[tokio::test]
    async fn update_changes_only_supplied_fields() {
        let service = service();
        let patient = service.create_patient(request("jane@example.com")).await.unwrap();

        let updated = service
            .update_patient(
                patient.id,
                UpdatePatientRequest {
                    phone: Some("555-0199".to_string()),
                    ..UpdatePatientRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.phone, "555-0199");
        assert_eq!(updated.email, "jane@example.com");
        assert_eq!(updated.full_name(), "Jane Doe");
    }

    #[tokio::test]
    async fn missing_patient_is_not_found() {
        let result = service().get_patient(Uuid::new_v4()).await;
        assert_matches!(result, Err(PatientError::NotFound));
    }
}
