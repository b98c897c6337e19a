use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{encode_filter, DatabaseError, SupabaseClient};

use crate::models::{Patient, PatientError};

/// Storage seam for patient records.
#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Patient>, PatientError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<Patient>, PatientError>;
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Patient>, PatientError>;
    async fn insert(&self, patient: Patient) -> Result<Patient, PatientError>;
    async fn update(&self, patient: Patient) -> Result<Patient, PatientError>;
}

pub struct SupabasePatientRepository {
    supabase: SupabaseClient,
}

impl SupabasePatientRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl PatientRepository for SupabasePatientRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Patient>, PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", id);
        Ok(self.supabase.select_one(&path).await?)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Patient>, PatientError> {
        let path = format!("/rest/v1/patients?email=eq.{}", encode_filter(email));
        Ok(self.supabase.select_one(&path).await?)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Patient>, PatientError> {
        let path = format!(
            "/rest/v1/patients?order=last_name.asc,first_name.asc&limit={}&offset={}",
            limit, offset
        );
        Ok(self.supabase.select(&path).await?)
    }

    async fn insert(&self, patient: Patient) -> Result<Patient, PatientError> {
        debug!("Inserting patient {}", patient.id);
        let body = serde_json::to_value(&patient)
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        self.supabase
            .insert("patients", body)
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => PatientError::EmailAlreadyExists { email: patient.email.clone() },
                other => other.into(),
            })
    }

    async fn update(&self, patient: Patient) -> Result<Patient, PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient.id);
        let body = json!({
            "first_name": patient.first_name,
            "last_name": patient.last_name,
            "email": patient.email,
            "phone": patient.phone,
            "date_of_birth": patient.date_of_birth,
            "address": patient.address,
            "insurance_provider": patient.insurance_provider,
            "insurance_id": patient.insurance_id,
            "updated_at": patient.updated_at,
        });

        self.supabase
            .update(&path, body)
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => PatientError::EmailAlreadyExists { email: patient.email.clone() },
                other => other.into(),
            })?
            .ok_or(PatientError::NotFound)
    }
}

#[derive(Default)]
pub struct InMemoryPatientRepository {
    patients: RwLock<HashMap<Uuid, Patient>>,
}

impl InMemoryPatientRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatientRepository for InMemoryPatientRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Patient>, PatientError> {
        Ok(self.patients.read().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Patient>, PatientError> {
        let patients = self.patients.read().await;
        Ok(patients
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Patient>, PatientError> {
        let patients = self.patients.read().await;
        let mut all: Vec<Patient> = patients.values().cloned().collect();
        all.sort_by(|a, b| {
            (a.last_name.as_str(), a.first_name.as_str()).cmp(&(b.last_name.as_str(), b.first_name.as_str()))
        });
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert(&self, patient: Patient) -> Result<Patient, PatientError> {
        let mut patients = self.patients.write().await;

        // Mirrors the unique index on patients.email.
        if patients.values().any(|p| p.email.eq_ignore_ascii_case(&patient.email)) {
            return Err(PatientError::EmailAlreadyExists { email: patient.email });
        }

        patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    async fn update(&self, patient: Patient) -> Result<Patient, PatientError> {
        let mut patients = self.patients.write().await;

        if !patients.contains_key(&patient.id) {
            return Err(PatientError::NotFound);
        }
        if patients
            .values()
            .any(|p| p.id != patient.id && p.email.eq_ignore_ascii_case(&patient.email))
        {
            return Err(PatientError::EmailAlreadyExists { email: patient.email });
        }

        patients.insert(patient.id, patient.clone());
        Ok(patient)
    }
}
