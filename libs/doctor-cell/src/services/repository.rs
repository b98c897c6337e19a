use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{encode_filter, DatabaseError, SupabaseClient};

use crate::models::{AvailabilityRule, Doctor, DoctorError};

#[async_trait]
pub trait DoctorRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Doctor>, DoctorError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<Doctor>, DoctorError>;
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Doctor>, DoctorError>;
    async fn find_by_specialization(&self, specialization: &str) -> Result<Vec<Doctor>, DoctorError>;
    async fn insert(&self, doctor: Doctor) -> Result<Doctor, DoctorError>;
    async fn update(&self, doctor: Doctor) -> Result<Doctor, DoctorError>;
    async fn delete(&self, id: Uuid) -> Result<Option<Doctor>, DoctorError>;
}

/// Weekly availability rules. Rules are returned in stored order.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<AvailabilityRule>, DoctorError>;
    async fn find_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityRule>, DoctorError>;
    async fn find_for_day(&self, doctor_id: Uuid, day_of_week: u8) -> Result<Vec<AvailabilityRule>, DoctorError>;
    async fn insert(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, DoctorError>;
    async fn update(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, DoctorError>;
    async fn delete(&self, id: Uuid) -> Result<Option<AvailabilityRule>, DoctorError>;
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseDoctorRepository {
    supabase: SupabaseClient,
}

impl SupabaseDoctorRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl DoctorRepository for SupabaseDoctorRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", id);
        Ok(self.supabase.select_one(&path).await?)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?email=eq.{}", encode_filter(email));
        Ok(self.supabase.select_one(&path).await?)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Doctor>, DoctorError> {
        let path = format!(
            "/rest/v1/doctors?order=last_name.asc,first_name.asc&limit={}&offset={}",
            limit, offset
        );
        Ok(self.supabase.select(&path).await?)
    }

    async fn find_by_specialization(&self, specialization: &str) -> Result<Vec<Doctor>, DoctorError> {
        let path = format!(
            "/rest/v1/doctors?specialization=eq.{}&order=last_name.asc",
            encode_filter(specialization)
        );
        Ok(self.supabase.select(&path).await?)
    }

    async fn insert(&self, doctor: Doctor) -> Result<Doctor, DoctorError> {
        debug!("Inserting doctor {}", doctor.id);
        let body = serde_json::to_value(&doctor)
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        self.supabase
            .insert("doctors", body)
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => DoctorError::EmailAlreadyExists { email: doctor.email.clone() },
                other => other.into(),
            })
    }

    async fn update(&self, doctor: Doctor) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor.id);
        let body = json!({
            "first_name": doctor.first_name,
            "last_name": doctor.last_name,
            "email": doctor.email,
            "phone": doctor.phone,
            "specialization": doctor.specialization,
            "updated_at": doctor.updated_at,
        });

        self.supabase
            .update(&path, body)
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => DoctorError::EmailAlreadyExists { email: doctor.email.clone() },
                other => other.into(),
            })?
            .ok_or(DoctorError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", id);
        self.supabase.delete(&path).await.map_err(|e| match e {
            // Foreign keys from appointments block the delete.
            DatabaseError::Conflict(_) => DoctorError::HasDependencies,
            other => other.into(),
        })
    }
}

pub struct SupabaseAvailabilityRepository {
    supabase: SupabaseClient,
}

impl SupabaseAvailabilityRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl AvailabilityRepository for SupabaseAvailabilityRepository {
    async fn get(&self, id: Uuid) -> Result<Option<AvailabilityRule>, DoctorError> {
        let path = format!("/rest/v1/availabilities?id=eq.{}", id);
        Ok(self.supabase.select_one(&path).await?)
    }

    async fn find_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityRule>, DoctorError> {
        let path = format!(
            "/rest/v1/availabilities?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );
        Ok(self.supabase.select(&path).await?)
    }

    async fn find_for_day(&self, doctor_id: Uuid, day_of_week: u8) -> Result<Vec<AvailabilityRule>, DoctorError> {
        let path = format!(
            "/rest/v1/availabilities?doctor_id=eq.{}&day_of_week=eq.{}&order=start_time.asc",
            doctor_id, day_of_week
        );
        Ok(self.supabase.select(&path).await?)
    }

    async fn insert(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, DoctorError> {
        let body = serde_json::to_value(&rule)
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;
        Ok(self.supabase.insert("availabilities", body).await?)
    }

    async fn update(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, DoctorError> {
        let path = format!("/rest/v1/availabilities?id=eq.{}", rule.id);
        let body = json!({
            "day_of_week": rule.day_of_week,
            "start_time": rule.start_time,
            "end_time": rule.end_time,
            "is_available": rule.is_available,
        });

        self.supabase
            .update(&path, body)
            .await?
            .ok_or(DoctorError::AvailabilityNotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<AvailabilityRule>, DoctorError> {
        let path = format!("/rest/v1/availabilities?id=eq.{}", id);
        Ok(self.supabase.delete(&path).await?)
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryDoctorRepository {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
}

impl InMemoryDoctorRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DoctorRepository for InMemoryDoctorRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        Ok(self.doctors.read().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Doctor>, DoctorError> {
        let doctors = self.doctors.read().await;
        Ok(doctors.values().find(|d| d.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Doctor>, DoctorError> {
        let doctors = self.doctors.read().await;
        let mut all: Vec<Doctor> = doctors.values().cloned().collect();
        all.sort_by(|a, b| {
            (a.last_name.as_str(), a.first_name.as_str()).cmp(&(b.last_name.as_str(), b.first_name.as_str()))
        });
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_by_specialization(&self, specialization: &str) -> Result<Vec<Doctor>, DoctorError> {
        let doctors = self.doctors.read().await;
        let mut matching: Vec<Doctor> = doctors
            .values()
            .filter(|d| d.specialization == specialization)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.last_name.cmp(&b.last_name));
        Ok(matching)
    }

    async fn insert(&self, doctor: Doctor) -> Result<Doctor, DoctorError> {
        let mut doctors = self.doctors.write().await;
        if doctors.values().any(|d| d.email.eq_ignore_ascii_case(&doctor.email)) {
            return Err(DoctorError::EmailAlreadyExists { email: doctor.email });
        }
        doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn update(&self, doctor: Doctor) -> Result<Doctor, DoctorError> {
        let mut doctors = self.doctors.write().await;
        if !doctors.contains_key(&doctor.id) {
            return Err(DoctorError::NotFound);
        }
        if doctors
            .values()
            .any(|d| d.id != doctor.id && d.email.eq_ignore_ascii_case(&doctor.email))
        {
            return Err(DoctorError::EmailAlreadyExists { email: doctor.email });
        }
        doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        Ok(self.doctors.write().await.remove(&id))
    }
}

/// Rules are kept in insertion order so that listings match stored order.
#[derive(Default)]
pub struct InMemoryAvailabilityRepository {
    rules: RwLock<Vec<AvailabilityRule>>,
}

impl InMemoryAvailabilityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityRepository for InMemoryAvailabilityRepository {
    async fn get(&self, id: Uuid) -> Result<Option<AvailabilityRule>, DoctorError> {
        Ok(self.rules.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn find_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityRule>, DoctorError> {
        let rules = self.rules.read().await;
        Ok(rules.iter().filter(|r| r.doctor_id == doctor_id).cloned().collect())
    }

    async fn find_for_day(&self, doctor_id: Uuid, day_of_week: u8) -> Result<Vec<AvailabilityRule>, DoctorError> {
        let rules = self.rules.read().await;
        Ok(rules
            .iter()
            .filter(|r| r.doctor_id == doctor_id && r.day_of_week == day_of_week)
            .cloned()
            .collect())
    }

    async fn insert(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, DoctorError> {
        self.rules.write().await.push(rule.clone());
        Ok(rule)
    }

    async fn update(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, DoctorError> {
        let mut rules = self.rules.write().await;
        let slot = rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or(DoctorError::AvailabilityNotFound)?;
        *slot = rule.clone();
        Ok(rule)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<AvailabilityRule>, DoctorError> {
        let mut rules = self.rules.write().await;
        let position = rules.iter().position(|r| r.id == id);
        Ok(position.map(|index| rules.remove(index)))
    }
}
