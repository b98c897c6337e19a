use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::{AppConfig, QueueBackend, StorageBackend};

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub email_api_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
            email_api_url: "http://localhost:54322/emails".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing the Supabase client at a mock server.
    pub fn with_supabase(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            storage_backend: StorageBackend::Supabase,
            queue_backend: QueueBackend::InMemory,
            email_api_url: self.email_api_url.clone(),
            email_api_key: "test-email-key".to_string(),
            ..AppConfig::default()
        }
    }

    /// Fully in-process configuration: memory storage and memory queue.
    pub fn in_memory() -> AppConfig {
        AppConfig {
            storage_backend: StorageBackend::InMemory,
            queue_backend: QueueBackend::InMemory,
            ..AppConfig::default()
        }
    }
}

/// 2024-01-01 is a Monday; `weekday_date(0)` is that Monday, `weekday_date(1)` the Tuesday.
pub fn weekday_date(day_of_week: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1 + day_of_week).unwrap_or_default()
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default())
}

/// Canned PostgREST rows shaped like the tables in the scheduling migration.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn patient_row(patient_id: Uuid, email: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "first_name": "Jane",
            "last_name": "Doe",
            "email": email,
            "phone": "555-0100",
            "date_of_birth": "1990-04-12",
            "address": "1 Main St",
            "insurance_provider": null,
            "insurance_id": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    pub fn doctor_row(doctor_id: Uuid, email: &str, specialization: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "first_name": "Gregory",
            "last_name": "House",
            "email": email,
            "phone": "555-0200",
            "specialization": specialization,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    pub fn availability_row(rule_id: Uuid, doctor_id: Uuid, day_of_week: u8) -> serde_json::Value {
        json!({
            "id": rule_id,
            "doctor_id": doctor_id,
            "day_of_week": day_of_week,
            "start_time": "09:00:00",
            "end_time": "17:00:00",
            "is_available": true
        })
    }

    pub fn appointment_row(
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "start_time": start,
            "end_time": end,
            "status": status,
            "notes": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "code": code,
            "message": message,
            "details": null,
            "hint": null
        })
    }
}
