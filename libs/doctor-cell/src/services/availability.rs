use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    day_index, AvailabilityRule, CreateAvailabilityRequest, DoctorError, TimeWindow,
    UpdateAvailabilityRequest,
};
use crate::services::repository::{AvailabilityRepository, DoctorRepository};

pub struct AvailabilityService {
    doctors: Arc<dyn DoctorRepository>,
    rules: Arc<dyn AvailabilityRepository>,
}

impl AvailabilityService {
    pub fn new(doctors: Arc<dyn DoctorRepository>, rules: Arc<dyn AvailabilityRepository>) -> Self {
        Self { doctors, rules }
    }

    /// Create availability schedule for a doctor
    pub async fn create_availability(
        &self,
        doctor_id: Uuid,
        request: CreateAvailabilityRequest,
    ) -> Result<AvailabilityRule, DoctorError> {
        debug!("Creating availability for doctor: {}", doctor_id);

        self.ensure_doctor(doctor_id).await?;
        validate_rule(request.day_of_week, request.start_time, request.end_time)?;

        let rule = AvailabilityRule {
            id: Uuid::new_v4(),
            doctor_id,
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
            is_available: request.is_available,
        };

        let rule = self.rules.insert(rule).await?;
        info!("Availability rule {} created for doctor {}", rule.id, doctor_id);
        Ok(rule)
    }

    pub async fn update_availability(
        &self,
        doctor_id: Uuid,
        rule_id: Uuid,
        request: UpdateAvailabilityRequest,
    ) -> Result<AvailabilityRule, DoctorError> {
        let mut rule = self.owned_rule(doctor_id, rule_id).await?;

        if let Some(day) = request.day_of_week {
            rule.day_of_week = day;
        }
        if let Some(start) = request.start_time {
            rule.start_time = start;
        }
        if let Some(end) = request.end_time {
            rule.end_time = end;
        }
        if let Some(enabled) = request.is_available {
            rule.is_available = enabled;
        }

        validate_rule(rule.day_of_week, rule.start_time, rule.end_time)?;
        self.rules.update(rule).await
    }

    pub async fn delete_availability(&self, doctor_id: Uuid, rule_id: Uuid) -> Result<(), DoctorError> {
        self.owned_rule(doctor_id, rule_id).await?;
        self.rules
            .delete(rule_id)
            .await?
            .ok_or(DoctorError::AvailabilityNotFound)?;
        info!("Availability rule {} deleted", rule_id);
        Ok(())
    }

    pub async fn get_doctor_availability(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityRule>, DoctorError> {
        self.ensure_doctor(doctor_id).await?;
        self.rules.find_for_doctor(doctor_id).await
    }

    /// Merged open windows for the doctor on `date`, ascending by start.
    pub async fn open_windows(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<TimeWindow>, DoctorError> {
        let rules = self.rules.find_for_day(doctor_id, day_index(date)).await?;
        Ok(merge_windows(
            rules.iter().filter(|r| r.applies_to(date)).map(AvailabilityRule::window),
        ))
    }

    /// Whether `[start, end)` lies inside one enabled rule for the weekday of `start`.
    pub async fn is_open(
        &self,
        doctor_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<bool, DoctorError> {
        let rules = self.rules.find_for_day(doctor_id, day_index(start.date())).await?;
        Ok(is_open_in(&rules, start, end))
    }

    async fn ensure_doctor(&self, doctor_id: Uuid) -> Result<(), DoctorError> {
        self.doctors
            .get(doctor_id)
            .await?
            .map(|_| ())
            .ok_or(DoctorError::NotFound)
    }

    async fn owned_rule(&self, doctor_id: Uuid, rule_id: Uuid) -> Result<AvailabilityRule, DoctorError> {
        match self.rules.get(rule_id).await? {
            Some(rule) if rule.doctor_id == doctor_id => Ok(rule),
            _ => Err(DoctorError::AvailabilityNotFound),
        }
    }
}

fn validate_rule(day_of_week: u8, start: chrono::NaiveTime, end: chrono::NaiveTime) -> Result<(), DoctorError> {
    if day_of_week > 6 {
        return Err(DoctorError::ValidationError(
            "Day of week must be between 0 (Monday) and 6 (Sunday)".to_string(),
        ));
    }
    if start >= end {
        return Err(DoctorError::ValidationError("Start time must be before end time".to_string()));
    }
    Ok(())
}

/// A range is open when a single enabled rule for its weekday contains it.
/// Ranges ending on a later date than they start are never open.
pub fn is_open_in(rules: &[AvailabilityRule], start: NaiveDateTime, end: NaiveDateTime) -> bool {
    if start >= end || start.date() != end.date() {
        return false;
    }

    let date = start.date();
    rules
        .iter()
        .filter(|rule| rule.applies_to(date))
        .any(|rule| rule.window().contains(start.time(), end.time()))
}

/// Union of windows: overlapping or touching windows are coalesced and the
/// result is sorted by start.
pub fn merge_windows(windows: impl IntoIterator<Item = TimeWindow>) -> Vec<TimeWindow> {
    let mut sorted: Vec<TimeWindow> = windows.into_iter().filter(|w| w.start < w.end).collect();
    sorted.sort_by_key(|w| w.start);

    let mut merged: Vec<TimeWindow> = Vec::with_capacity(sorted.len());
    for window in sorted {
        match merged.last_mut() {
            Some(last) if window.start <= last.end => {
                if window.end > last.end {
                    last.end = window.end;
                }
            }
            _ => merged.push(window),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn rule(day: u8, start: NaiveTime, end: NaiveTime, enabled: bool) -> AvailabilityRule {
        AvailabilityRule {
            id: Uuid::new_v4(),
            doctor_id: Uuid::nil(),
            day_of_week: day,
            start_time: start,
            end_time: end,
            is_available: enabled,
        }
    }

    // 2024-01-01 is a Monday.
    fn monday_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_time(t(h, m))
    }

    #[test]
    fn range_inside_rule_is_open() {
        let rules = vec![rule(0, t(9, 0), t(17, 0), true)];
        assert!(is_open_in(&rules, monday_at(9, 0), monday_at(9, 30)));
        assert!(is_open_in(&rules, monday_at(16, 30), monday_at(17, 0)));
    }

    #[test]
    fn range_crossing_rule_boundary_is_closed() {
        let rules = vec![rule(0, t(9, 0), t(17, 0), true)];
        assert!(!is_open_in(&rules, monday_at(8, 45), monday_at(9, 15)));
        assert!(!is_open_in(&rules, monday_at(16, 45), monday_at(17, 15)));
    }

    #[test]
    fn disabled_rules_and_other_days_are_ignored() {
        let rules = vec![rule(0, t(9, 0), t(17, 0), false), rule(1, t(9, 0), t(17, 0), true)];
        assert!(!is_open_in(&rules, monday_at(10, 0), monday_at(10, 30)));
    }

    #[test]
    fn range_must_fit_a_single_rule() {
        let rules = vec![rule(0, t(9, 0), t(12, 0), true), rule(0, t(12, 0), t(17, 0), true)];
        assert!(!is_open_in(&rules, monday_at(11, 30), monday_at(12, 30)));
    }

    #[test]
    fn cross_midnight_range_is_closed() {
        let rules = vec![rule(0, t(0, 0), t(23, 59), true), rule(1, t(0, 0), t(23, 59), true)];
        let end = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_time(t(0, 30));
        assert!(!is_open_in(&rules, monday_at(23, 30), end));
    }

    #[test]
    fn overlapping_and_touching_windows_merge() {
        let merged = merge_windows(vec![
            TimeWindow { start: t(13, 0), end: t(17, 0) },
            TimeWindow { start: t(9, 0), end: t(12, 0) },
            TimeWindow { start: t(11, 0), end: t(13, 0) },
            TimeWindow { start: t(18, 0), end: t(19, 0) },
        ]);

        assert_eq!(
            merged,
            vec![
                TimeWindow { start: t(9, 0), end: t(17, 0) },
                TimeWindow { start: t(18, 0), end: t(19, 0) },
            ]
        );
    }
}
