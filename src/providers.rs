//! Data the prediction flow reads from the rest of the hospital system.
//!
//! The traits here are the seams to persistence. `InMemoryClinic` implements
//! all of them over per-doctor calendars and backs the demo binary and tests.

use crate::alerts::RoleDirectory;
use crate::error::ProviderError;
use crate::models::{
    DoctorDetails, ExternalFactors, PatientDetails, Role, StageOccupancy, TimeSlot,
};
use crate::queue::{self, ConsultationHistory, QueueEntry, QueueForecast, Stage};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Queue, doctor, patient and hospital lookups.
pub trait ClinicDataProvider: Send + Sync {
    fn get_available_slots(
        &self,
        doctor_id: &str,
    ) -> impl Future<Output = Result<Vec<DateTime<Utc>>, ProviderError>> + Send;

    fn get_queue_length(&self, doctor_id: &str) -> impl Future<Output = Result<u32, ProviderError>> + Send;

    fn get_doctor_details(
        &self,
        doctor_id: &str,
    ) -> impl Future<Output = Result<DoctorDetails, ProviderError>> + Send;

    /// `Ok(None)` when nothing is recorded for the day.
    fn get_external_factors(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<ExternalFactors>, ProviderError>> + Send;

    fn get_patient_details(
        &self,
        _patient_id: &str,
    ) -> impl Future<Output = Result<Option<PatientDetails>, ProviderError>> + Send {
        async { Ok(None) }
    }

    /// `Ok(None)` when the provider doesn't track stages.
    fn get_stage_occupancy(
        &self,
        _doctor_id: &str,
        _stage: Stage,
    ) -> impl Future<Output = Result<Option<StageOccupancy>, ProviderError>> + Send {
        async { Ok(None) }
    }
}

/// Writes a confirmed booking.
pub trait BookingLedger: Send + Sync {
    fn book_slot(
        &self,
        doctor_id: &str,
        patient_id: &str,
        slot_time: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    fn add_to_queue(
        &self,
        doctor_id: &str,
        patient_id: &str,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

impl<T: ClinicDataProvider> ClinicDataProvider for Arc<T> {
    async fn get_available_slots(&self, doctor_id: &str) -> Result<Vec<DateTime<Utc>>, ProviderError> {
        (**self).get_available_slots(doctor_id).await
    }

    async fn get_queue_length(&self, doctor_id: &str) -> Result<u32, ProviderError> {
        (**self).get_queue_length(doctor_id).await
    }

    async fn get_doctor_details(&self, doctor_id: &str) -> Result<DoctorDetails, ProviderError> {
        (**self).get_doctor_details(doctor_id).await
    }

    async fn get_external_factors(
        &self,
        date: NaiveDate,
    ) -> Result<Option<ExternalFactors>, ProviderError> {
        (**self).get_external_factors(date).await
    }

    async fn get_patient_details(
        &self,
        patient_id: &str,
    ) -> Result<Option<PatientDetails>, ProviderError> {
        (**self).get_patient_details(patient_id).await
    }

    async fn get_stage_occupancy(
        &self,
        doctor_id: &str,
        stage: Stage,
    ) -> Result<Option<StageOccupancy>, ProviderError> {
        (**self).get_stage_occupancy(doctor_id, stage).await
    }
}

impl<T: BookingLedger> BookingLedger for Arc<T> {
    async fn book_slot(
        &self,
        doctor_id: &str,
        patient_id: &str,
        slot_time: DateTime<Utc>,
    ) -> Result<(), ProviderError> {
        (**self).book_slot(doctor_id, patient_id, slot_time).await
    }

    async fn add_to_queue(&self, doctor_id: &str, patient_id: &str) -> Result<(), ProviderError> {
        (**self).add_to_queue(doctor_id, patient_id).await
    }
}

/// One doctor's slots, queue and consultation history.
#[derive(Debug, Clone)]
pub struct DoctorCalendar {
    pub details: DoctorDetails,
    pub default_slot_duration: i64,
    time_slots: HashMap<String, TimeSlot>,
    queue: Vec<QueueEntry>,
    history: ConsultationHistory,
}

impl DoctorCalendar {
    pub fn new(details: DoctorDetails, default_slot_duration: i64) -> Result<Self, String> {
        if details.doctor_id.is_empty() {
            return Err("Doctor ID cannot be empty".to_string());
        }
        if details.name.is_empty() {
            return Err("Doctor name cannot be empty".to_string());
        }
        if default_slot_duration <= 0 {
            return Err("Slot duration must be positive".to_string());
        }

        Ok(DoctorCalendar {
            details,
            default_slot_duration,
            time_slots: HashMap::new(),
            queue: Vec::new(),
            history: ConsultationHistory::new(),
        })
    }

    /// Get all available (unbooked) time slots sorted by start time.
    pub fn available_slots(&self) -> Vec<TimeSlot> {
        let mut slots: Vec<TimeSlot> = self
            .time_slots
            .values()
            .filter(|s| s.is_available)
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.start_time);
        slots
    }

    pub fn add_time_slot(&mut self, slot: TimeSlot) -> Result<(), String> {
        for existing in self.time_slots.values() {
            if slot.overlaps_with(existing) {
                return Err(format!(
                    "Time slot overlaps with existing slot: {} - {}",
                    existing.start_time.format("%Y-%m-%d %H:%M"),
                    existing.end_time.format("%Y-%m-%d %H:%M")
                ));
            }
        }
        self.time_slots.insert(slot.slot_id.clone(), slot);
        Ok(())
    }

    /// Generate slots for one day, skipping any that touch the break.
    pub fn generate_daily_slots(
        &mut self,
        date: NaiveDate,
        start_hour: u32,
        end_hour: u32,
        break_window: Option<(NaiveTime, NaiveTime)>,
    ) -> Vec<TimeSlot> {
        let duration = Duration::minutes(self.default_slot_duration);
        let mut slots = Vec::new();

        let (Some(start), Some(end)) = (
            date.and_hms_opt(start_hour, 0, 0),
            date.and_hms_opt(end_hour, 0, 0),
        ) else {
            return slots;
        };
        let mut current = start.and_utc();
        let end = end.and_utc();

        while current + duration <= end {
            let slot_end = current + duration;

            let in_break = break_window.is_some_and(|(break_start, break_end)| {
                current.time() < break_end && slot_end.time() > break_start
            });

            if !in_break {
                if let Ok(slot) = TimeSlot::new(current, slot_end) {
                    if self.add_time_slot(slot.clone()).is_ok() {
                        slots.push(slot);
                    }
                }
            }

            current = slot_end;
        }

        slots
    }

    /// Mark the slot starting at `slot_time` as booked.
    pub fn book_slot(&mut self, slot_time: DateTime<Utc>) -> Result<TimeSlot, String> {
        let stored_slot = self
            .time_slots
            .values_mut()
            .find(|s| s.start_time == slot_time)
            .ok_or("Time slot not found in calendar")?;

        if !stored_slot.is_available {
            return Err("Time slot is not available".to_string());
        }

        stored_slot.is_available = false;
        Ok(stored_slot.clone())
    }

    pub fn queue(&self) -> &[QueueEntry] {
        &self.queue
    }

    pub fn enqueue(&mut self, patient_id: &str) {
        self.queue.push(QueueEntry::new(patient_id));
        queue::recalculate_wait_times(&mut self.queue);
    }

    pub fn advance_stage(&mut self, patient_id: &str, stage: Stage) -> bool {
        match self.queue.iter_mut().find(|e| e.patient_id == patient_id) {
            Some(entry) => {
                entry.stage = stage;
                true
            }
            None => false,
        }
    }

    /// Record a finished consultation: the patient leaves the queue and the
    /// actual duration joins the history.
    pub fn complete_consultation(&mut self, patient_id: &str, actual_minutes: f64) -> bool {
        let before = self.queue.len();
        self.queue.retain(|e| e.patient_id != patient_id);
        if self.queue.len() == before {
            return false;
        }
        self.history.record(actual_minutes);
        queue::recalculate_wait_times(&mut self.queue);
        true
    }

    pub fn history(&self) -> &ConsultationHistory {
        &self.history
    }

    /// Forecast the wait behind the current queue from this doctor's
    /// specialty and recorded consultation lengths.
    pub fn queue_forecast(&self, slot_time: DateTime<Utc>) -> QueueForecast {
        queue::forecast_queue_wait(
            self.queue.len() as u32,
            self.details.specialty,
            slot_time,
            self.history.mean().ok(),
        )
    }

    fn patients_at(&self, stage: Stage) -> u32 {
        self.queue.iter().filter(|e| e.stage == stage).count() as u32
    }
}

impl std::fmt::Display for DoctorCalendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DoctorCalendar({}, slots={}, queue={})",
            self.details.name,
            self.time_slots.len(),
            self.queue.len()
        )
    }
}

#[derive(Debug, Default)]
struct ClinicState {
    doctors: HashMap<String, DoctorCalendar>,
    patients: HashMap<String, PatientDetails>,
    users: HashMap<Role, Vec<String>>,
    external_factors: HashMap<NaiveDate, ExternalFactors>,
    staff_per_stage: HashMap<Stage, u32>,
}

/// Thread-safe in-memory clinic.
#[derive(Debug, Default)]
pub struct InMemoryClinic {
    state: RwLock<ClinicState>,
}

impl InMemoryClinic {
    pub fn new() -> Self {
        InMemoryClinic::default()
    }

    pub fn add_doctor(&self, calendar: DoctorCalendar) {
        self.state
            .write()
            .doctors
            .insert(calendar.details.doctor_id.clone(), calendar);
    }

    pub fn add_patient(&self, patient: PatientDetails) {
        self.state
            .write()
            .patients
            .insert(patient.patient_id.clone(), patient);
    }

    pub fn add_user(&self, role: Role, user_id: impl Into<String>) {
        self.state
            .write()
            .users
            .entry(role)
            .or_default()
            .push(user_id.into());
    }

    pub fn set_external_factors(&self, date: NaiveDate, factors: ExternalFactors) {
        self.state.write().external_factors.insert(date, factors);
    }

    pub fn set_stage_staff(&self, stage: Stage, staff: u32) {
        self.state.write().staff_per_stage.insert(stage, staff);
    }

    pub fn doctor(&self, doctor_id: &str) -> Option<DoctorCalendar> {
        self.state.read().doctors.get(doctor_id).cloned()
    }

    /// Run `f` against a doctor's calendar.
    pub fn update_doctor<R>(
        &self,
        doctor_id: &str,
        f: impl FnOnce(&mut DoctorCalendar) -> R,
    ) -> Result<R, ProviderError> {
        let mut state = self.state.write();
        let calendar = state
            .doctors
            .get_mut(doctor_id)
            .ok_or_else(|| ProviderError::NotFound(format!("doctor {}", doctor_id)))?;
        Ok(f(calendar))
    }

    pub fn queue_forecast(
        &self,
        doctor_id: &str,
        slot_time: DateTime<Utc>,
    ) -> Result<QueueForecast, ProviderError> {
        self.read_doctor(doctor_id, |cal| cal.queue_forecast(slot_time))
    }

    fn read_doctor<R>(
        &self,
        doctor_id: &str,
        f: impl FnOnce(&DoctorCalendar) -> R,
    ) -> Result<R, ProviderError> {
        let state = self.state.read();
        state
            .doctors
            .get(doctor_id)
            .map(f)
            .ok_or_else(|| ProviderError::NotFound(format!("doctor {}", doctor_id)))
    }
}

impl ClinicDataProvider for InMemoryClinic {
    async fn get_available_slots(&self, doctor_id: &str) -> Result<Vec<DateTime<Utc>>, ProviderError> {
        self.read_doctor(doctor_id, |cal| {
            cal.available_slots().into_iter().map(|s| s.start_time).collect()
        })
    }

    async fn get_queue_length(&self, doctor_id: &str) -> Result<u32, ProviderError> {
        self.read_doctor(doctor_id, |cal| cal.queue().len() as u32)
    }

    async fn get_doctor_details(&self, doctor_id: &str) -> Result<DoctorDetails, ProviderError> {
        self.read_doctor(doctor_id, |cal| cal.details.clone())
    }

    async fn get_external_factors(
        &self,
        date: NaiveDate,
    ) -> Result<Option<ExternalFactors>, ProviderError> {
        Ok(self.state.read().external_factors.get(&date).copied())
    }

    async fn get_patient_details(
        &self,
        patient_id: &str,
    ) -> Result<Option<PatientDetails>, ProviderError> {
        Ok(self.state.read().patients.get(patient_id).cloned())
    }

    async fn get_stage_occupancy(
        &self,
        doctor_id: &str,
        stage: Stage,
    ) -> Result<Option<StageOccupancy>, ProviderError> {
        let staff = self.state.read().staff_per_stage.get(&stage).copied();
        let Some(staff) = staff else {
            return Ok(None);
        };
        let patients = self.read_doctor(doctor_id, |cal| cal.patients_at(stage))?;
        Ok(Some(StageOccupancy { patients, staff }))
    }
}

impl BookingLedger for InMemoryClinic {
    async fn book_slot(
        &self,
        doctor_id: &str,
        _patient_id: &str,
        slot_time: DateTime<Utc>,
    ) -> Result<(), ProviderError> {
        self.update_doctor(doctor_id, |cal| cal.book_slot(slot_time))?
            .map(|_| ())
            .map_err(ProviderError::Unavailable)
    }

    async fn add_to_queue(&self, doctor_id: &str, patient_id: &str) -> Result<(), ProviderError> {
        self.update_doctor(doctor_id, |cal| cal.enqueue(patient_id))
    }
}

impl RoleDirectory for InMemoryClinic {
    async fn list_users_by_role(&self, role: Role) -> Result<Vec<String>, ProviderError> {
        Ok(self.state.read().users.get(&role).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Specialty;
    use chrono::TimeZone;

    fn calendar() -> DoctorCalendar {
        DoctorCalendar::new(
            DoctorDetails {
                doctor_id: "doc-1".to_string(),
                name: "Grey".to_string(),
                experience_years: 8,
                specialty: Specialty::Pediatrics,
            },
            30,
        )
        .unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn lunch() -> Option<(NaiveTime, NaiveTime)> {
        Some((
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn calendar_validation() {
        let mut details = calendar().details;
        details.name.clear();
        assert!(DoctorCalendar::new(details, 30).is_err());
        assert!(DoctorCalendar::new(calendar().details, 0).is_err());
    }

    #[test]
    fn daily_slots_skip_lunch() {
        let mut cal = calendar();
        let slots = cal.generate_daily_slots(day(), 9, 17, lunch());
        assert_eq!(slots.len(), 14);
        assert!(slots.iter().all(|s| s.start_time.format("%H").to_string() != "12"));

        // regenerating the same day overlaps everything
        assert!(cal.generate_daily_slots(day(), 9, 17, lunch()).is_empty());
        assert!(cal.generate_daily_slots(day(), 9, 25, None).is_empty());
    }

    #[test]
    fn booking_a_slot_removes_it_from_availability() {
        let mut cal = calendar();
        cal.generate_daily_slots(day(), 9, 11, None);
        let slot = Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap();

        assert!(cal.book_slot(slot).is_ok());
        assert_eq!(cal.available_slots().len(), 3);
        assert_eq!(cal.book_slot(slot).unwrap_err(), "Time slot is not available");
        assert!(cal.book_slot(slot + Duration::minutes(5)).is_err());
    }

    #[test]
    fn queue_tracks_waits_and_history() {
        let mut cal = calendar();
        cal.enqueue("p1");
        cal.enqueue("p2");
        cal.enqueue("p3");
        assert_eq!(cal.queue()[2].estimated_wait, 20.0);

        assert!(cal.advance_stage("p1", Stage::Consultation));
        assert_eq!(cal.patients_at(Stage::Consultation), 1);

        assert!(cal.complete_consultation("p1", 14.0));
        assert!(!cal.complete_consultation("p1", 14.0));
        assert_eq!(cal.queue().len(), 2);
        assert_eq!(cal.queue()[1].estimated_wait, 10.0);
        assert_eq!(cal.history().mean().unwrap(), 14.0);
    }

    #[test]
    fn forecast_uses_recorded_consultations() {
        let mut cal = calendar();
        // Tuesday 09:00
        let slot = Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap();
        cal.enqueue("p1");
        cal.enqueue("p2");
        assert_eq!(cal.queue_forecast(slot).base_consultation_minutes, 18.0);

        cal.enqueue("p3");
        assert!(cal.complete_consultation("p1", 30.0));
        let forecast = cal.queue_forecast(slot);
        assert_eq!(forecast.queue_length, 2);
        assert_eq!(forecast.base_consultation_minutes, 24.0);
        assert_eq!(forecast.predicted_wait_minutes, 38.0);
    }

    #[tokio::test]
    async fn clinic_lookups() {
        let clinic = InMemoryClinic::new();
        let mut cal = calendar();
        cal.generate_daily_slots(day(), 9, 10, None);
        clinic.add_doctor(cal);
        clinic.add_user(Role::Admin, "admin-1");

        assert_eq!(clinic.get_available_slots("doc-1").await.unwrap().len(), 2);
        assert!(matches!(
            clinic.get_doctor_details("nobody").await,
            Err(ProviderError::NotFound(_))
        ));
        assert_eq!(clinic.get_external_factors(day()).await.unwrap(), None);
        assert_eq!(clinic.get_stage_occupancy("doc-1", Stage::Triage).await.unwrap(), None);

        clinic.set_stage_staff(Stage::Triage, 3);
        clinic.update_doctor("doc-1", |cal| {
            cal.enqueue("p1");
            cal.advance_stage("p1", Stage::Triage);
        })
        .unwrap();
        assert_eq!(
            clinic.get_stage_occupancy("doc-1", Stage::Triage).await.unwrap(),
            Some(StageOccupancy { patients: 1, staff: 3 })
        );
        assert_eq!(clinic.get_queue_length("doc-1").await.unwrap(), 1);
        assert_eq!(
            clinic.list_users_by_role(Role::Admin).await.unwrap(),
            vec!["admin-1".to_string()]
        );
        assert!(clinic.list_users_by_role(Role::Receptionist).await.unwrap().is_empty());

        let slot = Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap();
        assert_eq!(clinic.queue_forecast("doc-1", slot).unwrap().queue_length, 1);
        assert!(matches!(
            clinic.queue_forecast("nobody", slot),
            Err(ProviderError::NotFound(_))
        ));
    }
}
