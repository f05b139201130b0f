//! Data models for the wait-time estimation core.
//!
//! This module defines the values that flow through a prediction:
//! - PredictionFeatures: the feature vector handed to the wait-time model
//! - WaitEstimate: mean, variance and tail risk of the predicted wait
//! - SlotPredictionResult: what the booking flow serialises to callers
//! - AlertEvent: notifications derived from an estimate
//! - TimeSlot: bookable windows in a doctor's calendar

use crate::statistics;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest wait a model may report: one day.
pub const MAX_WAIT_MINUTES: f64 = 24.0 * 60.0;

/// Roles alerts can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Doctor,
    Admin,
    Receptionist,
    Patient,
}

impl Role {
    /// Convert a string to a Role value.
    pub fn from_string(value: &str) -> Result<Self, String> {
        match value.to_lowercase().trim() {
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            "receptionist" => Ok(Role::Receptionist),
            "patient" => Ok(Role::Patient),
            _ => Err(format!(
                "Invalid role: '{}'. Must be one of: doctor, admin, receptionist, patient",
                value
            )),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Role::Doctor => "doctor",
            Role::Admin => "admin",
            Role::Receptionist => "receptionist",
            Role::Patient => "patient",
        }
    }
}

/// Alert severity. Higher variants are more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low = 1,
    Medium = 2,
    High = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighWait,
    Anomaly,
    Info,
}

/// Feature vector for one prediction request.
///
/// Field order matches the positional order the external model expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionFeatures {
    pub total_queue_length: u32,
    pub patients_at_current_stage: u32,
    pub staff_at_current_stage: u32,
    pub hospital_occupancy: f64,
    pub patient_age: u32,
    pub traffic_level: f64,
    pub doctor_experience_years: u32,
    pub slot_time: DateTime<Utc>,
}

impl PredictionFeatures {
    /// Slot time as an ISO 8601 UTC string with millisecond precision.
    pub fn slot_time_iso(&self) -> String {
        self.slot_time.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Features as positional command-line arguments.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            self.total_queue_length.to_string(),
            self.patients_at_current_stage.to_string(),
            self.staff_at_current_stage.to_string(),
            self.hospital_occupancy.to_string(),
            self.patient_age.to_string(),
            self.traffic_level.to_string(),
            self.doctor_experience_years.to_string(),
            self.slot_time_iso(),
        ]
    }
}

/// Predicted wait in minutes, with its spread and the probability of
/// exceeding the 30 minute SLA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaitEstimate {
    mean: f64,
    variance: f64,
    tail_risk: f64,
}

impl WaitEstimate {
    /// Create an estimate with validation.
    ///
    /// `tail_risk` must be a probability; it is then clamped into
    /// [0.05, 0.95] so no estimate ever claims certainty.
    pub fn new(mean: f64, variance: f64, tail_risk: f64) -> Result<Self, String> {
        if !mean.is_finite() || mean < 0.0 {
            return Err(format!("mean must be a non-negative number, got {}", mean));
        }
        if mean > MAX_WAIT_MINUTES {
            return Err(format!(
                "mean must be at most {} minutes, got {}",
                MAX_WAIT_MINUTES, mean
            ));
        }
        if !variance.is_finite() || variance < 0.0 {
            return Err(format!(
                "variance must be a non-negative number, got {}",
                variance
            ));
        }
        if !(0.0..=1.0).contains(&tail_risk) {
            return Err(format!("tail_risk must be within [0, 1], got {}", tail_risk));
        }

        Ok(WaitEstimate {
            mean,
            variance,
            tail_risk: statistics::clamp_tail_risk(tail_risk),
        })
    }

    /// Build an estimate from values the caller computed itself, clamping
    /// instead of rejecting.
    pub(crate) fn from_trusted(mean: f64, variance: f64, tail_risk: f64) -> Self {
        WaitEstimate {
            mean: mean.max(0.0),
            variance: variance.max(0.0),
            tail_risk: statistics::clamp_tail_risk(tail_risk),
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn tail_risk(&self) -> f64 {
        self.tail_risk
    }

    /// Coefficient of variation as a percentage: `variance / mean * 100`.
    pub fn risk_percent(&self) -> f64 {
        if self.mean > 0.0 {
            (self.variance / self.mean) * 100.0
        } else {
            0.0
        }
    }
}

/// Outcome of checking a slot and predicting its wait.
///
/// When `available` is false every other field is null.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotPredictionResult {
    pub available: bool,
    pub prediction: Option<f64>,
    pub variance: Option<f64>,
    pub tail_risk: Option<f64>,
    pub risk: Option<f64>,
    pub expected_range: Option<String>,
    pub recommended_arrival: Option<DateTime<Utc>>,
    pub recommended_arrival_minutes: Option<f64>,
    pub on_time_wait: Option<f64>,
}

impl SlotPredictionResult {
    pub fn unavailable() -> Self {
        SlotPredictionResult {
            available: false,
            prediction: None,
            variance: None,
            tail_risk: None,
            risk: None,
            expected_range: None,
            recommended_arrival: None,
            recommended_arrival_minutes: None,
            on_time_wait: None,
        }
    }
}

/// A notification derived from an estimate, addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub alert_id: String,
    pub kind: AlertKind,
    pub target_role: Role,
    pub recipient_id: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl AlertEvent {
    pub fn new(
        kind: AlertKind,
        target_role: Role,
        recipient_id: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        AlertEvent {
            alert_id: Uuid::new_v4().to_string(),
            kind,
            target_role,
            recipient_id: recipient_id.into(),
            severity,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Hospital-wide conditions for a given day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExternalFactors {
    pub hospital_occupancy: f64,
    pub traffic_level: f64,
}

/// Medical specialty, which sets the typical consultation length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Specialty {
    #[default]
    General,
    Cardiology,
    Orthopedics,
    Pediatrics,
    Dermatology,
}

impl Specialty {
    pub fn from_string(value: &str) -> Result<Self, String> {
        match value.to_lowercase().trim() {
            "general" => Ok(Specialty::General),
            "cardiology" => Ok(Specialty::Cardiology),
            "orthopedics" => Ok(Specialty::Orthopedics),
            "pediatrics" => Ok(Specialty::Pediatrics),
            "dermatology" => Ok(Specialty::Dermatology),
            _ => Err(format!("Invalid specialty: '{}'", value)),
        }
    }

    /// Typical consultation length in minutes.
    pub fn consultation_minutes(&self) -> f64 {
        match self {
            Specialty::General => 15.0,
            Specialty::Cardiology => 25.0,
            Specialty::Orthopedics => 20.0,
            Specialty::Pediatrics => 18.0,
            Specialty::Dermatology => 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorDetails {
    pub doctor_id: String,
    pub name: String,
    pub experience_years: u32,
    #[serde(default)]
    pub specialty: Specialty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientDetails {
    pub patient_id: String,
    pub age: u32,
}

/// Patients waiting at, and staff serving, one stage of the visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOccupancy {
    pub patients: u32,
    pub staff: u32,
}

/// Represents a bookable time slot in a doctor's calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_available: bool,
    pub slot_id: String,
}

impl TimeSlot {
    /// Create a new time slot with validation.
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<Self, String> {
        if end_time <= start_time {
            return Err("End time must be after start time".to_string());
        }

        Ok(TimeSlot {
            start_time,
            end_time,
            is_available: true,
            slot_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Check if this time slot overlaps with another.
    pub fn overlaps_with(&self, other: &TimeSlot) -> bool {
        self.start_time < other.end_time && self.end_time > other.start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn estimate_rejects_out_of_range_values() {
        assert!(WaitEstimate::new(-1.0, 4.0, 0.5).is_err());
        assert!(WaitEstimate::new(10.0, -4.0, 0.5).is_err());
        assert!(WaitEstimate::new(10.0, 4.0, 1.5).is_err());
        assert!(WaitEstimate::new(f64::NAN, 4.0, 0.5).is_err());
        assert!(WaitEstimate::new(1e12, 4.0, 0.5).is_err());
        assert!(WaitEstimate::new(MAX_WAIT_MINUTES, 4.0, 0.5).is_ok());
    }

    #[test]
    fn estimate_clamps_tail_risk() {
        assert_eq!(WaitEstimate::new(10.0, 4.0, 0.0).unwrap().tail_risk(), 0.05);
        assert_eq!(WaitEstimate::new(90.0, 4.0, 1.0).unwrap().tail_risk(), 0.95);
        assert_eq!(WaitEstimate::new(30.0, 4.0, 0.4).unwrap().tail_risk(), 0.4);
    }

    #[test]
    fn risk_percent_is_zero_for_zero_mean() {
        assert_eq!(WaitEstimate::new(0.0, 4.0, 0.1).unwrap().risk_percent(), 0.0);
        let e = WaitEstimate::new(35.0, 81.0, 0.58).unwrap();
        assert!((e.risk_percent() - 231.42857142857142).abs() < 1e-9);
    }

    #[test]
    fn features_serialise_positionally() {
        let features = PredictionFeatures {
            total_queue_length: 3,
            patients_at_current_stage: 1,
            staff_at_current_stage: 2,
            hospital_occupancy: 0.5,
            patient_age: 40,
            traffic_level: 0.25,
            doctor_experience_years: 12,
            slot_time: Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap(),
        };
        assert_eq!(
            features.to_args(),
            vec!["3", "1", "2", "0.5", "40", "0.25", "12", "2026-03-02T09:30:00.000Z"]
        );
    }

    #[test]
    fn unavailable_result_serialises_nulls() {
        let json = serde_json::to_value(SlotPredictionResult::unavailable()).unwrap();
        assert_eq!(json["available"], false);
        for key in ["prediction", "variance", "tailRisk", "risk", "expectedRange"] {
            assert!(json[key].is_null(), "{} should be null", key);
        }
    }

    #[test]
    fn specialty_defaults_to_general() {
        let doctor: DoctorDetails =
            serde_json::from_str(r#"{"doctor_id": "d1", "name": "Shepherd", "experience_years": 4}"#)
                .unwrap();
        assert_eq!(doctor.specialty, Specialty::General);
        assert_eq!(Specialty::from_string("Cardiology").unwrap().consultation_minutes(), 25.0);
        assert!(Specialty::from_string("astrology").is_err());
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::from_string(" Admin ").unwrap(), Role::Admin);
        assert!(Role::from_string("janitor").is_err());
    }
}
