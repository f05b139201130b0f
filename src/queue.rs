//! Queue bookkeeping: visit stages, running wait estimates for patients
//! already in line, consultation history, and the history-based queue
//! forecast and slot outlook.
//!
//! The time-of-day and weekday factors read the hour and weekday of the
//! `DateTime` they are given, so pass slot times in the clinic's own zone
//! (`slot.with_timezone(&offset)`). A `DateTime<Utc>` is read as UTC.

use crate::error::StatsError;
use crate::models::Specialty;
use crate::statistics::{self, round_to};
use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Minutes assumed for a patient whose consultation length isn't known.
pub const DEFAULT_CONSULTATION_MINUTES: f64 = 10.0;

/// Phases of a patient's visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Registration,
    Triage,
    Consultation,
}

impl Stage {
    pub fn from_string(value: &str) -> Result<Self, String> {
        match value.to_lowercase().trim() {
            "registration" => Ok(Stage::Registration),
            "triage" => Ok(Stage::Triage),
            "consultation" => Ok(Stage::Consultation),
            _ => Err(format!(
                "Invalid stage: '{}'. Must be one of: registration, triage, consultation",
                value
            )),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Stage::Registration => "REGISTRATION",
            Stage::Triage => "TRIAGE",
            Stage::Consultation => "CONSULTATION",
        }
    }
}

/// One patient waiting for a doctor.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub patient_id: String,
    pub stage: Stage,
    pub estimated_duration: Option<f64>,
    pub estimated_wait: f64,
}

impl QueueEntry {
    pub fn new(patient_id: impl Into<String>) -> Self {
        QueueEntry {
            patient_id: patient_id.into(),
            stage: Stage::Registration,
            estimated_duration: None,
            estimated_wait: 0.0,
        }
    }
}

/// Set each entry's wait to the total expected duration of everyone ahead.
pub fn recalculate_wait_times(entries: &mut [QueueEntry]) {
    let mut cumulative = 0.0;
    for entry in entries.iter_mut() {
        entry.estimated_wait = cumulative;
        cumulative += entry
            .estimated_duration
            .unwrap_or(DEFAULT_CONSULTATION_MINUTES);
    }
}

/// Actual consultation lengths seen for one doctor.
#[derive(Debug, Clone, Default)]
pub struct ConsultationHistory {
    durations: Vec<f64>,
}

impl ConsultationHistory {
    pub fn new() -> Self {
        ConsultationHistory::default()
    }

    pub fn record(&mut self, minutes: f64) {
        if minutes.is_finite() && minutes >= 0.0 {
            self.durations.push(minutes);
        }
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn mean(&self) -> Result<f64, StatsError> {
        statistics::mean(&self.durations)
    }

    pub fn variance(&self) -> Result<f64, StatsError> {
        statistics::variance(&self.durations)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Availability {
    High,
    Medium,
    Low,
}

/// Rough booking advice for a slot from time-of-day and weekday load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotOutlook {
    pub availability: Availability,
    pub expected_wait_minutes: f64,
    pub recommendation: &'static str,
    pub time_factor: f64,
    pub day_factor: f64,
}

const MINUTES_PER_BOOKING: f64 = 15.0;

fn time_of_day_factor(hour: u32) -> f64 {
    match hour {
        8..=9 => 0.8,
        10..=11 => 1.2,
        12..=13 => 0.9,
        14..=15 => 1.1,
        _ => 0.85,
    }
}

fn day_of_week_factor(day: Weekday) -> f64 {
    match day {
        Weekday::Mon => 1.15,
        Weekday::Tue => 1.0,
        Weekday::Wed => 0.95,
        Weekday::Thu => 1.0,
        Weekday::Fri => 1.1,
        Weekday::Sat => 0.6,
        Weekday::Sun => 0.0,
    }
}

pub fn slot_outlook<Tz: TimeZone>(slot_time: DateTime<Tz>, current_bookings: u32) -> SlotOutlook {
    let time_factor = time_of_day_factor(slot_time.hour());
    let day_factor = day_of_week_factor(slot_time.weekday());
    let expected = f64::from(current_bookings) * MINUTES_PER_BOOKING * time_factor * day_factor;

    let (availability, recommendation) = if expected < 20.0 {
        (Availability::High, "Excellent choice! Low expected wait time.")
    } else if expected < 40.0 {
        (Availability::Medium, "Good availability. Moderate wait expected.")
    } else {
        (Availability::Low, "Consider an earlier time for shorter wait.")
    };

    SlotOutlook {
        availability,
        expected_wait_minutes: expected.round(),
        recommendation,
        time_factor,
        day_factor,
    }
}

const MIN_FORECAST_CONFIDENCE: f64 = 0.6;
const CONFIDENCE_LOSS_PER_PATIENT: f64 = 0.03;

/// Wait for the next patient in a doctor's queue, from consultation
/// lengths rather than the trained model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueForecast {
    pub predicted_wait_minutes: f64,
    pub min_wait_minutes: f64,
    pub max_wait_minutes: f64,
    pub confidence: f64,
    pub base_consultation_minutes: f64,
    pub time_factor: f64,
    pub day_factor: f64,
    pub queue_length: u32,
}

/// Forecast the wait behind `queue_length` patients.
///
/// The consultation length is the specialty's typical length, averaged
/// with the doctor's own historical mean when there is one. Confidence
/// drops by 0.03 per patient down to 0.6 and sets the width of the range.
pub fn forecast_queue_wait<Tz: TimeZone>(
    queue_length: u32,
    specialty: Specialty,
    slot_time: DateTime<Tz>,
    doctor_average: Option<f64>,
) -> QueueForecast {
    let mut base = specialty.consultation_minutes();
    if let Some(average) = doctor_average.filter(|m| m.is_finite() && *m > 0.0) {
        base = (base + average) / 2.0;
    }

    let time_factor = time_of_day_factor(slot_time.hour());
    let day_factor = day_of_week_factor(slot_time.weekday());
    let n = f64::from(queue_length);
    let predicted = n * base * time_factor * day_factor;

    let confidence = (1.0 - n * CONFIDENCE_LOSS_PER_PATIENT).max(MIN_FORECAST_CONFIDENCE);
    let margin = predicted * (1.0 - confidence);

    QueueForecast {
        predicted_wait_minutes: predicted.round(),
        min_wait_minutes: (predicted - margin).max(0.0).round(),
        max_wait_minutes: (predicted + margin).round(),
        confidence: round_to(confidence, 2),
        base_consultation_minutes: base,
        time_factor,
        day_factor,
        queue_length,
    }
}
