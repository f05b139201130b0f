//! Turns a wait estimate into arrival advice for a booked slot.

use crate::error::StatsError;
use crate::models::WaitEstimate;
use crate::statistics::{self, round_to};
use chrono::{DateTime, TimeDelta, Utc};

/// Minutes of slack added on top of the expected wait.
pub const DEFAULT_BUFFER_MINUTES: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalPlan {
    /// 95% interval, e.g. `"17.4 - 52.6 minutes"`.
    pub expected_range: String,
    pub recommended_arrival: DateTime<Utc>,
    pub recommended_arrival_minutes: f64,
    /// Expected wait for a patient arriving exactly at the slot time.
    pub on_time_wait: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ArrivalPlanner {
    buffer_minutes: f64,
}

impl Default for ArrivalPlanner {
    fn default() -> Self {
        ArrivalPlanner {
            buffer_minutes: DEFAULT_BUFFER_MINUTES,
        }
    }
}

impl ArrivalPlanner {
    /// Negative buffers are treated as zero.
    pub fn new(buffer_minutes: f64) -> Self {
        ArrivalPlanner {
            buffer_minutes: buffer_minutes.max(0.0),
        }
    }

    pub fn buffer_minutes(&self) -> f64 {
        self.buffer_minutes
    }

    pub fn plan(
        &self,
        estimate: &WaitEstimate,
        slot_time: DateTime<Utc>,
    ) -> Result<ArrivalPlan, StatsError> {
        let std_dev = statistics::std_dev(estimate.variance())?;
        let (lower, upper) = statistics::confidence_interval_95(estimate.mean(), std_dev);

        let recommended_arrival_minutes = estimate.mean() + self.buffer_minutes;
        let offset_ms = (recommended_arrival_minutes * 60_000.0).round();
        let recommended_arrival = Some(offset_ms)
            .filter(|ms| ms.is_finite() && ms.abs() < i64::MAX as f64)
            .and_then(|ms| TimeDelta::try_milliseconds(ms as i64))
            .and_then(|offset| slot_time.checked_sub_signed(offset))
            .ok_or(StatsError::ArrivalOutOfRange(recommended_arrival_minutes))?;

        Ok(ArrivalPlan {
            expected_range: format!("{:.1} - {:.1} minutes", lower, upper),
            recommended_arrival,
            recommended_arrival_minutes,
            on_time_wait: round_to((estimate.mean() - self.buffer_minutes).max(0.0), 1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn slot() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap()
    }

    #[test]
    fn plan_for_mean_35() {
        let estimate = WaitEstimate::new(35.0, 81.0, 0.58).unwrap();
        let plan = ArrivalPlanner::default().plan(&estimate, slot()).unwrap();

        assert_eq!(plan.recommended_arrival_minutes, 40.0);
        assert_eq!(plan.recommended_arrival, slot() - Duration::minutes(40));
        assert_eq!(plan.on_time_wait, 30.0);
        assert_eq!(plan.expected_range, "17.4 - 52.6 minutes");
    }

    #[test]
    fn zero_mean_offsets_by_buffer_only() {
        let estimate = WaitEstimate::new(0.0, 0.0, 0.05).unwrap();
        let plan = ArrivalPlanner::default().plan(&estimate, slot()).unwrap();

        assert_eq!(plan.on_time_wait, 0.0);
        assert_eq!(plan.recommended_arrival_minutes, 5.0);
        assert_eq!(plan.recommended_arrival, slot() - Duration::minutes(5));
        assert_eq!(plan.expected_range, "0.0 - 0.0 minutes");
    }

    #[test]
    fn short_waits_are_absorbed_by_the_buffer() {
        let estimate = WaitEstimate::new(3.0, 4.0, 0.05).unwrap();
        let plan = ArrivalPlanner::new(5.0).plan(&estimate, slot()).unwrap();
        assert_eq!(plan.on_time_wait, 0.0);
        assert_eq!(plan.expected_range, "0.0 - 6.9 minutes");
    }

    #[test]
    fn fractional_minutes_are_kept() {
        let estimate = WaitEstimate::new(12.5, 9.0, 0.2).unwrap();
        let plan = ArrivalPlanner::new(2.25).plan(&estimate, slot()).unwrap();
        assert_eq!(plan.recommended_arrival_minutes, 14.75);
        assert_eq!(plan.recommended_arrival, slot() - Duration::seconds(14 * 60 + 45));
        assert_eq!(plan.on_time_wait, 10.3);
    }

    #[test]
    fn offsets_beyond_the_calendar_are_an_error() {
        let estimate = WaitEstimate::from_trusted(1e12, 4.0, 0.5);
        assert_eq!(
            ArrivalPlanner::default().plan(&estimate, slot()),
            Err(StatsError::ArrivalOutOfRange(1e12 + 5.0))
        );
    }
}
