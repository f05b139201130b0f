//! Queue-length heuristic used whenever the trained model can't answer.

use crate::models::WaitEstimate;
use crate::statistics::{self, round_to};

/// Check-in time every patient pays, in minutes.
pub const BASE_WAIT_MINUTES: f64 = 5.0;
/// Average consultation length per patient ahead in the queue.
pub const MINUTES_PER_PATIENT: f64 = 10.0;
/// The SLA the tail risk is measured against.
pub const TAIL_THRESHOLD_MINUTES: f64 = 30.0;

const BASE_STD_DEV: f64 = 3.0;
const STD_DEV_PER_PATIENT: f64 = 2.0;
const EMPTY_QUEUE_VARIANCE: f64 = 4.0;
const EMPTY_QUEUE_TAIL_RISK: f64 = 0.05;

/// Deterministic wait estimate from queue length alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPredictor;

impl FallbackPredictor {
    pub fn new() -> Self {
        FallbackPredictor
    }

    /// Never fails: every queue length maps to a valid, rounded estimate.
    pub fn predict(&self, queue_length: u32) -> WaitEstimate {
        let (mean, variance, tail_risk) = if queue_length == 0 {
            (BASE_WAIT_MINUTES, EMPTY_QUEUE_VARIANCE, EMPTY_QUEUE_TAIL_RISK)
        } else {
            let n = f64::from(queue_length);
            let mean = BASE_WAIT_MINUTES + n * MINUTES_PER_PATIENT;
            let std_dev = BASE_STD_DEV + n * STD_DEV_PER_PATIENT;
            let raw_tail = statistics::tail_probability_above(TAIL_THRESHOLD_MINUTES, mean, std_dev);
            (
                mean.round(),
                (std_dev * std_dev).round(),
                statistics::clamp_tail_risk(round_to(raw_tail, 2)),
            )
        };

        WaitEstimate::from_trusted(mean, variance, tail_risk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue_is_check_in_only() {
        let e = FallbackPredictor::new().predict(0);
        assert_eq!((e.mean(), e.variance(), e.tail_risk()), (5.0, 4.0, 0.05));
    }

    #[test]
    fn three_patients_ahead() {
        let e = FallbackPredictor::new().predict(3);
        assert_eq!(e.mean(), 35.0);
        assert_eq!(e.variance(), 81.0);
        assert_eq!(e.tail_risk(), 0.58);
    }

    #[test]
    fn short_queue_sits_below_the_sla() {
        let p = FallbackPredictor::new();
        assert_eq!(p.predict(1).tail_risk(), 0.05);
        let two = p.predict(2);
        assert_eq!((two.mean(), two.variance(), two.tail_risk()), (25.0, 49.0, 0.39));
    }

    #[test]
    fn long_queue_is_capped() {
        let e = FallbackPredictor::new().predict(10);
        assert_eq!(e.mean(), 105.0);
        assert_eq!(e.variance(), 529.0);
        assert_eq!(e.tail_risk(), 0.95);
    }

    #[test]
    fn invariants_hold_across_queue_lengths() {
        let p = FallbackPredictor::new();
        for n in (0..200).chain([1_000, 100_000, u32::MAX]) {
            let e = p.predict(n);
            assert!(e.mean() >= 0.0);
            assert!(e.variance() >= 0.0);
            assert!((0.05..=0.95).contains(&e.tail_risk()), "n={} tail={}", n, e.tail_risk());
        }
    }
}
