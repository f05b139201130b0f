//! Pure statistics helpers shared by the predictors and the arrival planner.

use crate::error::StatsError;

/// z multiplier for a two-sided 95% interval.
pub const Z_95: f64 = 1.96;

const TAIL_FLOOR: f64 = 0.05;
const TAIL_CEILING: f64 = 0.95;
const TAIL_SLOPE: f64 = 0.15;

/// Arithmetic mean of the samples.
pub fn mean(samples: &[f64]) -> Result<f64, StatsError> {
    if samples.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    Ok(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population variance: mean of squared deviations from the mean.
pub fn variance(samples: &[f64]) -> Result<f64, StatsError> {
    let m = mean(samples)?;
    let sum_sq: f64 = samples.iter().map(|x| (x - m) * (x - m)).sum();
    Ok(sum_sq / samples.len() as f64)
}

pub fn std_dev(variance: f64) -> Result<f64, StatsError> {
    if variance < 0.0 || variance.is_nan() {
        return Err(StatsError::NegativeVariance(variance));
    }
    Ok(variance.sqrt())
}

/// 95% interval around `mean`. The lower bound is clamped at zero.
pub fn confidence_interval_95(mean: f64, std_dev: f64) -> (f64, f64) {
    let margin = Z_95 * std_dev;
    ((mean - margin).max(0.0), mean + margin)
}

/// Approximate P(X > threshold) for a roughly normal wait.
///
/// This is a linearised z-score heuristic, not the normal CDF: each unit of
/// z moves the probability by 0.15 away from 0.5, capped to [0.05, 0.95].
///
/// A zero spread is treated as certainty in whichever direction the mean
/// lies, which still lands on the caps.
pub fn tail_probability_above(threshold: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return if mean > threshold { TAIL_CEILING } else { TAIL_FLOOR };
    }
    let z = (threshold - mean) / std_dev;
    if z < 0.0 {
        (0.5 + z.abs() * TAIL_SLOPE).min(TAIL_CEILING)
    } else {
        (0.5 - z * TAIL_SLOPE).max(TAIL_FLOOR)
    }
}

/// Clamp a tail probability into [0.05, 0.95].
pub fn clamp_tail_risk(p: f64) -> f64 {
    p.clamp(TAIL_FLOOR, TAIL_CEILING)
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
