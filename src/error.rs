//! Error types for the wait-time estimation core.
//!
//! Only contract violations (`StatsError`) and lookups the flow cannot do
//! without (`EngineError`) ever reach a caller. Predictor, external-factor and
//! notification failures are absorbed where they happen.

use thiserror::Error;

/// Errors from the statistics helpers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("cannot compute statistics over an empty sample set")]
    EmptyInput,
    #[error("variance must be non-negative, got {0}")]
    NegativeVariance(f64),
    #[error("arrival offset of {0} minutes is out of range")]
    ArrivalOutOfRange(f64),
}

/// Why the external wait-time model could not be used.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("predictor unavailable: {0}")]
    Unavailable(String),
    #[error("predictor exited with status {0}")]
    NonZeroExit(i32),
    #[error("malformed predictor output: {0}")]
    Malformed(String),
    #[error("predictor timed out after {0} ms")]
    TimedOut(u64),
}

/// Errors returned by the queue/doctor/patient data providers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("data provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Errors surfaced by the slot prediction and booking flow.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("doctor {0} not found")]
    DoctorNotFound(String),
    #[error("could not load available slots: {0}")]
    Slots(#[source] ProviderError),
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error("booking failed: {0}")]
    Booking(#[source] ProviderError),
}
