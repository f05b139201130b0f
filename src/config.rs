//! Engine configuration: a JSON file with every field optional, then
//! environment overrides.

use crate::alerts::AlertThresholds;
use crate::error::ConfigError;
use crate::gateway::{ProcessModel, DEFAULT_MODEL_TIMEOUT};
use crate::planner::DEFAULT_BUFFER_MINUTES;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "WAITCAST_CONFIG";
const PREDICTOR_ENV: &str = "WAITCAST_PREDICTOR";
const PREDICTOR_TIMEOUT_ENV: &str = "WAITCAST_PREDICTOR_TIMEOUT_MS";
const BUFFER_ENV: &str = "WAITCAST_BUFFER_MINUTES";

/// How to reach the trained wait-time model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// No program means no trained model; every prediction is the fallback.
    pub program: Option<String>,
    pub args: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        PredictorConfig {
            program: None,
            args: Vec::new(),
            timeout_ms: DEFAULT_MODEL_TIMEOUT.as_millis() as u64,
        }
    }
}

impl PredictorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn model(&self) -> Option<ProcessModel> {
        self.program
            .as_ref()
            .map(|program| ProcessModel::new(program.clone(), self.args.clone()))
    }
}

/// Values used when a feature can't be read from the providers.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeatureDefaults {
    pub hospital_occupancy: f64,
    pub traffic_level: f64,
    pub patient_age: u32,
    /// Share of the queue assumed to be at the current stage.
    pub stage_share: f64,
    pub staff_at_stage: u32,
}

impl Default for FeatureDefaults {
    fn default() -> Self {
        FeatureDefaults {
            hospital_occupancy: 0.5,
            traffic_level: 0.5,
            patient_age: 40,
            stage_share: 0.6,
            staff_at_stage: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub predictor: PredictorConfig,
    pub arrival_buffer_minutes: f64,
    pub thresholds: AlertThresholds,
    pub features: FeatureDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            predictor: PredictorConfig::default(),
            arrival_buffer_minutes: DEFAULT_BUFFER_MINUTES,
            thresholds: AlertThresholds::default(),
            features: FeatureDefaults::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_json(&data)
    }

    /// Load from `WAITCAST_CONFIG` if set, otherwise start from defaults,
    /// then apply environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(&path)?,
            Err(_) => EngineConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(program) = lookup(PREDICTOR_ENV).filter(|p| !p.trim().is_empty()) {
            self.predictor.program = Some(program);
        }
        if let Some(raw) = lookup(PREDICTOR_TIMEOUT_ENV) {
            self.predictor.timeout_ms = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be an integer, got '{}'", PREDICTOR_TIMEOUT_ENV, raw))
            })?;
        }
        if let Some(raw) = lookup(BUFFER_ENV) {
            self.arrival_buffer_minutes = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a number, got '{}'", BUFFER_ENV, raw))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.predictor.timeout_ms == 0 {
            return Err(ConfigError::Invalid("predictor.timeout_ms must be positive".to_string()));
        }
        if !self.arrival_buffer_minutes.is_finite() || self.arrival_buffer_minutes < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "arrival_buffer_minutes must be non-negative, got {}",
                self.arrival_buffer_minutes
            )));
        }
        if self.thresholds.anomaly_minutes < self.thresholds.high_wait_minutes {
            return Err(ConfigError::Invalid(
                "thresholds.anomaly_minutes must not be below thresholds.high_wait_minutes".to_string(),
            ));
        }
        let unit = 0.0..=1.0;
        if !unit.contains(&self.features.hospital_occupancy)
            || !unit.contains(&self.features.traffic_level)
            || !unit.contains(&self.features.stage_share)
        {
            return Err(ConfigError::Invalid(
                "features.hospital_occupancy, traffic_level and stage_share must be within [0, 1]"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_json_gives_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.predictor.timeout(), Duration::from_secs(3));
        assert!(config.predictor.model().is_none());
        assert_eq!(config.thresholds.high_wait_minutes, 30.0);
        assert_eq!(config.thresholds.anomaly_minutes, 45.0);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = EngineConfig::from_json(
            r#"{
                "predictor": {"program": "python3", "args": ["predict.py"]},
                "thresholds": {"anomaly_minutes": 60}
            }"#,
        )
        .unwrap();
        assert_eq!(config.predictor.program.as_deref(), Some("python3"));
        assert_eq!(config.predictor.timeout_ms, 3000);
        assert!(config.predictor.model().is_some());
        assert_eq!(config.thresholds.high_wait_minutes, 30.0);
        assert_eq!(config.thresholds.anomaly_minutes, 60.0);
        assert_eq!(config.features.patient_age, 40);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"arrival_buffer_minutes": -1}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"thresholds": {"anomaly_minutes": 20}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"features": {"traffic_level": 1.5}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(EngineConfig::from_json("[1, 2]"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn environment_overrides() {
        let env: HashMap<&str, &str> = [
            (PREDICTOR_ENV, "/opt/model/predict"),
            (PREDICTOR_TIMEOUT_ENV, "750"),
            (BUFFER_ENV, "10"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.predictor.program.as_deref(), Some("/opt/model/predict"));
        assert_eq!(config.predictor.timeout(), Duration::from_millis(750));
        assert_eq!(config.arrival_buffer_minutes, 10.0);

        let mut config = EngineConfig::default();
        let result = config.apply_overrides(|key| {
            (key == PREDICTOR_TIMEOUT_ENV).then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            EngineConfig::load("/nonexistent/waitcast.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
