//! Calls the trained wait-time model and degrades to the queue-length
//! heuristic whenever it can't give a usable answer.

use crate::error::PredictorError;
use crate::fallback::FallbackPredictor;
use crate::models::{PredictionFeatures, WaitEstimate};
use serde::Deserialize;
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(3);

/// Anything that can turn a feature vector into a wait estimate: a
/// subprocess, an HTTP service or an in-process model.
pub trait WaitTimeModel: Send + Sync {
    fn predict(
        &self,
        features: &PredictionFeatures,
    ) -> impl Future<Output = Result<WaitEstimate, PredictorError>> + Send;
}

/// A missing model behaves like an unreachable one.
impl<M: WaitTimeModel> WaitTimeModel for Option<M> {
    async fn predict(&self, features: &PredictionFeatures) -> Result<WaitEstimate, PredictorError> {
        match self {
            Some(model) => model.predict(features).await,
            None => Err(PredictorError::Unavailable(
                "no wait-time model configured".to_string(),
            )),
        }
    }
}

impl<M: WaitTimeModel> WaitTimeModel for Arc<M> {
    async fn predict(&self, features: &PredictionFeatures) -> Result<WaitEstimate, PredictorError> {
        (**self).predict(features).await
    }
}

/// Runs an external program with the features appended as positional
/// arguments and reads `{"mean", "variance", "tail_risk"}` JSON from stdout.
///
/// The child is killed if the prediction future is dropped, so a timed-out
/// or abandoned request doesn't leave the process running.
#[derive(Debug, Clone)]
pub struct ProcessModel {
    program: String,
    args: Vec<String>,
}

impl ProcessModel {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        ProcessModel {
            program: program.into(),
            args,
        }
    }
}

impl WaitTimeModel for ProcessModel {
    async fn predict(&self, features: &PredictionFeatures) -> Result<WaitEstimate, PredictorError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .args(features.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PredictorError::Unavailable(format!("{}: {}", self.program, e)))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| PredictorError::Unavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                debug!(stderr = %stderr.trim(), "wait-time model stderr");
            }
            return Err(PredictorError::NonZeroExit(output.status.code().unwrap_or(-1)));
        }

        parse_estimate(&output.stdout)
    }
}

#[derive(Deserialize)]
struct RawEstimate {
    mean: f64,
    variance: f64,
    tail_risk: f64,
}

/// Parse and validate the model's JSON output.
pub fn parse_estimate(stdout: &[u8]) -> Result<WaitEstimate, PredictorError> {
    let text = std::str::from_utf8(stdout)
        .map_err(|e| PredictorError::Malformed(format!("output is not UTF-8: {}", e)))?
        .trim();
    if text.is_empty() {
        return Err(PredictorError::Malformed("empty output".to_string()));
    }

    let raw: RawEstimate =
        serde_json::from_str(text).map_err(|e| PredictorError::Malformed(e.to_string()))?;
    WaitEstimate::new(raw.mean, raw.variance, raw.tail_risk).map_err(PredictorError::Malformed)
}

/// Front door for predictions. Always returns a valid estimate.
#[derive(Debug, Clone)]
pub struct PredictionGateway<M> {
    model: M,
    fallback: FallbackPredictor,
    timeout: Duration,
}

impl<M: WaitTimeModel> PredictionGateway<M> {
    pub fn new(model: M, timeout: Duration) -> Self {
        PredictionGateway {
            model,
            fallback: FallbackPredictor::new(),
            timeout,
        }
    }

    pub async fn predict(&self, features: &PredictionFeatures) -> WaitEstimate {
        let outcome = match timeout(self.timeout, self.model.predict(features)).await {
            Ok(result) => result,
            Err(_) => Err(PredictorError::TimedOut(self.timeout.as_millis() as u64)),
        };

        match outcome {
            Ok(estimate) => {
                debug!(
                    mean = estimate.mean(),
                    variance = estimate.variance(),
                    tail_risk = estimate.tail_risk(),
                    "wait-time model estimate"
                );
                estimate
            }
            Err(e) => {
                warn!(
                    error = %e,
                    queue_length = features.total_queue_length,
                    "wait-time model failed, using fallback estimate"
                );
                self.fallback.predict(features.total_queue_length)
            }
        }
    }
}
