//! Slot check, feature gathering, prediction, arrival planning and alerting
//! for one booking request.

use crate::alerts::{AlertPolicy, NotificationSink, RoleDirectory};
use crate::config::{EngineConfig, FeatureDefaults};
use crate::error::{EngineError, ProviderError};
use crate::gateway::{PredictionGateway, WaitTimeModel};
use crate::models::{AlertEvent, PredictionFeatures, SlotPredictionResult, WaitEstimate};
use crate::planner::ArrivalPlanner;
use crate::providers::{BookingLedger, ClinicDataProvider};
use crate::queue::Stage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// The visit stage a new booking's wait is measured at.
pub const CURRENT_STAGE: Stage = Stage::Consultation;

/// Result of a booking attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingOutcome {
    pub success: bool,
    pub message: String,
    pub prediction: Option<f64>,
    pub variance: Option<f64>,
}

/// Entry point for wait predictions on a doctor's slot.
///
/// Requests share no mutable state; any number can run concurrently.
pub struct SlotPredictor<P, M, D, N> {
    provider: P,
    gateway: PredictionGateway<M>,
    planner: ArrivalPlanner,
    alerts: AlertPolicy<D>,
    sink: N,
    defaults: FeatureDefaults,
}

impl<P, M, D, N> SlotPredictor<P, M, D, N>
where
    P: ClinicDataProvider,
    M: WaitTimeModel,
    D: RoleDirectory,
    N: NotificationSink,
{
    pub fn new(
        provider: P,
        gateway: PredictionGateway<M>,
        planner: ArrivalPlanner,
        alerts: AlertPolicy<D>,
        sink: N,
        defaults: FeatureDefaults,
    ) -> Self {
        SlotPredictor {
            provider,
            gateway,
            planner,
            alerts,
            sink,
            defaults,
        }
    }

    /// Wire everything from configuration.
    pub fn from_config(config: &EngineConfig, provider: P, model: M, directory: D, sink: N) -> Self {
        SlotPredictor::new(
            provider,
            PredictionGateway::new(model, config.predictor.timeout()),
            ArrivalPlanner::new(config.arrival_buffer_minutes),
            AlertPolicy::new(directory, config.thresholds),
            sink,
            config.features,
        )
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Check that `slot_time` is open for the doctor and predict the wait.
    pub async fn check_slot_and_predict(
        &self,
        doctor_id: &str,
        slot_time: DateTime<Utc>,
        patient_id: Option<&str>,
    ) -> Result<SlotPredictionResult, EngineError> {
        let (result, _) = self.predict_slot(doctor_id, slot_time, patient_id).await?;
        Ok(result)
    }

    /// Predict, then reserve the slot and queue the patient.
    pub async fn book_slot(
        &self,
        doctor_id: &str,
        patient_id: &str,
        slot_time: DateTime<Utc>,
    ) -> Result<BookingOutcome, EngineError>
    where
        P: BookingLedger,
    {
        let (check, estimate) = self.predict_slot(doctor_id, slot_time, Some(patient_id)).await?;
        let Some(estimate) = estimate else {
            return Ok(BookingOutcome {
                success: false,
                message: "Slot is not available.".to_string(),
                prediction: None,
                variance: None,
            });
        };

        self.provider
            .book_slot(doctor_id, patient_id, slot_time)
            .await
            .map_err(EngineError::Booking)?;
        self.provider
            .add_to_queue(doctor_id, patient_id)
            .await
            .map_err(EngineError::Booking)?;

        let doctor_name = match self.provider.get_doctor_details(doctor_id).await {
            Ok(doctor) => doctor.name,
            Err(e) => {
                warn!(doctor_id, error = %e, "doctor details unavailable, confirming by id");
                doctor_id.to_string()
            }
        };
        let confirmation = self.alerts.booking_confirmation(
            patient_id,
            &doctor_name,
            slot_time,
            estimate.mean(),
        );
        self.deliver(&[confirmation]).await;

        info!(doctor_id, patient_id, slot = %slot_time, "slot booked");
        Ok(BookingOutcome {
            success: true,
            message: "Slot booked successfully.".to_string(),
            prediction: check.prediction,
            variance: check.variance,
        })
    }

    async fn predict_slot(
        &self,
        doctor_id: &str,
        slot_time: DateTime<Utc>,
        patient_id: Option<&str>,
    ) -> Result<(SlotPredictionResult, Option<WaitEstimate>), EngineError> {
        let slots = self
            .provider
            .get_available_slots(doctor_id)
            .await
            .map_err(|e| match e {
                ProviderError::NotFound(_) => EngineError::DoctorNotFound(doctor_id.to_string()),
                other => EngineError::Slots(other),
            })?;
        if !slots.contains(&slot_time) {
            info!(doctor_id, slot = %slot_time, "slot not available");
            return Ok((SlotPredictionResult::unavailable(), None));
        }

        let features = self.gather_features(doctor_id, slot_time, patient_id).await?;
        let estimate = self.gateway.predict(&features).await;
        let plan = self.planner.plan(&estimate, slot_time)?;

        let events = self.alerts.evaluate(doctor_id, &estimate).await;
        self.deliver(&events).await;

        debug!(
            doctor_id,
            mean = estimate.mean(),
            variance = estimate.variance(),
            tail_risk = estimate.tail_risk(),
            "slot prediction ready"
        );

        let result = SlotPredictionResult {
            available: true,
            prediction: Some(estimate.mean()),
            variance: Some(estimate.variance()),
            tail_risk: Some(estimate.tail_risk()),
            risk: Some(estimate.risk_percent()),
            expected_range: Some(plan.expected_range),
            recommended_arrival: Some(plan.recommended_arrival),
            recommended_arrival_minutes: Some(plan.recommended_arrival_minutes),
            on_time_wait: Some(plan.on_time_wait),
        };
        Ok((result, Some(estimate)))
    }

    /// Build the feature vector. Only a missing doctor aborts; every other
    /// failed read falls back to a default.
    async fn gather_features(
        &self,
        doctor_id: &str,
        slot_time: DateTime<Utc>,
        patient_id: Option<&str>,
    ) -> Result<PredictionFeatures, EngineError> {
        let doctor_experience_years = match self.provider.get_doctor_details(doctor_id).await {
            Ok(doctor) => doctor.experience_years,
            Err(ProviderError::NotFound(_)) => {
                return Err(EngineError::DoctorNotFound(doctor_id.to_string()))
            }
            Err(e) => {
                warn!(doctor_id, error = %e, "doctor details unavailable, assuming no experience");
                0
            }
        };

        let total_queue_length = match self.provider.get_queue_length(doctor_id).await {
            Ok(n) => n,
            Err(e) => {
                warn!(doctor_id, error = %e, "queue length unavailable, assuming empty queue");
                0
            }
        };

        let (patients_at_current_stage, staff_at_current_stage) =
            match self.provider.get_stage_occupancy(doctor_id, CURRENT_STAGE).await {
                Ok(Some(occupancy)) => (occupancy.patients, occupancy.staff),
                Ok(None) => self.estimated_stage_occupancy(total_queue_length),
                Err(e) => {
                    debug!(doctor_id, error = %e, "stage occupancy unavailable");
                    self.estimated_stage_occupancy(total_queue_length)
                }
            };

        let today = Utc::now().date_naive();
        let (hospital_occupancy, traffic_level) =
            match self.provider.get_external_factors(today).await {
                Ok(Some(factors)) => (
                    factors.hospital_occupancy.clamp(0.0, 1.0),
                    factors.traffic_level.clamp(0.0, 1.0),
                ),
                Ok(None) => (self.defaults.hospital_occupancy, self.defaults.traffic_level),
                Err(e) => {
                    info!(error = %e, "external factors unavailable, using defaults");
                    (self.defaults.hospital_occupancy, self.defaults.traffic_level)
                }
            };

        let patient_age = match patient_id {
            Some(id) => match self.provider.get_patient_details(id).await {
                Ok(Some(patient)) => patient.age,
                Ok(None) => self.defaults.patient_age,
                Err(e) => {
                    debug!(patient_id = id, error = %e, "patient details unavailable");
                    self.defaults.patient_age
                }
            },
            None => self.defaults.patient_age,
        };

        Ok(PredictionFeatures {
            total_queue_length,
            patients_at_current_stage,
            staff_at_current_stage,
            hospital_occupancy,
            patient_age,
            traffic_level,
            doctor_experience_years,
            slot_time,
        })
    }

    fn estimated_stage_occupancy(&self, queue_length: u32) -> (u32, u32) {
        let patients = (f64::from(queue_length) * self.defaults.stage_share).floor() as u32;
        (patients, self.defaults.staff_at_stage)
    }

    async fn deliver(&self, events: &[AlertEvent]) {
        for event in events {
            if let Err(e) = self.sink.send(event).await {
                warn!(
                    recipient = %event.recipient_id,
                    kind = ?event.kind,
                    error = %e,
                    "alert delivery failed"
                );
            }
        }
    }
}
