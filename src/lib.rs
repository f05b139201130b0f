//! Wait-time prediction for hospital appointment queues.
//!
//! Given a doctor's queue and the hospital's conditions, `SlotPredictor`
//! estimates how long a patient booking a slot will wait, recommends when to
//! arrive and raises alerts when the queue runs long. A trained model is
//! used when one is configured; otherwise, or whenever it fails, a
//! queue-length heuristic answers instead.

pub mod alerts;
pub mod config;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod providers;
pub mod queue;
pub mod statistics;

pub use alerts::{AlertPolicy, AlertThresholds, LogSink, NotificationSink, Outbox, RoleDirectory};
pub use config::EngineConfig;
pub use error::{EngineError, PredictorError, ProviderError, StatsError};
pub use fallback::FallbackPredictor;
pub use gateway::{PredictionGateway, ProcessModel, WaitTimeModel};
pub use models::{AlertEvent, PredictionFeatures, SlotPredictionResult, WaitEstimate};
pub use orchestrator::{BookingOutcome, SlotPredictor};
pub use planner::{ArrivalPlan, ArrivalPlanner};
pub use providers::{BookingLedger, ClinicDataProvider, DoctorCalendar, InMemoryClinic};
