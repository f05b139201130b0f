//! Alert decisions for predicted waits, and the sinks that deliver them.
//!
//! The policy only decides who should hear about an estimate; delivery is
//! handed to a `NotificationSink` and never affects the prediction itself.

use crate::error::{NotificationError, ProviderError};
use crate::models::{AlertEvent, AlertKind, Role, Severity, WaitEstimate};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Predicted waits above this many minutes breach the operational SLA.
pub const HIGH_WAIT_THRESHOLD_MINUTES: f64 = 30.0;
/// Predicted waits above this many minutes are flagged as queue anomalies.
pub const ANOMALY_THRESHOLD_MINUTES: f64 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub high_wait_minutes: f64,
    pub anomaly_minutes: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        AlertThresholds {
            high_wait_minutes: HIGH_WAIT_THRESHOLD_MINUTES,
            anomaly_minutes: ANOMALY_THRESHOLD_MINUTES,
        }
    }
}

/// Looks up which users hold a role.
pub trait RoleDirectory: Send + Sync {
    fn list_users_by_role(
        &self,
        role: Role,
    ) -> impl Future<Output = Result<Vec<String>, ProviderError>> + Send;
}

/// Best-effort delivery of alert events.
pub trait NotificationSink: Send + Sync {
    fn send(&self, event: &AlertEvent) -> impl Future<Output = Result<(), NotificationError>> + Send;
}

pub struct AlertPolicy<D> {
    directory: D,
    thresholds: AlertThresholds,
}

impl<D: RoleDirectory> AlertPolicy<D> {
    pub fn new(directory: D, thresholds: AlertThresholds) -> Self {
        AlertPolicy {
            directory,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> AlertThresholds {
        self.thresholds
    }

    /// Alerts for one doctor's estimate.
    ///
    /// Above the high-wait threshold the doctor gets a high-severity
    /// `HighWait` and every admin and receptionist a medium one. Above the
    /// anomaly threshold the doctor and every admin additionally get a
    /// high-severity `Anomaly`.
    ///
    /// The doctor's events don't depend on the directory. A role whose
    /// users can't be listed just gets no events.
    pub async fn evaluate(&self, doctor_id: &str, estimate: &WaitEstimate) -> Vec<AlertEvent> {
        let mean = estimate.mean();
        let mut events = Vec::new();

        if mean > self.thresholds.high_wait_minutes {
            events.push(AlertEvent::new(
                AlertKind::HighWait,
                Role::Doctor,
                doctor_id,
                Severity::High,
                "High Wait Time Alert",
                format!(
                    "Predicted wait time: {:.1} minutes. Consider adjusting schedule.",
                    mean
                ),
            ));

            for role in [Role::Admin, Role::Receptionist] {
                for user_id in self.recipients(role).await {
                    events.push(AlertEvent::new(
                        AlertKind::HighWait,
                        role,
                        user_id,
                        Severity::Medium,
                        "System Alert: High Wait Time",
                        format!(
                            "Doctor {} has predicted wait of {:.1} minutes",
                            doctor_id, mean
                        ),
                    ));
                }
            }
        }

        if mean > self.thresholds.anomaly_minutes {
            let description = format!("High predicted wait: {:.1} min", mean);
            events.push(AlertEvent::new(
                AlertKind::Anomaly,
                Role::Doctor,
                doctor_id,
                Severity::High,
                "Queue Anomaly Detected",
                description.clone(),
            ));

            for user_id in self.recipients(Role::Admin).await {
                events.push(AlertEvent::new(
                    AlertKind::Anomaly,
                    Role::Admin,
                    user_id,
                    Severity::High,
                    "System Alert: Queue Anomaly",
                    format!("Doctor {}: {}", doctor_id, description),
                ));
            }
        }

        events
    }

    async fn recipients(&self, role: Role) -> Vec<String> {
        match self.directory.list_users_by_role(role).await {
            Ok(users) => users,
            Err(e) => {
                warn!(role = role.name(), error = %e, "could not list alert recipients");
                Vec::new()
            }
        }
    }

    /// Confirmation sent to the patient after every successful booking.
    pub fn booking_confirmation(
        &self,
        patient_id: &str,
        doctor_name: &str,
        slot_time: DateTime<Utc>,
        predicted_wait: f64,
    ) -> AlertEvent {
        AlertEvent::new(
            AlertKind::Info,
            Role::Patient,
            patient_id,
            Severity::Low,
            "Appointment Confirmed",
            format!(
                "Your appointment with Dr. {} at {} is confirmed. Expected wait: {:.1} minutes.",
                doctor_name,
                slot_time.format("%Y-%m-%d %H:%M UTC"),
                predicted_wait
            ),
        )
    }
}

/// Writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotificationError> {
        info!(
            kind = ?event.kind,
            role = event.target_role.name(),
            recipient = %event.recipient_id,
            severity = ?event.severity,
            "{}: {}",
            event.title,
            event.message
        );
        Ok(())
    }
}

/// Keeps delivered events in memory, newest last.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Mutex<Vec<AlertEvent>>,
}

impl Outbox {
    pub fn new() -> Self {
        Outbox::default()
    }

    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().clone()
    }

    pub fn drain(&self) -> Vec<AlertEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl NotificationSink for Outbox {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotificationError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

impl<T: RoleDirectory> RoleDirectory for Arc<T> {
    async fn list_users_by_role(&self, role: Role) -> Result<Vec<String>, ProviderError> {
        (**self).list_users_by_role(role).await
    }
}

impl<T: NotificationSink> NotificationSink for Arc<T> {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotificationError> {
        (**self).send(event).await
    }
}
