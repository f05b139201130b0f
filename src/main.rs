//! Demo for the wait-time prediction engine.
//!
//! Builds an in-memory clinic with one doctor, a short queue and a day of
//! slots, then predicts waits for a few slots and books one. Set
//! `WAITCAST_PREDICTOR` (or `WAITCAST_CONFIG`) to use a trained model;
//! without one every estimate comes from the queue-length heuristic.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use waitcast::models::{DoctorDetails, ExternalFactors, PatientDetails, Role, Specialty};
use waitcast::queue::{self, Stage};
use waitcast::{DoctorCalendar, EngineConfig, InMemoryClinic, LogSink, SlotPredictor};

const DOCTOR_ID: &str = "dr-grey";

fn demo_clinic(day: NaiveDate) -> Result<InMemoryClinic> {
    let mut calendar = DoctorCalendar::new(
        DoctorDetails {
            doctor_id: DOCTOR_ID.to_string(),
            name: "Meredith Grey".to_string(),
            experience_years: 12,
            specialty: Specialty::General,
        },
        30,
    )
    .map_err(|e| anyhow!(e))?;

    let lunch = NaiveTime::from_hms_opt(12, 0, 0).zip(NaiveTime::from_hms_opt(13, 0, 0));
    let slots = calendar.generate_daily_slots(day, 9, 17, lunch);
    info!("created calendar with {} slots", slots.len());

    calendar.enqueue("p-000");
    calendar.complete_consultation("p-000", 22.0);
    for patient_id in ["p-001", "p-002", "p-003"] {
        calendar.enqueue(patient_id);
    }
    calendar.advance_stage("p-001", Stage::Consultation);
    calendar.advance_stage("p-002", Stage::Triage);

    let clinic = InMemoryClinic::new();
    clinic.add_doctor(calendar);
    clinic.add_patient(PatientDetails {
        patient_id: "p-100".to_string(),
        age: 58,
    });
    clinic.add_user(Role::Admin, "admin-1");
    clinic.add_user(Role::Receptionist, "desk-1");
    clinic.set_external_factors(
        Utc::now().date_naive(),
        ExternalFactors {
            hospital_occupancy: 0.72,
            traffic_level: 0.4,
        },
    );
    Ok(clinic)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env().context("failed to load configuration")?;
    if config.predictor.program.is_none() {
        info!("no wait-time model configured; using the fallback heuristic");
    }

    let day = Utc::now().date_naive() + Duration::days(1);
    let clinic = Arc::new(demo_clinic(day)?);
    let predictor = SlotPredictor::from_config(
        &config,
        Arc::clone(&clinic),
        config.predictor.model(),
        Arc::clone(&clinic),
        LogSink,
    );

    let at = |hour: u32, minute: u32| {
        day.and_hms_opt(hour, minute, 0)
            .map(|t| t.and_utc())
            .ok_or_else(|| anyhow!("invalid demo time {:02}:{:02}", hour, minute))
    };

    println!("\n--- Slot predictions for {} ---", day);
    for slot_time in [at(9, 0)?, at(14, 30)?, at(12, 15)?] {
        let result = predictor
            .check_slot_and_predict(DOCTOR_ID, slot_time, Some("p-100"))
            .await?;
        let outlook = queue::slot_outlook(slot_time, 3);
        println!(
            "\n{} (outlook: {:?}, {})",
            slot_time.format("%H:%M"),
            outlook.availability,
            outlook.recommendation
        );
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    let forecast = clinic.queue_forecast(DOCTOR_ID, at(9, 0)?)?;
    println!(
        "\nQueue forecast from consultation history: {} min ({} - {}, confidence {:.2})",
        forecast.predicted_wait_minutes,
        forecast.min_wait_minutes,
        forecast.max_wait_minutes,
        forecast.confidence
    );

    println!("\n--- Booking p-100 at 10:00 ---");
    let outcome = predictor.book_slot(DOCTOR_ID, "p-100", at(10, 0)?).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    let again = predictor.book_slot(DOCTOR_ID, "p-101", at(10, 0)?).await?;
    println!("{}", serde_json::to_string_pretty(&again)?);

    if let Some(calendar) = clinic.doctor(DOCTOR_ID) {
        println!("\n{}", calendar);
        for entry in calendar.queue() {
            println!(
                "  {:6} {:12} wait {:>5.1} min",
                entry.patient_id,
                entry.stage.name(),
                entry.estimated_wait
            );
        }
    }

    Ok(())
}
