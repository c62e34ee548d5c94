//! Forecast Batch: next expected part replacement per (entity, part)
//!
//! Builds a small in-memory fleet, runs the batch forecaster twice and shows
//! that the second run reuses the cached models.
//!
//! Run with: cargo run --example forecast_batch
//! Verbose:  RUST_LOG=fleet_maintenance=debug cargo run --example forecast_batch

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use fleet_maintenance::forecast::ForecastQuery;
use fleet_maintenance::model::FixedClock;
use fleet_maintenance::records::{
    EntityRow, EntityStatusRow, PartInventoryRow, ReplacementHistoryRow, UsageSample,
};
use fleet_maintenance::source::InMemorySource;
use fleet_maintenance::{Engine, EngineConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single().unwrap_or_default()
}

fn fleet() -> InMemorySource {
    let replacements = [
        ("V1", "P1", [day(2023, 11, 1), day(2024, 1, 1), day(2024, 3, 1), day(2024, 6, 1)]),
        ("V2", "P1", [day(2023, 10, 15), day(2024, 1, 20), day(2024, 4, 2), day(2024, 6, 10)]),
        ("V2", "P2", [day(2023, 12, 1), day(2024, 2, 1), day(2024, 4, 1), day(2024, 6, 1)]),
    ];
    let history = replacements
        .iter()
        .flat_map(|(entity, part, dates)| {
            dates.iter().map(move |at| ReplacementHistoryRow {
                replaced_on: *at,
                entity_id: (*entity).to_string(),
                part_id: (*part).to_string(),
            })
        })
        .collect();

    // One telemetry sample every 6 hours, speed varying by entity and day
    let start = day(2023, 10, 1);
    let mut samples = Vec::new();
    for (entity, base) in [("V1", 38.0), ("V2", 52.0)] {
        for i in 0..1_100 {
            let at = start + Duration::hours(6 * i);
            let speed = if i % 5 == 0 { 0.0 } else { base + f64::from((i % 7) as u8) };
            samples.push(UsageSample::new(entity, at, speed));
        }
    }

    InMemorySource {
        history,
        entities: vec![
            EntityRow { entity_id: "V1".into(), registration: "KA-01-1234".into() },
            EntityRow { entity_id: "V2".into(), registration: "KA-05-9876".into() },
        ],
        samples,
        parts: vec![
            PartInventoryRow {
                part_id: "P1".into(),
                part_name: "Brake Pad".into(),
                unit_price: Some(1_250.0),
                quantity_available: Some(14.0),
            },
            PartInventoryRow {
                part_id: "P2".into(),
                part_name: "Drive Belt".into(),
                unit_price: Some(860.5),
                quantity_available: Some(3.0),
            },
        ],
        statuses: vec![
            EntityStatusRow {
                entity_id: "V1".into(),
                emergency_condition_rate: Some(0.012),
                tamper_condition_rate: Some(0.0),
            },
            EntityStatusRow {
                entity_id: "V2".into(),
                emergency_condition_rate: Some(0.031),
                tamper_condition_rate: Some(0.004),
            },
        ],
        failures: Vec::new(),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Fleet Maintenance: Replacement Forecast ===\n");

    let today = NaiveDate::from_ymd_opt(2024, 7, 1).ok_or_else(|| anyhow::anyhow!("bad date"))?;
    let engine = Engine::builder()
        .config(EngineConfig::default().with_env_overrides())
        .clock(Arc::new(FixedClock(today)))
        .build_in_memory()?;
    let source = fleet();

    let batch = engine.forecast_batch(&source)?;
    println!(
        "{:<8} {:<12} {:<12} {:<14} {:>10} {:>10}  {:?}",
        "entity", "registration", "part", "next", "price", "usage", "status"
    );
    for row in &batch.rows {
        println!(
            "{:<8} {:<12} {:<12} {:<14} {:>10} {:>10.2}  {:?}",
            row.entity_id,
            row.registration.as_deref().unwrap_or("-"),
            row.part_name,
            row.next_expected_replacement
                .map_or_else(|| "-".to_string(), |d| d.to_string()),
            row.unit_price.map_or_else(|| "-".to_string(), |p| format!("{p:.2}")),
            row.usage_before_last_replacement,
            row.status,
        );
    }
    for skipped in &batch.skipped {
        println!("skipped {}/{}: {}", skipped.entity_id, skipped.part_id, skipped.error);
    }

    let writes = engine.model_store().backend().write_count();
    let again = engine.forecast_batch(&source)?;
    println!("\nSecond run identical: {}", again == batch);
    println!(
        "Models trained: {writes} (second run trained {})",
        engine.model_store().backend().write_count() - writes
    );

    let query = ForecastQuery {
        entity: Some("KA-05-9876".into()),
        part_name: Some("brake pad".into()),
    };
    println!("\nQuery {query:?}:");
    for row in batch.select(&query) {
        println!("  {}", serde_json::to_string(&row)?);
    }

    Ok(())
}
