//! End-to-end tests for the replacement forecast batch
//!
//! Usage windows → per-pair model (cached) → forecast rows, through the
//! public `Engine` facade.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use fleet_maintenance::forecast::{ForecastInputs, ForecastQuery, ForecastStatus};
use fleet_maintenance::model::{FixedClock, MemoryArtifactStore};
use fleet_maintenance::records::{
    EntityRow, EntityStatusRow, FailureRecord, PairKey, PartInventoryRow,
    ReplacementHistoryRow, UsageSample,
};
use fleet_maintenance::source::{InMemorySource, ReferenceData};
use fleet_maintenance::{Engine, Error, Result};
use std::sync::Arc;

fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn engine_at(y: i32, m: u32, d: u32) -> Engine<MemoryArtifactStore> {
    Engine::builder()
        .clock(Arc::new(FixedClock(NaiveDate::from_ymd_opt(y, m, d).unwrap())))
        .build_in_memory()
        .unwrap()
}

fn history(entity: &str, part: &str, dates: &[DateTime<Utc>]) -> Vec<ReplacementHistoryRow> {
    dates
        .iter()
        .map(|at| ReplacementHistoryRow {
            replaced_on: *at,
            entity_id: entity.into(),
            part_id: part.into(),
        })
        .collect()
}

/// One sample every 12 hours from `start` for `days` days, constant speed.
fn telemetry(entity: &str, start: DateTime<Utc>, days: i64, speed: f64) -> Vec<UsageSample> {
    (0..days * 2)
        .map(|i| UsageSample::new(entity, start + Duration::hours(12 * i), speed))
        .collect()
}

fn part(id: &str, name: &str) -> PartInventoryRow {
    PartInventoryRow {
        part_id: id.into(),
        part_name: name.into(),
        unit_price: Some(1_250.456),
        quantity_available: Some(7.0),
    }
}

fn status(entity: &str) -> EntityStatusRow {
    EntityStatusRow {
        entity_id: entity.into(),
        emergency_condition_rate: Some(0.0123),
        tamper_condition_rate: Some(0.0),
    }
}

/// V1/P1 with four replacements, so three windows carry usage.
fn fleet() -> InMemorySource {
    InMemorySource {
        history: history(
            "V1",
            "P1",
            &[day(2023, 11, 1), day(2024, 1, 1), day(2024, 3, 1), day(2024, 6, 1)],
        ),
        entities: vec![EntityRow {
            entity_id: "V1".into(),
            registration: "KA-01-1234".into(),
        }],
        samples: telemetry("V1", day(2023, 10, 15), 240, 40.0),
        parts: vec![part("P1", "Brake Pad")],
        statuses: vec![status("V1")],
        failures: Vec::new(),
    }
}

#[test]
fn test_scenario_three_fit_points_never_raise() {
    let engine = engine_at(2024, 7, 1);
    let batch = engine.forecast_batch(&fleet()).unwrap();

    assert!(batch.skipped.is_empty(), "skipped: {:?}", batch.skipped);
    assert_eq!(batch.rows.len(), 1);
    let row = &batch.rows[0];
    assert_eq!(row.entity_id, "V1");
    assert_eq!(row.registration.as_deref(), Some("KA-01-1234"));
    assert_eq!(row.part_name, "Brake Pad");
    assert!(matches!(
        row.status,
        ForecastStatus::Predicted | ForecastStatus::NoReplacementInHorizon
    ));
    assert_eq!(
        row.status == ForecastStatus::Predicted,
        row.next_expected_replacement.is_some()
    );
    if let Some(next) = row.next_expected_replacement {
        assert!(next > NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }
}

#[test]
fn test_rows_are_rounded_to_two_decimals() {
    let engine = engine_at(2024, 7, 1);
    let batch = engine.forecast_batch(&fleet()).unwrap();
    let row = &batch.rows[0];

    assert_eq!(row.unit_price, Some(1_250.46));
    assert_eq!(row.quantity_available, Some(7.0));
    assert_eq!(row.emergency_condition, 0.01);
    assert_eq!(row.tamper_condition, 0.0);
    assert!(row.usage_before_last_replacement > 0.0);
    assert_eq!(
        row.usage_before_last_replacement,
        (row.usage_before_last_replacement * 100.0).round() / 100.0
    );
}

#[test]
fn test_same_month_rerun_is_idempotent() {
    let engine = engine_at(2024, 7, 1);
    let source = fleet();

    let first = engine.forecast_batch(&source).unwrap();
    let writes = engine.model_store().backend().write_count();
    assert_eq!(writes, 1);

    let second = engine.forecast_batch(&source).unwrap();
    assert_eq!(engine.model_store().backend().write_count(), writes);
    assert_eq!(first, second);
}

#[test]
fn test_new_month_retrains() {
    let source = fleet();
    let dir = tempfile::tempdir().unwrap();
    let june = Engine::builder()
        .clock(Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap())))
        .build_with_dir(dir.path())
        .unwrap();
    june.forecast_batch(&source).unwrap();
    let pair = PairKey::new("V1", "P1");
    assert_eq!(
        june.model_store().metadata(&pair).unwrap().unwrap().last_trained(),
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    );

    let july = Engine::builder()
        .clock(Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())))
        .build_with_dir(dir.path())
        .unwrap();
    july.forecast_batch(&source).unwrap();

    let metadata = july.model_store().metadata(&pair).unwrap().unwrap();
    assert_eq!(metadata.last_trained(), NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
}

#[test]
fn test_missing_part_skips_only_that_pair() {
    let mut source = fleet();
    source
        .history
        .extend(history("V1", "P404", &[day(2024, 1, 5), day(2024, 4, 5)]));

    let engine = engine_at(2024, 7, 1);
    let batch = engine.forecast_batch(&source).unwrap();

    assert_eq!(batch.rows.len(), 1);
    assert_eq!(batch.rows[0].part_id, "P1");
    assert_eq!(batch.skipped.len(), 1);
    assert_eq!(batch.skipped[0].part_id, "P404");
    assert!(batch.skipped[0].error.contains("P404"));
}

#[test]
fn test_short_history_is_insufficient_not_error() {
    let mut source = fleet();
    source.history = history("V1", "P1", &[day(2024, 3, 1), day(2024, 6, 1)]);

    let engine = engine_at(2024, 7, 1);
    let batch = engine.forecast_batch(&source).unwrap();

    assert!(batch.skipped.is_empty());
    assert_eq!(batch.rows[0].status, ForecastStatus::InsufficientData);
    assert_eq!(batch.rows[0].next_expected_replacement, None);
    assert_eq!(engine.model_store().backend().write_count(), 0);
}

#[test]
fn test_unknown_covariate_skips_pair() {
    let mut source = fleet();
    source.statuses.clear();

    let engine = engine_at(2024, 7, 1);
    let batch = engine.forecast_batch(&source).unwrap();

    assert!(batch.rows.is_empty());
    assert_eq!(batch.skipped.len(), 1);
    assert_eq!(engine.model_store().backend().write_count(), 0);
}

#[test]
fn test_query_by_registration_and_part_name() {
    let engine = engine_at(2024, 7, 1);
    let batch = engine.forecast_batch(&fleet()).unwrap();

    let hit = ForecastQuery {
        entity: Some("KA-01-1234".into()),
        part_name: Some("BRAKE PAD".into()),
    };
    assert_eq!(batch.select(&hit).len(), 1);

    let miss = ForecastQuery {
        entity: Some("V2".into()),
        part_name: None,
    };
    assert!(batch.select(&miss).is_empty());
}

#[test]
fn test_forecast_inputs_match_source_run() {
    let source = fleet();
    let engine = engine_at(2024, 7, 1);
    let from_source = engine.forecast_batch(&source).unwrap();
    let from_inputs = engine.forecast_inputs(ForecastInputs::load(&source).unwrap());
    assert_eq!(from_source, from_inputs);
}

/// Source whose telemetry table is unavailable.
struct BrokenTelemetry(InMemorySource);

impl ReferenceData for BrokenTelemetry {
    fn replacement_history(&self) -> Result<Vec<ReplacementHistoryRow>> {
        self.0.replacement_history()
    }

    fn entities(&self) -> Result<Vec<EntityRow>> {
        self.0.entities()
    }

    fn usage_samples(&self) -> Result<Vec<UsageSample>> {
        Err(Error::DataSource("usage_samples: connection refused".into()))
    }

    fn part_inventory(&self) -> Result<Vec<PartInventoryRow>> {
        self.0.part_inventory()
    }

    fn entity_status(&self) -> Result<Vec<EntityStatusRow>> {
        self.0.entity_status()
    }

    fn failure_records(&self) -> Result<Vec<FailureRecord>> {
        self.0.failure_records()
    }
}

#[test]
fn test_source_failure_aborts_run() {
    let engine = engine_at(2024, 7, 1);
    let err = engine.forecast_batch(&BrokenTelemetry(fleet())).unwrap_err();

    assert!(matches!(err, Error::DataSource(_)));
    assert!(!err.is_transient());
    assert_eq!(engine.model_store().backend().write_count(), 0);
}

#[test]
fn test_pairs_with_underscored_ids_keep_their_own_models() {
    let dates = [day(2023, 11, 1), day(2024, 1, 1), day(2024, 3, 1), day(2024, 6, 1)];
    let mut history_rows = history("A_B", "C", &dates);
    history_rows.extend(history("A", "B_C", &dates));
    let mut samples = telemetry("A_B", day(2023, 10, 15), 240, 500.0);
    samples.extend(telemetry("A", day(2023, 10, 15), 240, 0.01));

    let source = InMemorySource {
        history: history_rows,
        entities: Vec::new(),
        samples,
        parts: vec![part("C", "Clutch"), part("B_C", "Brake Cable")],
        statuses: vec![status("A_B"), status("A")],
        failures: Vec::new(),
    };

    let engine = engine_at(2024, 7, 1);
    let batch = engine.forecast_batch(&source).unwrap();

    assert!(batch.skipped.is_empty(), "skipped: {:?}", batch.skipped);
    assert_eq!(batch.rows.len(), 2);
    assert_eq!(engine.model_store().backend().write_count(), 2);
    for pair in [PairKey::new("A_B", "C"), PairKey::new("A", "B_C")] {
        let metadata = engine.model_store().metadata(&pair).unwrap().unwrap();
        assert_eq!(metadata.pair(), &pair);
    }
}
