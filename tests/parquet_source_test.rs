//! Parquet-backed reference data
//!
//! Writes each table with `ArrowWriter` into a temp directory and reads it
//! back through `ParquetSource`, including type coercion and null handling.

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, TimestampSecondArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, TimeZone, Utc};
use fleet_maintenance::forecast::ForecastStatus;
use fleet_maintenance::model::FixedClock;
use fleet_maintenance::source::{tables, ParquetSource, ReferenceData};
use fleet_maintenance::{Engine, Error};
use parquet::arrow::ArrowWriter;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

fn write_table(dir: &Path, table: &str, columns: Vec<(&str, ArrayRef)>) {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    let batch =
        RecordBatch::try_new(schema.clone(), columns.into_iter().map(|(_, a)| a).collect())
            .unwrap();

    let file = File::create(dir.join(format!("{table}.parquet"))).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

fn strings(values: &[Option<&str>]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

fn floats(values: &[Option<f64>]) -> ArrayRef {
    Arc::new(Float64Array::from(values.to_vec()))
}

fn ints(values: &[Option<i64>]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

/// Midnight UTC as epoch seconds
fn seconds(y: i32, m: u32, d: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap().timestamp()
}

/// Fleet of one vehicle (integer id 1) with one part, four replacements.
fn write_fleet(dir: &Path) {
    write_table(
        dir,
        tables::REPLACEMENT_HISTORY,
        vec![
            (
                "replaced_on",
                Arc::new(TimestampSecondArray::from(vec![
                    Some(seconds(2023, 11, 1)),
                    Some(seconds(2024, 1, 1)),
                    Some(seconds(2024, 3, 1)),
                    Some(seconds(2024, 6, 1)),
                    None,
                ])) as ArrayRef,
            ),
            ("entity_id", ints(&[Some(1); 5])),
            ("part_id", strings(&[Some("P1"), Some("P1"), Some("P1"), Some("P1"), Some("P1")])),
        ],
    );

    write_table(
        dir,
        tables::ENTITIES,
        vec![
            ("entity_id", ints(&[Some(1)])),
            ("registration", strings(&[Some("KA-01-1234")])),
        ],
    );

    let start = Utc.with_ymd_and_hms(2023, 10, 15, 0, 0, 0).unwrap();
    let timestamps: Vec<String> = (0..480)
        .map(|i| (start + chrono::Duration::hours(12 * i)).format("%Y-%m-%dT%H:%M:%S").to_string())
        .collect();
    let n = timestamps.len();
    write_table(
        dir,
        tables::USAGE_SAMPLES,
        vec![
            ("entity_id", ints(&vec![Some(1); n])),
            ("timestamp", Arc::new(StringArray::from(timestamps)) as ArrayRef),
            ("speed", floats(&vec![Some(40.0); n])),
        ],
    );

    write_table(
        dir,
        tables::PART_INVENTORY,
        vec![
            ("part_id", strings(&[Some("P1"), Some("P2")])),
            ("part_name", strings(&[Some("Brake Pad"), None])),
            ("unit_price", floats(&[Some(1_250.0), None])),
            ("quantity_available", ints(&[Some(7), None])),
        ],
    );

    write_table(
        dir,
        tables::ENTITY_STATUS,
        vec![
            ("entity_id", ints(&[Some(1)])),
            ("emergency_condition_rate", floats(&[Some(0.02)])),
            ("tamper_condition_rate", floats(&[Some(0.0)])),
        ],
    );

    write_table(
        dir,
        tables::FAILURE_RECORDS,
        vec![
            ("event_id", strings(&[Some("E1"), Some("E1"), Some("E2"), Some("E3")])),
            ("reason_text", strings(&[Some("worn belt"), Some("oil leak"), Some(" "), None])),
            ("entity_id", ints(&[Some(1); 4])),
        ],
    );
}

#[test]
fn test_tables_are_coerced_and_nulls_dropped() {
    let dir = tempfile::tempdir().unwrap();
    write_fleet(dir.path());
    let source = ParquetSource::new(dir.path());

    let history = source.replacement_history().unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].entity_id, "1");
    assert_eq!(
        history[0].replaced_on,
        Utc.with_ymd_and_hms(2023, 11, 1, 0, 0, 0).unwrap()
    );

    let samples = source.usage_samples().unwrap();
    assert_eq!(samples.len(), 480);
    assert_eq!(samples[1].timestamp, Utc.with_ymd_and_hms(2023, 10, 15, 12, 0, 0).unwrap());

    let parts = source.part_inventory().unwrap();
    assert_eq!(parts[0].quantity_available, Some(7.0));
    assert_eq!(parts[1].part_name, "");
    assert_eq!(parts[1].unit_price, None);

    let failures = source.failure_records().unwrap();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|f| f.event_id == "E1"));
}

#[test]
fn test_engine_runs_over_parquet_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_fleet(dir.path());
    let source = ParquetSource::new(dir.path());

    let engine = Engine::builder()
        .clock(Arc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())))
        .build_in_memory()
        .unwrap();
    let batch = engine.forecast_batch(&source).unwrap();

    assert!(batch.skipped.is_empty(), "skipped: {:?}", batch.skipped);
    assert_eq!(batch.rows.len(), 1);
    assert_eq!(batch.rows[0].registration.as_deref(), Some("KA-01-1234"));
    assert_ne!(batch.rows[0].status, ForecastStatus::InsufficientData);

    let analysis = engine.failure_analysis(&source, "KA-01-1234").unwrap();
    assert_eq!(analysis.cluster_data.iter().map(|c| c.cluster_size).sum::<usize>(), 2);
}

#[test]
fn test_missing_column_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_table(
        dir.path(),
        tables::ENTITIES,
        vec![("entity_id", ints(&[Some(1)]))],
    );
    let err = ParquetSource::new(dir.path()).entities().unwrap_err();
    assert!(matches!(
        err,
        Error::MissingColumn { ref table, ref column } if table == "entities" && column == "registration"
    ));
}

#[test]
fn test_missing_table_aborts_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_fleet(dir.path());
    std::fs::remove_file(dir.path().join("usage_samples.parquet")).unwrap();

    let engine = Engine::builder().build_in_memory().unwrap();
    let err = engine.forecast_batch(&ParquetSource::new(dir.path())).unwrap_err();
    assert!(matches!(err, Error::DataSource(_)));
}
