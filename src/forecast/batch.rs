//! Forecast batch: every (entity, part) pair of the replacement history.
//!
//! Reference tables are loaded up front; failing to load any of them aborts
//! the run. After that, each pair is forecast independently and a failing
//! pair is logged and reported in [`ForecastBatch::skipped`] while the rest
//! of the batch completes.

use super::forecaster::{ForecastResult, PerPairForecaster};
use crate::config::ForecastConfig;
use crate::model::{ArtifactBackend, ForecastModelStore};
use crate::records::{
    Covariates, EntityRow, EntityStatusRow, PairKey, PartInventoryRow, ReplacementEvent,
    ReplacementHistoryRow, UsageSample, UsageWindow,
};
use crate::source::ReferenceData;
use crate::usage::{compute_usage_windows, group_windows, last_known_usage};
use crate::{Error, Result};
use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Reference tables needed by a forecast run.
#[derive(Debug, Clone, Default)]
pub struct ForecastInputs {
    /// Replacement history
    pub history: Vec<ReplacementHistoryRow>,
    /// Entity identifiers
    pub entities: Vec<EntityRow>,
    /// Telemetry
    pub samples: Vec<UsageSample>,
    /// Part inventory
    pub parts: Vec<PartInventoryRow>,
    /// Entity condition rates
    pub statuses: Vec<EntityStatusRow>,
}

impl ForecastInputs {
    /// Load every table from a reference source.
    ///
    /// # Errors
    ///
    /// Returns the first load failure; no partial input is returned
    pub fn load<S: ReferenceData + ?Sized>(source: &S) -> Result<Self> {
        Ok(Self {
            history: source.replacement_history()?,
            entities: source.entities()?,
            samples: source.usage_samples()?,
            parts: source.part_inventory()?,
            statuses: source.entity_status()?,
        })
    }
}

/// Outcome class of a forecast row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    /// Too few usage observations to fit
    InsufficientData,
    /// Fitted, but no projected step crossed the threshold
    NoReplacementInHorizon,
    /// A replacement date was projected
    Predicted,
}

/// One row of the batch result.
///
/// Optional fields serialize as `null`; no field is ever NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    /// Entity
    pub entity_id: String,
    /// Registration number, when known
    pub registration: Option<String>,
    /// Part
    pub part_id: String,
    /// Part display name
    pub part_name: String,
    /// Next expected replacement date
    pub next_expected_replacement: Option<NaiveDate>,
    /// Unit price (2 decimals)
    pub unit_price: Option<f64>,
    /// Stock on hand (2 decimals)
    pub quantity_available: Option<f64>,
    /// Usage before the most recent replacement with known usage (2 decimals, 0 if unknown)
    pub usage_before_last_replacement: f64,
    /// Emergency-condition rate (2 decimals, 0 if unknown)
    pub emergency_condition: f64,
    /// Tamper-condition rate (2 decimals, 0 if unknown)
    pub tamper_condition: f64,
    /// Outcome class
    pub status: ForecastStatus,
}

/// A pair excluded from the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPair {
    /// Entity
    pub entity_id: String,
    /// Part
    pub part_id: String,
    /// Why it was skipped
    pub error: String,
}

/// Result of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastBatch {
    /// Successful rows, in (entity, part) order
    pub rows: Vec<ForecastRow>,
    /// Pairs whose forecast failed
    pub skipped: Vec<SkippedPair>,
}

impl ForecastBatch {
    /// Check if no row was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows matching a query.
    #[must_use]
    pub fn select(&self, query: &ForecastQuery) -> Vec<ForecastRow> {
        self.rows.iter().filter(|r| query.matches(r)).cloned().collect()
    }
}

/// Filter over batch rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForecastQuery {
    /// Entity id or registration number
    pub entity: Option<String>,
    /// Part name, case-insensitive
    pub part_name: Option<String>,
}

impl ForecastQuery {
    /// Check if a row matches every set criterion.
    #[must_use]
    pub fn matches(&self, row: &ForecastRow) -> bool {
        let entity_ok = self.entity.as_deref().map_or(true, |e| {
            row.entity_id == e || row.registration.as_deref() == Some(e)
        });
        let part_ok = self
            .part_name
            .as_deref()
            .map_or(true, |p| row.part_name.to_lowercase() == p.to_lowercase());
        entity_ok && part_ok
    }
}

/// Runs the forecaster over every pair of the replacement history.
pub struct ForecastOrchestrator<'a, B> {
    forecaster: PerPairForecaster<'a, B>,
    config: &'a ForecastConfig,
}

impl<'a, B: ArtifactBackend> ForecastOrchestrator<'a, B> {
    /// Create an orchestrator over a model store.
    #[must_use]
    pub const fn new(store: &'a ForecastModelStore<B>, config: &'a ForecastConfig) -> Self {
        Self {
            forecaster: PerPairForecaster::new(store, config),
            config,
        }
    }

    /// Load reference data and forecast every pair.
    ///
    /// # Errors
    ///
    /// Returns error only if reference data cannot be loaded
    pub fn run<S: ReferenceData + ?Sized>(&self, source: &S) -> Result<ForecastBatch> {
        let inputs = ForecastInputs::load(source)?;
        Ok(self.run_inputs(inputs))
    }

    /// Forecast every pair of already-loaded inputs.
    #[must_use]
    pub fn run_inputs(&self, inputs: ForecastInputs) -> ForecastBatch {
        let ForecastInputs {
            history,
            entities,
            samples,
            parts,
            statuses,
        } = inputs;

        let registrations: FxHashMap<&str, &str> = entities
            .iter()
            .map(|e| (e.entity_id.as_str(), e.registration.as_str()))
            .collect();
        let parts_by_id: FxHashMap<&str, &PartInventoryRow> =
            parts.iter().map(|p| (p.part_id.as_str(), p)).collect();
        let status_by_entity: FxHashMap<&str, &EntityStatusRow> =
            statuses.iter().map(|s| (s.entity_id.as_str(), s)).collect();

        let events: Vec<ReplacementEvent> = history.into_iter().map(Into::into).collect();
        let groups = group_windows(compute_usage_windows(&events, &samples));
        tracing::debug!(pairs = groups.len(), events = events.len(), "forecasting batch");

        let context = PairContext {
            registrations: &registrations,
            parts: &parts_by_id,
            statuses: &status_by_entity,
        };
        let outcomes = self.forecast_groups(&groups, &context);

        let mut batch = ForecastBatch::default();
        for ((key, _), outcome) in groups.iter().zip(outcomes) {
            match outcome {
                Ok(row) => batch.rows.push(row),
                Err(err) => {
                    tracing::warn!(
                        entity_id = %key.entity_id,
                        part_id = %key.part_id,
                        error = %err,
                        transient = err.is_transient(),
                        "skipping pair"
                    );
                    batch.skipped.push(SkippedPair {
                        entity_id: key.entity_id.clone(),
                        part_id: key.part_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        batch
    }

    #[cfg(feature = "rayon")]
    fn forecast_groups(
        &self,
        groups: &[(PairKey, Vec<UsageWindow>)],
        context: &PairContext<'_>,
    ) -> Vec<Result<ForecastRow>> {
        use rayon::prelude::*;
        groups
            .par_iter()
            .map(|(key, windows)| self.forecast_pair(key, windows, context))
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    fn forecast_groups(
        &self,
        groups: &[(PairKey, Vec<UsageWindow>)],
        context: &PairContext<'_>,
    ) -> Vec<Result<ForecastRow>> {
        groups
            .iter()
            .map(|(key, windows)| self.forecast_pair(key, windows, context))
            .collect()
    }

    fn forecast_pair(
        &self,
        key: &PairKey,
        windows: &[UsageWindow],
        context: &PairContext<'_>,
    ) -> Result<ForecastRow> {
        let part = context
            .parts
            .get(key.part_id.as_str())
            .copied()
            .ok_or_else(|| Error::MissingReference {
                table: "part_inventory",
                key: key.part_id.clone(),
            })?;
        let status = context.statuses.get(key.entity_id.as_str()).copied();
        let covariates = vec![Covariates::from_reference(Some(part), status); windows.len()];

        let result =
            self.forecaster
                .forecast(key, windows, &covariates, self.config.horizon_periods)?;

        Ok(build_row(
            &result,
            context.registrations.get(key.entity_id.as_str()).copied(),
            part,
            status,
            last_known_usage(windows),
        ))
    }
}

/// Lookups shared by every pair of a run.
struct PairContext<'r> {
    registrations: &'r FxHashMap<&'r str, &'r str>,
    parts: &'r FxHashMap<&'r str, &'r PartInventoryRow>,
    statuses: &'r FxHashMap<&'r str, &'r EntityStatusRow>,
}

fn build_row(
    result: &ForecastResult,
    registration: Option<&str>,
    part: &PartInventoryRow,
    status: Option<&EntityStatusRow>,
    last_usage: Option<f64>,
) -> ForecastRow {
    let next = result.next_expected_replacement();
    let status_class = match (result.prediction.is_insufficient(), next) {
        (true, _) => ForecastStatus::InsufficientData,
        (false, Some(_)) => ForecastStatus::Predicted,
        (false, None) => ForecastStatus::NoReplacementInHorizon,
    };
    ForecastRow {
        entity_id: result.entity_id.clone(),
        registration: registration.map(str::to_string),
        part_id: result.part_id.clone(),
        part_name: part.part_name.clone(),
        next_expected_replacement: next.map(|d| d.date_naive()),
        unit_price: round2_opt(part.unit_price),
        quantity_available: round2_opt(part.quantity_available),
        usage_before_last_replacement: round2_opt(last_usage).unwrap_or(0.0),
        emergency_condition: round2_opt(status.and_then(|s| s.emergency_condition_rate))
            .unwrap_or(0.0),
        tamper_condition: round2_opt(status.and_then(|s| s.tamper_condition_rate))
            .unwrap_or(0.0),
        status: status_class,
    }
}

/// Round to 2 decimals; non-finite values become `None`.
fn round2_opt(value: Option<f64>) -> Option<f64> {
    value
        .filter(|v| v.is_finite())
        .map(|v| (v * 100.0).round() / 100.0)
}
