//! Record shapes consumed and produced by the engine
//!
//! Consumed rows mirror the reference tables (replacement history, telemetry,
//! part inventory, entity status, failure reasons). Derived records
//! (`UsageWindow`) are immutable values passed between pure stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a tracked vehicle or asset.
pub type EntityId = String;

/// Identifier of a replaceable part type.
pub type PartId = String;

/// One recorded replacement of a part on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementEvent {
    /// Entity the part was replaced on
    pub entity_id: EntityId,
    /// Replaced part
    pub part_id: PartId,
    /// When the replacement happened
    pub replaced_on: DateTime<Utc>,
}

impl ReplacementEvent {
    /// Create a replacement event.
    #[must_use]
    pub fn new(
        entity_id: impl Into<String>,
        part_id: impl Into<String>,
        replaced_on: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            part_id: part_id.into(),
            replaced_on,
        }
    }

    /// Key of the (entity, part) group this event belongs to.
    #[must_use]
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.entity_id.clone(), self.part_id.clone())
    }
}

/// One telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    /// Entity that reported the sample
    pub entity_id: EntityId,
    /// Sample time
    pub timestamp: DateTime<Utc>,
    /// Reported speed
    pub speed: f64,
}

impl UsageSample {
    /// Create a usage sample.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, timestamp: DateTime<Utc>, speed: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp,
            speed,
        }
    }
}

/// Usage accumulated between two consecutive replacements of one part.
///
/// `usage_before_replacement` is `None` when the window is undefined (first
/// replacement of the pair) or no telemetry sample falls inside it. `None`
/// means "unknown"; `Some(0.0)` means "measured, and no usage".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    /// Entity
    pub entity_id: EntityId,
    /// Part
    pub part_id: PartId,
    /// Replacement closing the window
    pub replaced_on: DateTime<Utc>,
    /// Replacement opening the window, if any
    pub prev_replaced_on: Option<DateTime<Utc>>,
    /// Usage in `(prev_replaced_on, replaced_on]`
    pub usage_before_replacement: Option<f64>,
}

/// (entity, part) grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    /// Entity
    pub entity_id: EntityId,
    /// Part
    pub part_id: PartId,
}

impl PairKey {
    /// Create a pair key.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, part_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            part_id: part_id.into(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_id, self.part_id)
    }
}

/// Replacement history row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementHistoryRow {
    /// When the part was replaced
    pub replaced_on: DateTime<Utc>,
    /// Entity
    pub entity_id: EntityId,
    /// Part
    pub part_id: PartId,
}

impl From<ReplacementHistoryRow> for ReplacementEvent {
    fn from(row: ReplacementHistoryRow) -> Self {
        Self {
            entity_id: row.entity_id,
            part_id: row.part_id,
            replaced_on: row.replaced_on,
        }
    }
}

/// Entity identifier row (internal id to human-facing registration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRow {
    /// Entity
    pub entity_id: EntityId,
    /// Registration number shown to operators
    pub registration: String,
}

/// Telemetry row as stored.
pub type UsageSampleRow = UsageSample;

/// Part inventory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartInventoryRow {
    /// Part
    pub part_id: PartId,
    /// Display name
    pub part_name: String,
    /// Unit cost
    pub unit_price: Option<f64>,
    /// Stock on hand
    pub quantity_available: Option<f64>,
}

/// Pre-aggregated entity condition rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStatusRow {
    /// Entity
    pub entity_id: EntityId,
    /// Share of samples reporting an emergency condition
    pub emergency_condition_rate: Option<f64>,
    /// Share of samples reporting a tamper condition
    pub tamper_condition_rate: Option<f64>,
}

/// One failure reason recorded against a replacement event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Replacement event the reason was recorded for
    pub event_id: String,
    /// Free-text reason
    pub reason_text: String,
    /// Entity
    pub entity_id: EntityId,
}

impl FailureRecord {
    /// Create a failure record.
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        reason_text: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            reason_text: reason_text.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// Failure row as stored.
pub type FailureRow = FailureRecord;

/// Exogenous inputs of the forecasting model at one observation.
///
/// Fields are optional because reference rows may be missing; a fit over an
/// observation with an unknown covariate fails for that pair only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Covariates {
    /// Unit cost of the part
    pub unit_cost: Option<f64>,
    /// Stock on hand
    pub quantity_available: Option<f64>,
    /// Emergency-condition rate of the entity
    pub emergency_rate: Option<f64>,
    /// Tamper-condition rate of the entity
    pub tamper_rate: Option<f64>,
}

impl Covariates {
    /// Number of covariates fed to the model.
    pub const COUNT: usize = 4;

    /// Names, in the order of [`Covariates::values`].
    pub const NAMES: [&'static str; Self::COUNT] =
        ["unit_cost", "quantity_available", "emergency_rate", "tamper_rate"];

    /// Build from the inventory and status rows of a pair.
    #[must_use]
    pub fn from_reference(part: Option<&PartInventoryRow>, status: Option<&EntityStatusRow>) -> Self {
        Self {
            unit_cost: part.and_then(|p| p.unit_price),
            quantity_available: part.and_then(|p| p.quantity_available),
            emergency_rate: status.and_then(|s| s.emergency_condition_rate),
            tamper_rate: status.and_then(|s| s.tamper_condition_rate),
        }
    }

    /// Values in model order.
    #[must_use]
    pub const fn values(&self) -> [Option<f64>; Self::COUNT] {
        [
            self.unit_cost,
            self.quantity_available,
            self.emergency_rate,
            self.tamper_rate,
        ]
    }

    /// All values, or the name of the first missing one.
    ///
    /// # Errors
    ///
    /// Returns the name of the first covariate that is absent or not finite
    pub fn complete(&self) -> std::result::Result<[f64; Self::COUNT], &'static str> {
        let mut out = [0.0; Self::COUNT];
        for (slot, (value, name)) in out.iter_mut().zip(self.values().into_iter().zip(Self::NAMES)) {
            match value {
                Some(v) if v.is_finite() => *slot = v,
                _ => return Err(name),
            }
        }
        Ok(out)
    }
}
