//! Reference data access
//!
//! [`ReferenceData`] is the seam between the engine and wherever the fleet
//! tables live. Two implementations ship with the crate:
//!
//! - [`InMemorySource`]: plain vectors, for tests and embedding callers
//! - [`ParquetSource`]: one `<table>.parquet` file per table in a directory
//!
//! A load failure of any table is fatal for the run that needed it.

use crate::records::{
    EntityRow, EntityStatusRow, FailureRecord, PartInventoryRow, ReplacementHistoryRow,
    UsageSample,
};
use crate::storage::StorageEngine;
use crate::Result;
use std::path::{Path, PathBuf};

/// Read access to the fleet reference tables.
pub trait ReferenceData: Send + Sync {
    /// Part replacement history
    ///
    /// # Errors
    ///
    /// Returns error if the table cannot be loaded
    fn replacement_history(&self) -> Result<Vec<ReplacementHistoryRow>>;

    /// Entity id to registration mapping
    ///
    /// # Errors
    ///
    /// Returns error if the table cannot be loaded
    fn entities(&self) -> Result<Vec<EntityRow>>;

    /// Telemetry samples
    ///
    /// # Errors
    ///
    /// Returns error if the table cannot be loaded
    fn usage_samples(&self) -> Result<Vec<UsageSample>>;

    /// Part inventory
    ///
    /// # Errors
    ///
    /// Returns error if the table cannot be loaded
    fn part_inventory(&self) -> Result<Vec<PartInventoryRow>>;

    /// Pre-aggregated entity condition rates
    ///
    /// # Errors
    ///
    /// Returns error if the table cannot be loaded
    fn entity_status(&self) -> Result<Vec<EntityStatusRow>>;

    /// Failure reasons recorded against replacement events
    ///
    /// # Errors
    ///
    /// Returns error if the table cannot be loaded
    fn failure_records(&self) -> Result<Vec<FailureRecord>>;
}

/// Reference tables held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    /// Replacement history
    pub history: Vec<ReplacementHistoryRow>,
    /// Entities
    pub entities: Vec<EntityRow>,
    /// Telemetry
    pub samples: Vec<UsageSample>,
    /// Part inventory
    pub parts: Vec<PartInventoryRow>,
    /// Entity status
    pub statuses: Vec<EntityStatusRow>,
    /// Failure records
    pub failures: Vec<FailureRecord>,
}

impl ReferenceData for InMemorySource {
    fn replacement_history(&self) -> Result<Vec<ReplacementHistoryRow>> {
        Ok(self.history.clone())
    }

    fn entities(&self) -> Result<Vec<EntityRow>> {
        Ok(self.entities.clone())
    }

    fn usage_samples(&self) -> Result<Vec<UsageSample>> {
        Ok(self.samples.clone())
    }

    fn part_inventory(&self) -> Result<Vec<PartInventoryRow>> {
        Ok(self.parts.clone())
    }

    fn entity_status(&self) -> Result<Vec<EntityStatusRow>> {
        Ok(self.statuses.clone())
    }

    fn failure_records(&self) -> Result<Vec<FailureRecord>> {
        Ok(self
            .failures
            .iter()
            .filter(|r| !r.reason_text.trim().is_empty())
            .cloned()
            .collect())
    }
}

/// Table file names read by [`ParquetSource`].
pub mod tables {
    /// `replaced_on`, `entity_id`, `part_id`
    pub const REPLACEMENT_HISTORY: &str = "replacement_history";
    /// `entity_id`, `registration`
    pub const ENTITIES: &str = "entities";
    /// `entity_id`, `timestamp`, `speed`
    pub const USAGE_SAMPLES: &str = "usage_samples";
    /// `part_id`, `part_name`, `unit_price`, `quantity_available`
    pub const PART_INVENTORY: &str = "part_inventory";
    /// `entity_id`, `emergency_condition_rate`, `tamper_condition_rate`
    pub const ENTITY_STATUS: &str = "entity_status";
    /// `event_id`, `reason_text`, `entity_id`
    pub const FAILURE_RECORDS: &str = "failure_records";
}

/// Reference tables stored as Parquet files in one directory.
///
/// Rows with a null key or timestamp are dropped, as are failure rows with
/// blank reason text. Nullable measures stay `None`.
#[derive(Debug, Clone)]
pub struct ParquetSource {
    dir: PathBuf,
}

impl ParquetSource {
    /// Create a source over `dir`. Files are opened lazily, per call.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the table files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a table file
    #[must_use]
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.parquet"))
    }

    fn load(&self, table: &str) -> Result<StorageEngine> {
        StorageEngine::load_parquet(table, self.table_path(table))
    }
}

impl ReferenceData for ParquetSource {
    fn replacement_history(&self) -> Result<Vec<ReplacementHistoryRow>> {
        let t = self.load(tables::REPLACEMENT_HISTORY)?;
        let rows = zip3(t.timestamps("replaced_on")?, t.strings("entity_id")?, t.strings("part_id")?)
            .filter_map(|(at, entity, part)| {
                Some(ReplacementHistoryRow {
                    replaced_on: at?,
                    entity_id: entity?,
                    part_id: part?,
                })
            })
            .collect();
        Ok(rows)
    }

    fn entities(&self) -> Result<Vec<EntityRow>> {
        let t = self.load(tables::ENTITIES)?;
        let rows = t
            .strings("entity_id")?
            .into_iter()
            .zip(t.strings("registration")?)
            .filter_map(|(entity, registration)| {
                Some(EntityRow {
                    entity_id: entity?,
                    registration: registration?,
                })
            })
            .collect();
        Ok(rows)
    }

    fn usage_samples(&self) -> Result<Vec<UsageSample>> {
        let t = self.load(tables::USAGE_SAMPLES)?;
        let rows = zip3(t.strings("entity_id")?, t.timestamps("timestamp")?, t.floats("speed")?)
            .filter_map(|(entity, at, speed)| Some(UsageSample::new(entity?, at?, speed?)))
            .collect();
        Ok(rows)
    }

    fn part_inventory(&self) -> Result<Vec<PartInventoryRow>> {
        let t = self.load(tables::PART_INVENTORY)?;
        let rows = zip3(t.strings("part_id")?, t.strings("part_name")?, t.floats("unit_price")?)
            .zip(t.floats("quantity_available")?)
            .filter_map(|((part, name, price), quantity)| {
                Some(PartInventoryRow {
                    part_id: part?,
                    part_name: name.unwrap_or_default(),
                    unit_price: price,
                    quantity_available: quantity,
                })
            })
            .collect();
        Ok(rows)
    }

    fn entity_status(&self) -> Result<Vec<EntityStatusRow>> {
        let t = self.load(tables::ENTITY_STATUS)?;
        let rows = zip3(
            t.strings("entity_id")?,
            t.floats("emergency_condition_rate")?,
            t.floats("tamper_condition_rate")?,
        )
        .filter_map(|(entity, emergency, tamper)| {
            Some(EntityStatusRow {
                entity_id: entity?,
                emergency_condition_rate: emergency,
                tamper_condition_rate: tamper,
            })
        })
        .collect();
        Ok(rows)
    }

    fn failure_records(&self) -> Result<Vec<FailureRecord>> {
        let t = self.load(tables::FAILURE_RECORDS)?;
        let rows = zip3(t.strings("event_id")?, t.strings("reason_text")?, t.strings("entity_id")?)
            .filter_map(|(event, reason, entity)| {
                let reason = reason.filter(|r| !r.trim().is_empty())?;
                Some(FailureRecord::new(event?, reason, entity?))
            })
            .collect();
        Ok(rows)
    }
}

fn zip3<A, B, C>(a: Vec<A>, b: Vec<B>, c: Vec<C>) -> impl Iterator<Item = (A, B, C)> {
    a.into_iter()
        .zip(b)
        .zip(c)
        .map(|((a, b), c)| (a, b, c))
}
