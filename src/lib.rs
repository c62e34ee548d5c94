//! # Fleet Maintenance: Predictive Maintenance Engine
//!
//! **Version**: 0.1.0
//!
//! Two pipelines over fleet reference data:
//!
//! - **Replacement forecasting**: usage between consecutive part
//!   replacements, one cached trend model per (entity, part), next expected
//!   replacement date per pair
//! - **Failure analysis**: cluster an entity's free-text failure reasons and
//!   mine association rules between reasons recorded together
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: a failing pair stops itself, never the batch
//! - **Poka-Yoke**: "not enough data" is a tagged outcome, not an empty value
//! - **Muda elimination**: models are retrained at most once per staleness
//!   period, under a per-key lock
//!
//! ## Example Usage
//!
//! ```rust
//! use fleet_maintenance::source::InMemorySource;
//! use fleet_maintenance::Engine;
//!
//! let engine = Engine::builder().build_in_memory()?;
//! let source = InMemorySource::default();
//!
//! let batch = engine.forecast_batch(&source)?;
//! assert!(batch.is_empty());
//!
//! let analysis = engine.failure_analysis(&source, "KA-01-1234")?;
//! assert!(analysis.cluster_data.is_empty());
//! # Ok::<(), fleet_maintenance::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod failure;
pub mod forecast;
pub mod model;
pub mod outcome;
pub mod records;
pub mod source;
pub mod storage;
pub mod usage;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use outcome::Outcome;

use failure::{FailureAnalysis, FailureAnalysisOrchestrator};
use forecast::{ForecastBatch, ForecastInputs, ForecastOrchestrator};
use model::{ArtifactBackend, Clock, ForecastModelStore, FsArtifactStore, MemoryArtifactStore};
use source::ReferenceData;
use std::path::Path;
use std::sync::Arc;

/// Engine instance: configuration plus the model store.
pub struct Engine<B = MemoryArtifactStore> {
    config: EngineConfig,
    store: ForecastModelStore<B>,
}

impl Engine {
    /// Create a new engine builder
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

impl<B: ArtifactBackend> Engine<B> {
    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Model store
    #[must_use]
    pub const fn model_store(&self) -> &ForecastModelStore<B> {
        &self.store
    }

    /// Forecast every (entity, part) pair of the source.
    ///
    /// # Errors
    ///
    /// Returns error if reference data cannot be loaded; per-pair failures
    /// are reported in [`ForecastBatch::skipped`]
    pub fn forecast_batch<S: ReferenceData + ?Sized>(&self, source: &S) -> Result<ForecastBatch> {
        ForecastOrchestrator::new(&self.store, &self.config.forecast).run(source)
    }

    /// Forecast already-loaded inputs.
    #[must_use]
    pub fn forecast_inputs(&self, inputs: ForecastInputs) -> ForecastBatch {
        ForecastOrchestrator::new(&self.store, &self.config.forecast).run_inputs(inputs)
    }

    /// Analyse failures of one entity (id or registration).
    ///
    /// # Errors
    ///
    /// Returns error if reference data cannot be loaded
    pub fn failure_analysis<S: ReferenceData + ?Sized>(
        &self,
        source: &S,
        entity: &str,
    ) -> Result<FailureAnalysis> {
        FailureAnalysisOrchestrator::new(&self.config.clustering, &self.config.mining)
            .analyze(source, entity)
    }
}

impl<B> std::fmt::Debug for Engine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}

/// Engine builder
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl EngineBuilder {
    /// Set configuration
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the clock used for staleness checks (wall clock by default)
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the engine over an artifact backend
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn build<B: ArtifactBackend>(self, backend: B) -> Result<Engine<B>> {
        self.config.validate()?;
        let mut store = ForecastModelStore::new(backend).with_policy(self.config.model_store.staleness);
        if let Some(clock) = self.clock {
            store = store.with_clock(clock);
        }
        tracing::debug!(policy = ?store.policy(), "engine ready");
        Ok(Engine {
            config: self.config,
            store,
        })
    }

    /// Build with an in-memory model store
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn build_in_memory(self) -> Result<Engine> {
        self.build(MemoryArtifactStore::new())
    }

    /// Build with model artifacts persisted under `dir`
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or `dir` cannot be created
    pub fn build_with_dir<P: AsRef<Path>>(self, dir: P) -> Result<Engine<FsArtifactStore>> {
        let backend = FsArtifactStore::open(dir)?;
        self.build(backend)
    }
}
