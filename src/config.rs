//! Engine configuration
//!
//! Every threshold the pipelines use lives here rather than as a literal in
//! the algorithm code. Values come from `Default`, a JSON document, and
//! `FLEET_PM_*` environment variables, in that order of precedence (lowest
//! first).

use crate::model::StalenessPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Longest projection accepted, in days (`horizon_periods * step_days`).
pub const MAX_HORIZON_DAYS: u64 = 36_500;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Replacement forecasting
    pub forecast: ForecastConfig,
    /// Model artifact lifecycle
    pub model_store: ModelStoreConfig,
    /// Failure-reason clustering
    pub clustering: ClusteringConfig,
    /// Association-rule mining
    pub mining: MiningConfig,
}

/// Forecast settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of future steps to project
    pub horizon_periods: usize,
    /// Days between projected steps
    pub step_days: u32,
    /// Observed points required before a model is fitted
    pub min_observations: usize,
    /// Projected usage that marks the next expected replacement
    pub replacement_threshold: f64,
    /// L2 penalty added to the normal equations
    pub ridge_penalty: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_periods: 60,
            step_days: 1,
            min_observations: 3,
            replacement_threshold: 0.5,
            ridge_penalty: 1e-6,
        }
    }
}

/// Model store settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelStoreConfig {
    /// When a persisted model must be retrained
    pub staleness: StalenessPolicy,
}

/// Clustering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Records required before clustering or mining runs
    pub min_records: usize,
    /// Upper bound on the number of clusters tried
    pub max_clusters: usize,
    /// Seed for centroid initialisation
    pub seed: u64,
    /// Lloyd iterations per run
    pub max_iterations: usize,
    /// Independent initialisations per k; the lowest inertia wins
    pub n_init: usize,
    /// Centroid shift below which iteration stops
    pub tolerance: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_records: 2,
            max_clusters: 10,
            seed: 42,
            max_iterations: 300,
            n_init: 1,
            tolerance: 1e-4,
        }
    }
}

/// Rule-mining settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Minimum support for a frequent item set
    pub min_support: f64,
    /// Minimum lift for a rule to be kept
    pub min_lift: f64,
    /// Largest item set explored (`None` = unbounded)
    pub max_itemset_len: Option<usize>,
    /// Rules reported per list
    pub top_rules: usize,
    /// Transactions required before a partition is mined
    pub min_transactions: usize,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_support: 0.01,
            min_lift: 1.0,
            max_itemset_len: None,
            top_rules: 3,
            min_transactions: 2,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the document is not valid JSON or fails validation
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_json_str(&contents)
    }

    /// Apply `FLEET_PM_*` environment overrides.
    ///
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        override_from(&lookup, "FLEET_PM_HORIZON_PERIODS", &mut self.forecast.horizon_periods);
        override_from(&lookup, "FLEET_PM_STEP_DAYS", &mut self.forecast.step_days);
        override_from(&lookup, "FLEET_PM_MIN_OBSERVATIONS", &mut self.forecast.min_observations);
        override_from(
            &lookup,
            "FLEET_PM_REPLACEMENT_THRESHOLD",
            &mut self.forecast.replacement_threshold,
        );
        override_from(&lookup, "FLEET_PM_MIN_RECORDS", &mut self.clustering.min_records);
        override_from(&lookup, "FLEET_PM_MAX_CLUSTERS", &mut self.clustering.max_clusters);
        override_from(&lookup, "FLEET_PM_SEED", &mut self.clustering.seed);
        override_from(&lookup, "FLEET_PM_MIN_SUPPORT", &mut self.mining.min_support);
        override_from(&lookup, "FLEET_PM_MIN_LIFT", &mut self.mining.min_lift);
        override_from(&lookup, "FLEET_PM_TOP_RULES", &mut self.mining.top_rules);
        override_from(&lookup, "FLEET_PM_MIN_TRANSACTIONS", &mut self.mining.min_transactions);
        if let Some(days) = lookup("FLEET_PM_MAX_AGE_DAYS") {
            match days.trim().parse::<u32>() {
                Ok(days) => self.model_store.staleness = StalenessPolicy::MaxAgeDays(days),
                Err(err) => tracing::warn!(
                    variable = "FLEET_PM_MAX_AGE_DAYS",
                    value = %days,
                    error = %err,
                    "ignoring unparseable config override"
                ),
            }
        }
        self
    }

    /// Reject values that would make the pipelines meaningless.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first offending field
    pub fn validate(&self) -> Result<()> {
        if self.forecast.horizon_periods == 0 {
            return Err(Error::Config("forecast.horizon_periods must be > 0".into()));
        }
        if self.forecast.step_days == 0 {
            return Err(Error::Config("forecast.step_days must be > 0".into()));
        }
        let span = u64::try_from(self.forecast.horizon_periods)
            .unwrap_or(u64::MAX)
            .saturating_mul(u64::from(self.forecast.step_days));
        if span > MAX_HORIZON_DAYS {
            return Err(Error::Config(format!(
                "forecast.horizon_periods * forecast.step_days must be <= {MAX_HORIZON_DAYS} days"
            )));
        }
        if !self.forecast.replacement_threshold.is_finite() {
            return Err(Error::Config("forecast.replacement_threshold must be finite".into()));
        }
        if self.forecast.min_observations < 2 {
            return Err(Error::Config("forecast.min_observations must be >= 2".into()));
        }
        if !self.forecast.ridge_penalty.is_finite() || self.forecast.ridge_penalty < 0.0 {
            return Err(Error::Config("forecast.ridge_penalty must be finite and >= 0".into()));
        }
        if self.clustering.min_records < 2 {
            return Err(Error::Config("clustering.min_records must be >= 2".into()));
        }
        if self.clustering.max_clusters < 2 {
            return Err(Error::Config("clustering.max_clusters must be >= 2".into()));
        }
        if self.clustering.n_init == 0 || self.clustering.max_iterations == 0 {
            return Err(Error::Config(
                "clustering.n_init and clustering.max_iterations must be > 0".into(),
            ));
        }
        if !(self.mining.min_support > 0.0 && self.mining.min_support <= 1.0) {
            return Err(Error::Config("mining.min_support must be in (0, 1]".into()));
        }
        if !self.mining.min_lift.is_finite() || self.mining.min_lift < 0.0 {
            return Err(Error::Config("mining.min_lift must be finite and >= 0".into()));
        }
        if self.mining.max_itemset_len == Some(0) {
            return Err(Error::Config("mining.max_itemset_len must be > 0".into()));
        }
        if self.mining.min_transactions == 0 {
            return Err(Error::Config("mining.min_transactions must be > 0".into()));
        }
        Ok(())
    }
}

fn override_from<T, F>(lookup: &F, name: &str, slot: &mut T)
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(err) => tracing::warn!(
            variable = name,
            value = %raw,
            error = %err,
            "ignoring unparseable config override"
        ),
    }
}
