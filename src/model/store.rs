//! Forecast model store - one cached model per (entity, part) key.
//!
//! ## Lifecycle
//!
//! - created on the first successful fit for a key
//! - replaced wholesale when the staleness policy says so
//! - never deleted here
//!
//! `get_or_refit` holds a per-key advisory lock for the whole
//! lookup/fit/persist sequence, so concurrent callers for one key train at
//! most once per staleness period. Different keys never contend.

use super::artifact::{ModelArtifact, ModelMetadata};
use super::backend::{ArtifactBackend, MemoryArtifactStore};
use super::policy::{Clock, StalenessPolicy, SystemClock};
use crate::records::PairKey;
use crate::{Error, Result};
use chrono::NaiveDate;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

/// How a model returned by the store came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Loaded from a fresh artifact
    Cached,
    /// Fitted during this call (missing or stale artifact)
    Trained,
}

/// A model handed out by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<M> {
    /// The model
    pub model: M,
    /// When it was trained
    pub trained_on: NaiveDate,
    /// Whether it was loaded or fitted
    pub provenance: Provenance,
}

/// Keyed, staleness-aware model cache over an artifact backend.
pub struct ForecastModelStore<B = MemoryArtifactStore> {
    backend: B,
    policy: StalenessPolicy,
    clock: Arc<dyn Clock>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ForecastModelStore<MemoryArtifactStore> {
    /// In-memory store with the calendar-month policy and the wall clock.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryArtifactStore::new())
    }
}

impl<B: ArtifactBackend> ForecastModelStore<B> {
    /// Create a store over `backend` with default policy and wall clock.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            policy: StalenessPolicy::default(),
            clock: Arc::new(SystemClock),
            locks: DashMap::new(),
        }
    }

    /// Use a different staleness policy.
    #[must_use]
    pub fn with_policy(mut self, policy: StalenessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a different clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the underlying backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Get the staleness policy.
    #[must_use]
    pub const fn policy(&self) -> StalenessPolicy {
        self.policy
    }

    /// Artifact key of a pair.
    ///
    /// Each id is prefixed with its byte length, so distinct pairs never
    /// share a key whatever characters the ids contain.
    #[must_use]
    pub fn artifact_key(pair: &PairKey) -> String {
        format!(
            "forecast_model_{}:{}|{}:{}",
            pair.entity_id.len(),
            pair.entity_id,
            pair.part_id.len(),
            pair.part_id
        )
    }

    /// Return the cached model for `pair`, fitting a new one with `fit_fn`
    /// when the artifact is missing, unreadable, or stale.
    ///
    /// A freshly fitted model is persisted before it is returned, stamped
    /// with the clock's current date.
    ///
    /// # Errors
    ///
    /// Returns error if `fit_fn` fails, or `Error::ModelStore` if the new
    /// artifact cannot be encoded or persisted. Nothing is written when
    /// fitting fails.
    pub fn get_or_refit<M, S, F>(&self, pair: &PairKey, series: &S, fit_fn: F) -> Result<Fetched<M>>
    where
        M: Serialize + DeserializeOwned,
        S: ?Sized,
        F: FnOnce(&S) -> Result<M>,
    {
        let key = Self::artifact_key(pair);
        let lock = self.lock_for(&key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let today = self.clock.today();
        if let Some(artifact) = self.load::<M>(&key, pair)? {
            let trained_on = artifact.metadata.last_trained();
            if !self.policy.is_stale(trained_on, today) {
                tracing::debug!(key = %key, trained_on = %trained_on, "using cached model");
                return Ok(Fetched {
                    model: artifact.model,
                    trained_on,
                    provenance: Provenance::Cached,
                });
            }
            tracing::debug!(key = %key, trained_on = %trained_on, today = %today, "model is stale");
        }

        let model = fit_fn(series)?;
        let artifact = ModelArtifact {
            metadata: ModelMetadata::new(key.clone(), pair.clone(), today),
            model,
        };
        let bytes = serde_json::to_vec(&artifact)
            .map_err(|e| Error::ModelStore(format!("failed to encode artifact {key}: {e}")))?;
        self.backend.put(&key, &bytes)?;
        tracing::info!(key = %key, trained_on = %today, "trained and stored model");

        Ok(Fetched {
            model: artifact.model,
            trained_on: today,
            provenance: Provenance::Trained,
        })
    }

    /// Metadata of the artifact stored for `pair`, if readable.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be read
    pub fn metadata(&self, pair: &PairKey) -> Result<Option<ModelMetadata>> {
        let key = Self::artifact_key(pair);
        Ok(self
            .load::<serde_json::Value>(&key, pair)?
            .map(|artifact| artifact.metadata))
    }

    /// Load and decode the artifact of `pair`.
    ///
    /// Undecodable artifacts, and artifacts recorded for another pair, count
    /// as missing.
    fn load<M: DeserializeOwned>(
        &self,
        key: &str,
        pair: &PairKey,
    ) -> Result<Option<ModelArtifact<M>>> {
        let Some(bytes) = self.backend.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_slice::<ModelArtifact<M>>(&bytes) {
            Ok(artifact) if artifact.metadata.pair() == pair => Ok(Some(artifact)),
            Ok(artifact) => {
                tracing::warn!(
                    key = %key,
                    expected = %pair,
                    found = %artifact.metadata.pair(),
                    "discarding model artifact of another pair"
                );
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "discarding unreadable model artifact");
                Ok(None)
            }
        }
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}

impl<B> std::fmt::Debug for ForecastModelStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastModelStore")
            .field("policy", &self.policy)
            .field("locked_keys", &self.locks.len())
            .finish_non_exhaustive()
    }
}
