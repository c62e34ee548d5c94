//! Persisted model envelope: fitted parameters plus training metadata.

use crate::records::PairKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Current envelope format.
///
/// Version 2 records the owning pair. Version 1 envelopes no longer decode
/// and are retrained on first use.
pub const FORMAT_VERSION: u32 = 2;

/// Metadata stored alongside every model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    key: String,
    pair: PairKey,
    last_trained: NaiveDate,
    format_version: u32,
}

impl ModelMetadata {
    /// Create metadata for the model of `pair` trained on `last_trained`.
    #[must_use]
    pub fn new(key: impl Into<String>, pair: PairKey, last_trained: NaiveDate) -> Self {
        Self {
            key: key.into(),
            pair,
            last_trained,
            format_version: FORMAT_VERSION,
        }
    }

    /// Get the artifact key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the (entity, part) pair the model was fitted for.
    #[must_use]
    pub const fn pair(&self) -> &PairKey {
        &self.pair
    }

    /// Get the training date.
    #[must_use]
    pub const fn last_trained(&self) -> NaiveDate {
        self.last_trained
    }

    /// Get the envelope format version.
    #[must_use]
    pub const fn format_version(&self) -> u32 {
        self.format_version
    }
}

/// Model and metadata, written and replaced as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact<M> {
    /// Training metadata
    pub metadata: ModelMetadata,
    /// Fitted model
    pub model: M,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_fields() {
        let trained = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let meta = ModelMetadata::new("forecast_V1_P1", PairKey::new("V1", "P1"), trained);
        assert_eq!(meta.key(), "forecast_V1_P1");
        assert_eq!(meta.pair(), &PairKey::new("V1", "P1"));
        assert_eq!(meta.last_trained(), trained);
        assert_eq!(meta.format_version(), FORMAT_VERSION);
    }

    #[test]
    fn test_envelope_json_shape() {
        let artifact = ModelArtifact {
            metadata: ModelMetadata::new(
                "k",
                PairKey::new("V1", "P1"),
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            ),
            model: vec![1.0f64, 2.0],
        };
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["metadata"]["last_trained"], "2024-01-05");
        assert_eq!(json["metadata"]["pair"]["part_id"], "P1");
        assert_eq!(json["model"][1], 2.0);
    }
}
