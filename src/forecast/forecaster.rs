//! Per-pair forecasting: fit (or reuse) a model and find the next date on
//! which projected usage crosses the replacement threshold.

use super::regression::{Observation, TrendRegression};
use crate::config::ForecastConfig;
use crate::model::{ArtifactBackend, ForecastModelStore, Provenance};
use crate::outcome::Outcome;
use crate::records::{Covariates, PairKey, UsageWindow};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Forecast for one (entity, part) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Entity
    pub entity_id: String,
    /// Part
    pub part_id: String,
    /// `Insufficient` below the observation threshold; otherwise the first
    /// projected date above the replacement threshold, if any
    pub prediction: Outcome<Option<DateTime<Utc>>>,
    /// Covariates at the most recent replacement
    pub covariates: Covariates,
    /// Whether the model was reused or trained (absent when not fitted)
    #[serde(skip)]
    pub provenance: Option<Provenance>,
}

impl ForecastResult {
    /// Next expected replacement, if one was predicted.
    #[must_use]
    pub fn next_expected_replacement(&self) -> Option<DateTime<Utc>> {
        self.prediction.value().copied().flatten()
    }
}

/// Fits or loads the model of one pair and projects it forward.
pub struct PerPairForecaster<'a, B> {
    store: &'a ForecastModelStore<B>,
    config: &'a ForecastConfig,
}

impl<'a, B: ArtifactBackend> PerPairForecaster<'a, B> {
    /// Create a forecaster borrowing a model store.
    #[must_use]
    pub const fn new(store: &'a ForecastModelStore<B>, config: &'a ForecastConfig) -> Self {
        Self { store, config }
    }

    /// Forecast the next replacement of `pair`.
    ///
    /// `covariates[i]` holds the covariates at `windows[i].replaced_on`.
    /// Projections hold every covariate at its most recent value.
    ///
    /// # Errors
    ///
    /// Returns error if the inputs are misaligned, the model cannot be
    /// fitted or persisted, or a future covariate is unknown. Too few
    /// observations is not an error.
    pub fn forecast(
        &self,
        pair: &PairKey,
        windows: &[UsageWindow],
        covariates: &[Covariates],
        horizon: usize,
    ) -> Result<ForecastResult> {
        if windows.len() != covariates.len() {
            return Err(Error::InvalidInput(format!(
                "{pair}: {} usage windows but {} covariate rows",
                windows.len(),
                covariates.len()
            )));
        }

        let latest = windows
            .iter()
            .zip(covariates)
            .max_by_key(|(w, _)| w.replaced_on)
            .map(|(_, c)| *c)
            .unwrap_or_default();

        let mut series: Vec<Observation> = windows
            .iter()
            .zip(covariates)
            .filter_map(|(w, c)| {
                w.usage_before_replacement
                    .filter(|u| u.is_finite())
                    .map(|usage| Observation {
                        at: w.replaced_on,
                        usage,
                        covariates: *c,
                    })
            })
            .collect();
        series.sort_by_key(|o| o.at);

        let mut result = ForecastResult {
            entity_id: pair.entity_id.clone(),
            part_id: pair.part_id.clone(),
            prediction: Outcome::insufficient(series.len(), self.config.min_observations),
            covariates: latest,
            provenance: None,
        };
        let Some(last_observed) = series.last().map(|o| o.at) else {
            return Ok(result);
        };
        if series.len() < self.config.min_observations {
            tracing::debug!(pair = %pair, observed = series.len(), "too few observations to forecast");
            return Ok(result);
        }

        let key = pair.to_string();
        let ridge = self.config.ridge_penalty;
        let fetched = self.store.get_or_refit(pair, series.as_slice(), |obs: &[Observation]| {
            TrendRegression::fit(&key, obs, ridge)
        })?;

        let future = latest.complete().map_err(|name| Error::Fit {
            key: key.clone(),
            reason: format!("covariate '{name}' unknown at last observation"),
        })?;

        let next = self.first_crossing(&fetched.model, last_observed, &future, horizon);
        result.prediction = Outcome::computed(next);
        result.provenance = Some(fetched.provenance);
        Ok(result)
    }

    /// Earliest projected step after `last` above the threshold.
    fn first_crossing(
        &self,
        model: &TrendRegression,
        last: DateTime<Utc>,
        covariates: &[f64; Covariates::COUNT],
        horizon: usize,
    ) -> Option<DateTime<Utc>> {
        let step = Duration::days(i64::from(self.config.step_days));
        let mut at = last;
        for _ in 0..horizon {
            // Stop at the end of the representable calendar
            at = at.checked_add_signed(step)?;
            let projected = model.predict(at, covariates);
            if projected > self.config.replacement_threshold {
                return Some(at);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FixedClock;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::Arc;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn window(at: DateTime<Utc>, usage: Option<f64>) -> UsageWindow {
        UsageWindow {
            entity_id: "V1".into(),
            part_id: "P1".into(),
            replaced_on: at,
            prev_replaced_on: None,
            usage_before_replacement: usage,
        }
    }

    fn full_covariates() -> Covariates {
        Covariates {
            unit_cost: Some(120.0),
            quantity_available: Some(8.0),
            emergency_rate: Some(0.02),
            tamper_rate: Some(0.0),
        }
    }

    fn store() -> ForecastModelStore {
        ForecastModelStore::in_memory().with_clock(Arc::new(FixedClock(
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        )))
    }

    #[test]
    fn test_scenario_three_points_are_fitted() {
        let store = store();
        let config = ForecastConfig::default();
        let forecaster = PerPairForecaster::new(&store, &config);
        let windows = vec![
            window(day(2024, 1, 1), Some(500.0)),
            window(day(2024, 3, 1), Some(480.0)),
            window(day(2024, 6, 1), Some(510.0)),
        ];
        let covariates = vec![full_covariates(); 3];

        let result = forecaster
            .forecast(&PairKey::new("V1", "P1"), &windows, &covariates, 60)
            .unwrap();

        assert!(!result.prediction.is_insufficient());
        assert_eq!(result.provenance, Some(Provenance::Trained));
        // Usage near 500 is far above 0.5, so the first projected day crosses
        assert_eq!(result.next_expected_replacement(), Some(day(2024, 6, 2)));
    }

    #[test]
    fn test_projection_stops_at_calendar_end() {
        let store = store();
        let config = ForecastConfig {
            step_days: u32::MAX,
            ..ForecastConfig::default()
        };
        let forecaster = PerPairForecaster::new(&store, &config);
        let windows = vec![
            window(day(2024, 1, 1), Some(500.0)),
            window(day(2024, 3, 1), Some(480.0)),
            window(day(2024, 6, 1), Some(510.0)),
        ];
        let covariates = vec![full_covariates(); 3];

        let result = forecaster
            .forecast(&PairKey::new("V1", "P1"), &windows, &covariates, 5)
            .unwrap();

        assert!(!result.prediction.is_insufficient());
        assert_eq!(result.next_expected_replacement(), None);
    }

    #[test]
    fn test_two_points_are_insufficient() {
        let store = store();
        let config = ForecastConfig::default();
        let forecaster = PerPairForecaster::new(&store, &config);
        let windows = vec![
            window(day(2024, 1, 1), None),
            window(day(2024, 2, 1), Some(10.0)),
            window(day(2024, 3, 1), Some(12.0)),
        ];

        let result = forecaster
            .forecast(&PairKey::new("V1", "P1"), &windows, &[full_covariates(); 3], 60)
            .unwrap();

        assert_eq!(result.prediction, Outcome::insufficient(2, 3));
        assert_eq!(result.next_expected_replacement(), None);
        assert!(store.backend().is_empty());
    }

    #[test]
    fn test_declining_usage_never_crosses() {
        let store = store();
        let config = ForecastConfig::default();
        let forecaster = PerPairForecaster::new(&store, &config);
        let windows = vec![
            window(day(2024, 1, 1), Some(0.3)),
            window(day(2024, 1, 11), Some(0.2)),
            window(day(2024, 1, 21), Some(0.1)),
        ];

        let result = forecaster
            .forecast(&PairKey::new("V1", "P1"), &windows, &[full_covariates(); 3], 60)
            .unwrap();

        assert_eq!(result.prediction, Outcome::computed(None));
    }

    #[test]
    fn test_rising_usage_crosses_later() {
        let store = store();
        let config = ForecastConfig::default();
        let forecaster = PerPairForecaster::new(&store, &config);
        // 0.01 per day: 0.1, 0.2, 0.3 on days 10, 20, 30; crosses 0.5 after day 50
        let windows = vec![
            window(day(2024, 1, 11), Some(0.1)),
            window(day(2024, 1, 21), Some(0.2)),
            window(day(2024, 1, 31), Some(0.3)),
        ];

        let result = forecaster
            .forecast(&PairKey::new("V1", "P1"), &windows, &[full_covariates(); 3], 60)
            .unwrap();

        assert_eq!(result.next_expected_replacement(), Some(day(2024, 2, 21)));
    }

    #[test]
    fn test_misaligned_covariates_are_rejected() {
        let store = store();
        let config = ForecastConfig::default();
        let forecaster = PerPairForecaster::new(&store, &config);
        let err = forecaster
            .forecast(
                &PairKey::new("V1", "P1"),
                &[window(day(2024, 1, 1), Some(1.0))],
                &[],
                60,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_covariate_fails_pair() {
        let store = store();
        let config = ForecastConfig::default();
        let forecaster = PerPairForecaster::new(&store, &config);
        let windows = vec![
            window(day(2024, 1, 1), Some(1.0)),
            window(day(2024, 2, 1), Some(2.0)),
            window(day(2024, 3, 1), Some(3.0)),
        ];
        let partial = Covariates {
            emergency_rate: None,
            ..full_covariates()
        };

        let err = forecaster
            .forecast(&PairKey::new("V1", "P1"), &windows, &[partial; 3], 60)
            .unwrap_err();
        assert!(err.is_transient());
    }
}
