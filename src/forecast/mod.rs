//! Replacement forecasting
//!
//! - [`regression`]: trend-plus-covariates model fitted per pair
//! - [`forecaster`]: one pair, through the model store
//! - [`batch`]: every pair of the replacement history

pub mod batch;
pub mod forecaster;
pub mod regression;

pub use batch::{
    ForecastBatch, ForecastInputs, ForecastOrchestrator, ForecastQuery, ForecastRow,
    ForecastStatus, SkippedPair,
};
pub use forecaster::{ForecastResult, PerPairForecaster};
pub use regression::{CovariateTerm, Observation, TrendRegression};
