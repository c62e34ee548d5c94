//! Error types for the maintenance engine
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Insufficient data is deliberately absent from this enum: too few points to
//! forecast, cluster or mine is a normal outcome and is reported through
//! [`Outcome::Insufficient`](crate::outcome::Outcome::Insufficient).

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Maintenance engine error types
#[derive(Error, Debug)]
pub enum Error {
    /// Reference data could not be loaded (fatal for the whole run)
    #[error("Reference data unavailable: {0}\nNo partial batch was attempted")]
    DataSource(String),

    /// A reference table lacks a required column
    #[error("Table '{table}' is missing required column '{column}'")]
    MissingColumn {
        /// Table name
        table: String,
        /// Column name
        column: String,
    },

    /// A group references a row that does not exist in a reference table
    #[error("Missing {table} row for '{key}'")]
    MissingReference {
        /// Reference table name
        table: &'static str,
        /// Key that could not be resolved
        key: String,
    },

    /// Model fitting or projection failed for one key
    #[error("Model fit failed for {key}: {reason}")]
    Fit {
        /// Model key (`entity/part`)
        key: String,
        /// Failure description
        reason: String,
    },

    /// Invalid input to an operation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model artifact persistence failed
    #[error("Model store error: {0}")]
    ModelStore(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl Error {
    /// Whether the error is one of the expected per-pair failure kinds.
    ///
    /// The batch orchestrator skips a failing pair whatever its error and
    /// records this flag in the warning it logs. `false` for a skipped pair
    /// points at a bug or an environment problem rather than at the pair's
    /// data. Only errors raised while loading reference tables abort a run.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Fit { .. } | Self::MissingReference { .. } | Self::InvalidInput(_) | Self::ModelStore(_)
        )
    }
}
