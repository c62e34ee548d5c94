//! Tagged results that keep "not enough data" apart from "computed, but empty".

use serde::{Deserialize, Serialize};

/// Result of an analysis step that may lack enough input to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// Fewer inputs than the step requires.
    Insufficient {
        /// Number of usable inputs observed
        observed: usize,
        /// Minimum number of inputs the step needs
        required: usize,
    },
    /// The step ran; the value may itself be empty.
    Computed {
        /// Computed value
        value: T,
    },
}

impl<T> Outcome<T> {
    /// Wrap a computed value.
    pub const fn computed(value: T) -> Self {
        Self::Computed { value }
    }

    /// Build an `Insufficient` outcome.
    #[must_use]
    pub const fn insufficient(observed: usize, required: usize) -> Self {
        Self::Insufficient { observed, required }
    }

    /// Check if the step was skipped for lack of data.
    #[must_use]
    pub const fn is_insufficient(&self) -> bool {
        matches!(self, Self::Insufficient { .. })
    }

    /// Borrow the computed value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Computed { value } => Some(value),
            Self::Insufficient { .. } => None,
        }
    }

    /// Take the computed value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Computed { value } => Some(value),
            Self::Insufficient { .. } => None,
        }
    }

    /// Map the computed value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Computed { value } => Outcome::Computed { value: f(value) },
            Self::Insufficient { observed, required } => Outcome::Insufficient { observed, required },
        }
    }
}

impl<T: Default> Outcome<T> {
    /// Computed value, or `T::default()` when the step was skipped.
    pub fn unwrap_or_default(self) -> T {
        self.into_value().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_has_no_value() {
        let outcome: Outcome<Vec<u8>> = Outcome::insufficient(1, 2);
        assert!(outcome.is_insufficient());
        assert!(outcome.value().is_none());
        assert!(outcome.unwrap_or_default().is_empty());
    }

    #[test]
    fn test_computed_empty_is_distinct_from_insufficient() {
        let empty: Outcome<Vec<u8>> = Outcome::computed(Vec::new());
        assert!(!empty.is_insufficient());
        assert_eq!(empty.value(), Some(&Vec::new()));
        assert_ne!(empty, Outcome::insufficient(0, 2));
    }

    #[test]
    fn test_map_preserves_insufficient_counts() {
        let outcome: Outcome<u32> = Outcome::insufficient(2, 3);
        assert_eq!(outcome.map(|v| v * 2), Outcome::insufficient(2, 3));
        assert_eq!(Outcome::computed(4).map(|v| v * 2), Outcome::computed(8));
    }

    #[test]
    fn test_serializes_with_status_tag() {
        let json = serde_json::to_value(Outcome::<u32>::insufficient(1, 3)).unwrap();
        assert_eq!(json["status"], "insufficient");
        assert_eq!(json["required"], 3);
    }
}
