//! Staleness policy and the clock it is evaluated against.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// When a persisted model must be retrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessPolicy {
    /// Stale once the calendar (year, month) has moved past the training month.
    ///
    /// A model trained on the 31st is stale on the 1st; one trained on the
    /// 1st is fresh through the 30th.
    #[default]
    CalendarMonth,
    /// Stale once more than N days have elapsed since training.
    MaxAgeDays(u32),
}

impl StalenessPolicy {
    /// Check whether a model trained on `trained` is stale on `today`.
    #[must_use]
    pub fn is_stale(self, trained: NaiveDate, today: NaiveDate) -> bool {
        match self {
            Self::CalendarMonth => (trained.year(), trained.month()) < (today.year(), today.month()),
            Self::MaxAgeDays(days) => (today - trained).num_days() > i64::from(days),
        }
    }
}

/// Source of "today" for staleness decisions.
pub trait Clock: Send + Sync {
    /// Current calendar date.
    fn today(&self) -> NaiveDate;
}

/// Wall clock (UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock frozen at a given date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
