//! Trend regression with exogenous covariates
//!
//! `y(t) = intercept + slope·t + Σ coef_j · z_j`
//!
//! - `t` is days since the first observation divided by the history span,
//!   so the slope is "change over the observed history"
//! - `z_j` are covariates standardized with the training mean/std; a
//!   covariate that never varies in training is absorbed by the intercept
//! - `y` is scaled by its maximum absolute value before solving
//!
//! Coefficients come from the ridge-regularised normal equations
//! `(XᵀX + λI')β = Xᵀy` (intercept unpenalised), solved by Gaussian
//! elimination with partial pivoting.

use crate::records::Covariates;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MS_PER_DAY: f64 = 86_400_000.0;
const PIVOT_EPSILON: f64 = 1e-12;
const CONSTANT_EPSILON: f64 = 1e-12;

/// One training point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Replacement time
    pub at: DateTime<Utc>,
    /// Usage accumulated before the replacement
    pub usage: f64,
    /// Covariates at the replacement
    pub covariates: Covariates,
}

/// Standardisation and weight of one covariate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovariateTerm {
    /// Covariate name
    pub name: String,
    /// Training mean
    pub mean: f64,
    /// Training standard deviation (0 when constant)
    pub std: f64,
    /// Fitted coefficient (0 when constant)
    pub coef: f64,
}

/// Fitted trend-plus-covariates model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRegression {
    origin: DateTime<Utc>,
    span_days: f64,
    y_scale: f64,
    intercept: f64,
    slope: f64,
    terms: Vec<CovariateTerm>,
    observations: usize,
}

impl TrendRegression {
    /// Fit a model to observations (any order).
    ///
    /// # Errors
    ///
    /// Returns `Error::Fit` if fewer than two observations are given, a
    /// value is not finite, a covariate is missing, or the system is
    /// singular.
    pub fn fit(key: &str, observations: &[Observation], ridge: f64) -> Result<Self> {
        let fail = |reason: String| Error::Fit {
            key: key.to_string(),
            reason,
        };
        if observations.len() < 2 {
            return Err(fail(format!(
                "need at least 2 observations, got {}",
                observations.len()
            )));
        }

        let mut rows: Vec<(f64, [f64; Covariates::COUNT], f64)> =
            Vec::with_capacity(observations.len());
        let origin = observations
            .iter()
            .map(|o| o.at)
            .min()
            .ok_or_else(|| fail("empty series".into()))?;
        let last = observations.iter().map(|o| o.at).max().unwrap_or(origin);
        let span_days = (days_between(origin, last)).max(1.0);

        for obs in observations {
            if !obs.usage.is_finite() {
                return Err(fail(format!("non-finite usage at {}", obs.at)));
            }
            let covariates = obs
                .covariates
                .complete()
                .map_err(|name| fail(format!("covariate '{name}' missing at {}", obs.at)))?;
            rows.push((days_between(origin, obs.at) / span_days, covariates, obs.usage));
        }

        let y_scale = rows
            .iter()
            .map(|(_, _, y)| y.abs())
            .fold(0.0_f64, f64::max)
            .max(1.0);

        #[allow(clippy::cast_precision_loss)]
        let n = rows.len() as f64;
        let mut terms: Vec<CovariateTerm> = Covariates::NAMES
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let mean = rows.iter().map(|(_, x, _)| x[j]).sum::<f64>() / n;
                let var = rows.iter().map(|(_, x, _)| (x[j] - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                CovariateTerm {
                    name: (*name).to_string(),
                    mean,
                    std: if std > CONSTANT_EPSILON { std } else { 0.0 },
                    coef: 0.0,
                }
            })
            .collect();
        let active: Vec<usize> = terms
            .iter()
            .enumerate()
            .filter(|(_, term)| term.std > 0.0)
            .map(|(j, _)| j)
            .collect();

        // Design: [1, t, z_active...]
        let width = 2 + active.len();
        let mut xtx = vec![vec![0.0; width]; width];
        let mut xty = vec![0.0; width];
        for (t, x, y) in &rows {
            let mut row = Vec::with_capacity(width);
            row.push(1.0);
            row.push(*t);
            for &j in &active {
                row.push((x[j] - terms[j].mean) / terms[j].std);
            }
            let y = y / y_scale;
            for a in 0..width {
                xty[a] += row[a] * y;
                for b in 0..width {
                    xtx[a][b] += row[a] * row[b];
                }
            }
        }
        for (d, row) in xtx.iter_mut().enumerate().skip(1) {
            row[d] += ridge;
        }

        let beta = solve(xtx, xty).ok_or_else(|| fail("singular design matrix".into()))?;
        if beta.iter().any(|b| !b.is_finite()) {
            return Err(fail("non-finite coefficients".into()));
        }
        for (offset, &j) in active.iter().enumerate() {
            terms[j].coef = beta[2 + offset];
        }

        Ok(Self {
            origin,
            span_days,
            y_scale,
            intercept: beta[0],
            slope: beta[1],
            terms,
            observations: rows.len(),
        })
    }

    /// Predict usage at `at` with the given covariates.
    #[must_use]
    pub fn predict(&self, at: DateTime<Utc>, covariates: &[f64; Covariates::COUNT]) -> f64 {
        let t = days_between(self.origin, at) / self.span_days;
        let mut y = self.intercept + self.slope * t;
        for (term, x) in self.terms.iter().zip(covariates) {
            if term.std > 0.0 {
                y += term.coef * (x - term.mean) / term.std;
            }
        }
        y * self.y_scale
    }

    /// First observation time.
    #[must_use]
    pub const fn origin(&self) -> DateTime<Utc> {
        self.origin
    }

    /// Trend in usage units per day.
    #[must_use]
    pub fn daily_trend(&self) -> f64 {
        self.slope * self.y_scale / self.span_days
    }

    /// Covariate terms.
    #[must_use]
    pub fn terms(&self) -> &[CovariateTerm] {
        &self.terms
    }

    /// Number of observations the model was fitted on.
    #[must_use]
    pub const fn observations(&self) -> usize {
        self.observations
    }
}

#[allow(clippy::cast_precision_loss)]
fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MS_PER_DAY
}

/// Solve `a·x = b` in place; `None` if singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
