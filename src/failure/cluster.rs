//! Failure reason clustering with silhouette-driven choice of k.

use super::kmeans::KMeans;
use super::silhouette::silhouette_score;
use super::tfidf::TfIdf;
use crate::config::ClusteringConfig;
use crate::outcome::Outcome;
use serde::{Deserialize, Serialize};

/// One reported cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster id
    pub cluster: usize,
    /// Number of member reasons
    pub cluster_size: usize,
    /// Most frequent member reason (first seen on ties)
    pub highlight: String,
}

/// Chosen partition of the reasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    /// Non-empty clusters in ascending id order
    pub clusters: Vec<Cluster>,
    /// Silhouette of the chosen partition
    pub best_score: f64,
    /// Number of clusters requested for the chosen partition
    pub best_k: usize,
    /// Cluster id of every input reason, in input order
    pub labels: Vec<usize>,
    /// Every `(k, silhouette)` tried, in order
    pub evaluated: Vec<(usize, f64)>,
}

/// Groups free-text failure reasons.
#[derive(Debug, Clone, Copy)]
pub struct FailureClusterer<'a> {
    config: &'a ClusteringConfig,
}

impl<'a> FailureClusterer<'a> {
    /// Create a clusterer.
    #[must_use]
    pub const fn new(config: &'a ClusteringConfig) -> Self {
        Self { config }
    }

    /// Candidate k values for `n` reasons: `2..=min(max_clusters, n - 1)`.
    #[must_use]
    pub fn candidate_ks(&self, n: usize) -> std::ops::RangeInclusive<usize> {
        2..=self.config.max_clusters.min(n.saturating_sub(1))
    }

    /// Cluster `reasons`.
    ///
    /// Below `min_records` reasons the result is `Insufficient`. When no k
    /// fits (n < 3) every reason lands in cluster 0 with score 0.0.
    #[must_use]
    pub fn cluster<S: AsRef<str>>(&self, reasons: &[S]) -> Outcome<Clustering> {
        let n = reasons.len();
        let required = self.config.min_records.max(1);
        if n < required {
            return Outcome::insufficient(n, required);
        }

        let vectors = TfIdf::fit_transform(reasons).into_vectors();
        let mut evaluated = Vec::new();
        let mut best: Option<(usize, Vec<usize>, f64)> = None;

        for k in self.candidate_ks(n) {
            let fit = KMeans::new(k)
                .with_seed(self.config.seed)
                .with_max_iterations(self.config.max_iterations)
                .with_n_init(self.config.n_init)
                .with_tolerance(self.config.tolerance)
                .fit(&vectors);
            let score = silhouette_score(&vectors, &fit.labels);
            tracing::debug!(k, score, iterations = fit.iterations, "evaluated clustering");
            evaluated.push((k, score));
            if best.as_ref().map_or(true, |(_, _, s)| score > *s) {
                best = Some((k, fit.labels, score));
            }
        }

        let (best_k, labels, best_score) = best.unwrap_or_else(|| {
            tracing::debug!(reasons = n, "too few reasons to compare k, using one cluster");
            (1, vec![0; n], 0.0)
        });

        Outcome::computed(Clustering {
            clusters: summarize(reasons, &labels),
            best_score,
            best_k,
            labels,
            evaluated,
        })
    }
}

/// Size and highlight of every non-empty cluster.
fn summarize<S: AsRef<str>>(reasons: &[S], labels: &[usize]) -> Vec<Cluster> {
    let cluster_count = labels.iter().max().map_or(0, |m| m + 1);
    (0..cluster_count)
        .filter_map(|c| {
            // (reason, count) in first-seen order
            let mut counts: Vec<(&str, usize)> = Vec::new();
            for (reason, _) in reasons.iter().zip(labels).filter(|(_, l)| **l == c) {
                let reason = reason.as_ref();
                match counts.iter_mut().find(|(r, _)| *r == reason) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((reason, 1)),
                }
            }
            let size = counts.iter().map(|(_, n)| n).sum();
            let top = counts
                .iter()
                .fold(None::<(&str, usize)>, |best, &(r, n)| match best {
                    Some((_, m)) if m >= n => best,
                    _ => Some((r, n)),
                })?;
            Some(Cluster {
                cluster: c,
                cluster_size: size,
                highlight: top.0.to_string(),
            })
        })
        .collect()
}
