//! K-Means clustering
//!
//! k-means++ seeding from a seeded ChaCha stream, then Lloyd iterations
//! until assignments stop changing, centroids move less than `tolerance`,
//! or `max_iterations` is reached. With `n_init > 1` every restart uses
//! `seed + i` and the run with the lowest inertia wins.

use super::tfidf::squared_distance;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// K-Means parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeans {
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    seed: u64,
    n_init: usize,
}

/// Result of one fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster of every point
    pub labels: Vec<usize>,
    /// Final centroids (`k` of them)
    pub centroids: Vec<Vec<f32>>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
    /// Lloyd iterations of the winning run
    pub iterations: usize,
}

impl KMeans {
    /// K-Means with `k` clusters, seed 42, 300 iterations, one init.
    #[must_use]
    pub const fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: 300,
            tolerance: 1e-4,
            seed: 42,
            n_init: 1,
        }
    }

    /// Set max iterations
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set centroid-shift tolerance
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set seed
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set number of restarts (at least 1)
    #[must_use]
    pub const fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = if n_init == 0 { 1 } else { n_init };
        self
    }

    /// Number of clusters
    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }

    /// Fit on `points`. `k` is clamped to the number of points.
    #[must_use]
    pub fn fit(&self, points: &[Vec<f32>]) -> KMeansFit {
        let k = self.k.min(points.len());
        if k == 0 {
            return KMeansFit {
                labels: vec![0; points.len()],
                centroids: Vec::new(),
                inertia: 0.0,
                iterations: 0,
            };
        }

        let mut best: Option<KMeansFit> = None;
        for run in 0..self.n_init {
            let fit = self.fit_once(points, k, self.seed.wrapping_add(run as u64));
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }
        best.unwrap_or_else(|| self.fit_once(points, k, self.seed))
    }

    fn fit_once(&self, points: &[Vec<f32>], k: usize, seed: u64) -> KMeansFit {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut centroids = init_centroids(points, k, &mut rng);
        let mut labels: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
        let dims = points.first().map_or(0, Vec::len);

        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;

            let mut sums = vec![vec![0.0_f32; dims]; k];
            let mut counts = vec![0_usize; k];
            for (point, &c) in points.iter().zip(&labels) {
                counts[c] += 1;
                for (s, x) in sums[c].iter_mut().zip(point) {
                    *s += x;
                }
            }
            let mut shift = 0.0_f64;
            for (c, sum) in sums.into_iter().enumerate() {
                // Empty clusters keep their centroid
                if counts[c] == 0 {
                    continue;
                }
                #[allow(clippy::cast_precision_loss)]
                let updated: Vec<f32> = sum.iter().map(|s| s / counts[c] as f32).collect();
                shift += f64::from(squared_distance(&updated, &centroids[c]));
                centroids[c] = updated;
            }

            let next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
            let converged = next == labels || shift <= self.tolerance;
            labels = next;
            if converged {
                break;
            }
        }

        let inertia = points
            .iter()
            .zip(&labels)
            .map(|(p, &c)| f64::from(squared_distance(p, &centroids[c])))
            .sum();

        KMeansFit {
            labels,
            centroids,
            inertia,
            iterations,
        }
    }
}

/// k-means++: first centroid uniform, the rest proportional to D².
fn init_centroids(points: &[Vec<f32>], k: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f32>> {
    let mut chosen: Vec<usize> = Vec::with_capacity(k);
    chosen.push(rng.gen_range(0..points.len()));

    while chosen.len() < k {
        let distances: Vec<f64> = points
            .iter()
            .map(|p| {
                chosen
                    .iter()
                    .map(|&c| f64::from(squared_distance(p, &points[c])))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = distances.iter().sum();

        let pick = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            distances
                .iter()
                .position(|&d| {
                    cumulative += d;
                    d > 0.0 && cumulative >= target
                })
                .or_else(|| distances.iter().rposition(|&d| d > 0.0))
        } else {
            None
        };
        // All remaining points coincide with a centroid: take the next unused index
        let pick = pick
            .or_else(|| (0..points.len()).find(|i| !chosen.contains(i)))
            .unwrap_or(0);
        chosen.push(pick);
    }

    chosen.into_iter().map(|i| points[i].clone()).collect()
}

/// Index of the closest centroid; ties go to the lowest index.
pub(crate) fn nearest(point: &[f32], centroids: &[Vec<f32>]) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            squared_distance(point, a).total_cmp(&squared_distance(point, b))
        })
        .map_or(0, |(i, _)| i)
}
