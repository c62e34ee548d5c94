//! Mean silhouette coefficient (Euclidean)
//!
//! `s(i) = (b - a) / max(a, b)` where `a` is the mean distance to the other
//! members of the point's cluster and `b` the smallest mean distance to
//! another cluster. A point alone in its cluster scores 0.

use super::tfidf::squared_distance;

/// Mean silhouette over all points.
///
/// Returns 0.0 when the labels form fewer than 2 clusters or every point
/// is its own cluster.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn silhouette_score(points: &[Vec<f32>], labels: &[usize]) -> f64 {
    let n = points.len().min(labels.len());
    let cluster_count = labels.iter().take(n).max().map_or(0, |m| m + 1);
    let mut sizes = vec![0_usize; cluster_count];
    for &l in &labels[..n] {
        sizes[l] += 1;
    }
    let distinct = sizes.iter().filter(|&&s| s > 0).count();
    if distinct < 2 || distinct == n {
        return 0.0;
    }

    let distance = |i: usize, j: usize| f64::from(squared_distance(&points[i], &points[j])).sqrt();

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];
        if sizes[own] <= 1 {
            continue;
        }
        let mut sums = vec![0.0_f64; cluster_count];
        for j in 0..n {
            if i != j {
                sums[labels[j]] += distance(i, j);
            }
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..cluster_count)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    total / n as f64
}
