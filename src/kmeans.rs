//! Seeded k-means over 2-D feature points.
//!
//! k-means++ seeding from a fixed seed, then Lloyd iterations until the
//! assignment stops changing. Clusters that end up empty steal the point
//! farthest from its centroid out of a cluster with more than one member, so
//! every label in `0..k` owns at least one point whenever `k <= n`. Centroids
//! returned are always the exact means of the final assignment.

use crate::error::PipelineError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub type Point = [f64; 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KMeansConfig {
    pub seed: u64,
    pub max_iterations: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_iterations: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster label of every input point, in input order.
    pub labels: Vec<usize>,
    pub centroids: Vec<Point>,
    pub iterations: usize,
}

impl KMeansFit {
    /// Sum of squared distances from each point to its centroid.
    #[must_use]
    pub fn inertia(&self, points: &[Point]) -> f64 {
        points
            .iter()
            .zip(&self.labels)
            .map(|(p, &label)| squared_distance(p, &self.centroids[label]))
            .sum()
    }
}

/// Cluster `points` into `k` groups.
///
/// # Errors
///
/// [`PipelineError::EmptyInput`] when there are no points, and
/// [`PipelineError::InvalidConfig`] when `k` is zero or exceeds the number
/// of points.
pub fn fit(points: &[Point], k: usize, config: &KMeansConfig) -> Result<KMeansFit, PipelineError> {
    let n = points.len();
    if n == 0 {
        return Err(PipelineError::EmptyInput { stage: "kmeans" });
    }
    if k == 0 || k > n {
        return Err(PipelineError::InvalidConfig(format!(
            "cannot form {k} clusters from {n} points"
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut centroids = seed_centroids(points, k, &mut rng);
    let mut labels: Vec<usize> = Vec::new();
    let mut iterations = 0;

    for _ in 0..config.max_iterations.max(1) {
        let next: Vec<usize> = points.par_iter().map(|p| nearest(p, &centroids)).collect();
        iterations += 1;
        let converged = next == labels;
        labels = next;
        if converged {
            break;
        }
        centroids = means(points, &labels, &centroids);
    }

    repair_empty_clusters(points, &mut labels, &centroids);
    let centroids = means(points, &labels, &centroids);

    Ok(KMeansFit {
        labels,
        centroids,
        iterations,
    })
}

/// k-means++: each further centroid is drawn with probability proportional
/// to its squared distance from the closest centroid chosen so far.
fn seed_centroids(points: &[Point], k: usize, rng: &mut StdRng) -> Vec<Point> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);
    let mut distances: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = distances.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            distances
                .iter()
                .position(|&d| {
                    if d <= 0.0 {
                        return false;
                    }
                    if target < d {
                        return true;
                    }
                    target -= d;
                    false
                })
                .or_else(|| distances.iter().rposition(|&d| d > 0.0))
                .unwrap_or(0)
        } else {
            // Every point coincides with a centroid already.
            rng.gen_range(0..points.len())
        };

        let centroid = points[chosen];
        for (distance, p) in distances.iter_mut().zip(points) {
            *distance = distance.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Index of the closest centroid; ties go to the lowest index.
fn nearest(point: &Point, centroids: &[Point]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

/// Mean of each cluster. Empty clusters keep their previous centroid.
fn means(points: &[Point], labels: &[usize], previous: &[Point]) -> Vec<Point> {
    let mut sums = vec![[0.0, 0.0]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (p, &label) in points.iter().zip(labels) {
        sums[label][0] += p[0];
        sums[label][1] += p[1];
        counts[label] += 1;
    }
    sums.iter()
        .zip(&counts)
        .zip(previous)
        .map(|((sum, &count), old)| {
            if count == 0 {
                *old
            } else {
                #[allow(clippy::cast_precision_loss)]
                let count = count as f64;
                [sum[0] / count, sum[1] / count]
            }
        })
        .collect()
}

fn repair_empty_clusters(points: &[Point], labels: &mut [usize], centroids: &[Point]) {
    let mut counts = vec![0usize; centroids.len()];
    for &label in labels.iter() {
        counts[label] += 1;
    }

    for empty in 0..centroids.len() {
        if counts[empty] > 0 {
            continue;
        }
        let mut donor: Option<(usize, f64)> = None;
        for (index, p) in points.iter().enumerate() {
            let label = labels[index];
            if counts[label] < 2 {
                continue;
            }
            let distance = squared_distance(p, &centroids[label]);
            if donor.map_or(true, |(_, best)| distance > best) {
                donor = Some((index, distance));
            }
        }
        // k <= n guarantees a donor while any cluster is empty.
        if let Some((index, _)) = donor {
            counts[labels[index]] -= 1;
            labels[index] = empty;
            counts[empty] = 1;
        }
    }
}

#[must_use]
pub fn squared_distance(a: &Point, b: &Point) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Point> {
        let mut points = Vec::new();
        for i in 0..10 {
            let jitter = f64::from(i) * 0.001;
            points.push([0.1 + jitter, 0.1 + jitter]);
            points.push([0.9 - jitter, 0.1 + jitter]);
            points.push([0.5 + jitter, 0.9 - jitter]);
        }
        points
    }

    #[test]
    fn test_separates_well_spaced_blobs() {
        let points = blobs();
        let fit = fit(&points, 3, &KMeansConfig::default()).unwrap();

        // Points were interleaved blob by blob.
        for blob in 0..3 {
            let label = fit.labels[blob];
            for i in 0..10 {
                assert_eq!(fit.labels[i * 3 + blob], label);
            }
        }
        let mut distinct = fit.labels.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn test_centroids_are_cluster_means() {
        let points = blobs();
        let fit = fit(&points, 3, &KMeansConfig::default()).unwrap();
        for (label, centroid) in fit.centroids.iter().enumerate() {
            let members: Vec<&Point> = points
                .iter()
                .zip(&fit.labels)
                .filter(|(_, &l)| l == label)
                .map(|(p, _)| p)
                .collect();
            let n = members.len() as f64;
            let mean_x = members.iter().map(|p| p[0]).sum::<f64>() / n;
            let mean_y = members.iter().map(|p| p[1]).sum::<f64>() / n;
            assert!((centroid[0] - mean_x).abs() < 1e-9);
            assert!((centroid[1] - mean_y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_result() {
        let points: Vec<Point> = (0..200)
            .map(|i| {
                let x = f64::from(i);
                [(x * 0.37).sin().abs(), (x * 0.11).cos().abs()]
            })
            .collect();
        let config = KMeansConfig::default();
        let first = fit(&points, 4, &config).unwrap();
        for _ in 0..3 {
            assert_eq!(fit(&points, 4, &config).unwrap(), first);
        }
    }

    #[test]
    fn test_duplicate_points_fill_every_cluster() {
        let points = vec![[0.5, 0.5]; 5];
        let fit = fit(&points, 3, &KMeansConfig::default()).unwrap();
        for label in 0..3 {
            assert!(fit.labels.contains(&label), "label {label} is empty");
        }
        for centroid in &fit.centroids {
            assert_eq!(*centroid, [0.5, 0.5]);
        }
    }

    #[test]
    fn test_k_equal_to_n_gives_singletons() {
        let points = vec![[0.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let fit = fit(&points, 3, &KMeansConfig::default()).unwrap();
        let mut labels = fit.labels.clone();
        labels.sort_unstable();
        assert_eq!(labels, vec![0, 1, 2]);
        assert!(fit.inertia(&points) < 1e-12);
    }

    #[test]
    fn test_empty_input_is_reported() {
        let err = fit(&[], 1, &KMeansConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput { stage: "kmeans" }));
    }

    #[test]
    fn test_invalid_k_is_rejected() {
        let points = vec![[0.0, 0.0]];
        assert!(matches!(
            fit(&points, 0, &KMeansConfig::default()),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert!(matches!(
            fit(&points, 2, &KMeansConfig::default()),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_nearest_prefers_lowest_index_on_tie() {
        assert_eq!(nearest(&[0.5, 0.0], &[[0.0, 0.0], [1.0, 0.0]]), 0);
    }
}
