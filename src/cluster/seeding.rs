//! Initial centroid selection.
//!
//! Every strategy maps `(data, k)` to exactly `k` centroids and performs no I/O.
//! Randomness is drawn from the caller's RNG, so a seeded `StdRng` gives
//! reproducible picks.
//!
//! - **random**: `k` distinct points, drawn uniformly without replacement.
//! - **farthest-first**: a uniform first pick, then repeatedly the point whose
//!   distance to its nearest chosen centroid is largest (first occurrence wins ties).
//! - **k-means++** (Arthur & Vassilvitskii, 2007): a uniform first pick, then
//!   draws weighted by squared distance to the nearest chosen centroid.
//! - **manual**: caller-supplied centroids, used verbatim.

use super::util::squared_euclidean;
use crate::error::{Error, Result};
use rand::distr::weighted::{Error as WeightError, WeightedIndex};
use rand::distr::Distribution;
use rand::Rng;

/// How the first centroid set is chosen.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "method", content = "centroids"))]
pub enum InitMethod {
    /// Uniform sample without replacement.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "random"))]
    Random,
    /// Maximize the minimum distance to already-chosen centroids.
    #[cfg_attr(feature = "serde", serde(rename = "farthest_first"))]
    FarthestFirst,
    /// Sample proportionally to squared distance (k-means++).
    #[cfg_attr(feature = "serde", serde(rename = "kmeans++"))]
    KmeansPlusPlus,
    /// Use these centroids as-is.
    #[cfg_attr(feature = "serde", serde(rename = "manual"))]
    Manual(Vec<Vec<f32>>),
}

impl InitMethod {
    /// Parse a method tag (`random`, `farthest_first`, `kmeans++`, `manual`).
    ///
    /// `manual_centroids` is only consulted for `manual`; a missing list becomes an
    /// empty one, which seeding later rejects with [`Error::InvalidCentroidCount`].
    pub fn from_tag(tag: &str, manual_centroids: Option<Vec<Vec<f32>>>) -> Result<Self> {
        match tag {
            "random" => Ok(Self::Random),
            "farthest_first" => Ok(Self::FarthestFirst),
            "kmeans++" => Ok(Self::KmeansPlusPlus),
            "manual" => Ok(Self::Manual(manual_centroids.unwrap_or_default())),
            _ => Err(Error::InvalidParameter {
                name: "method",
                message: "expected one of random, farthest_first, kmeans++, manual",
            }),
        }
    }

    /// The method tag, as accepted by [`InitMethod::from_tag`].
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::FarthestFirst => "farthest_first",
            Self::KmeansPlusPlus => "kmeans++",
            Self::Manual(_) => "manual",
        }
    }
}

/// Choose `k` initial centroids from `data`.
///
/// # Errors
///
/// - [`Error::NoDataset`] if `data` is empty.
/// - [`Error::InvalidK`] if `k == 0` or `k > data.len()`.
/// - [`Error::InvalidCentroidCount`] if manual centroids don't number `k`.
/// - [`Error::DimensionMismatch`] if a manual centroid's dimension differs from the data.
/// - [`Error::InvalidParameter`] if a manual centroid has a non-finite coordinate.
pub fn seed<R: Rng + ?Sized>(
    data: &[Vec<f32>],
    k: usize,
    method: &InitMethod,
    rng: &mut R,
) -> Result<Vec<Vec<f32>>> {
    let n = data.len();
    if n == 0 {
        return Err(Error::NoDataset);
    }
    if k == 0 || k > n {
        return Err(Error::InvalidK {
            requested: k,
            n_items: n,
        });
    }

    let centroids = match method {
        InitMethod::Random => random(data, k, rng),
        InitMethod::FarthestFirst => farthest_first(data, k, rng),
        InitMethod::KmeansPlusPlus => kmeans_plus_plus(data, k, rng),
        InitMethod::Manual(points) => manual(data, k, points)?,
    };
    tracing::debug!(method = method.tag(), k, n, "seeded centroids");
    Ok(centroids)
}

fn random<R: Rng + ?Sized>(data: &[Vec<f32>], k: usize, rng: &mut R) -> Vec<Vec<f32>> {
    rand::seq::index::sample(rng, data.len(), k)
        .iter()
        .map(|i| data[i].clone())
        .collect()
}

fn farthest_first<R: Rng + ?Sized>(data: &[Vec<f32>], k: usize, rng: &mut R) -> Vec<Vec<f32>> {
    let first = rng.random_range(0..data.len());
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[first].clone());

    let mut nearest: Vec<f32> = data
        .iter()
        .map(|p| squared_euclidean(p, &data[first]))
        .collect();

    while centroids.len() < k {
        // Strict `>` keeps the first index among equally distant points.
        let mut best = 0;
        for (i, &d) in nearest.iter().enumerate() {
            if d > nearest[best] {
                best = i;
            }
        }
        centroids.push(data[best].clone());
        update_nearest(data, &data[best], &mut nearest);
    }
    centroids
}

fn kmeans_plus_plus<R: Rng + ?Sized>(data: &[Vec<f32>], k: usize, rng: &mut R) -> Vec<Vec<f32>> {
    let first = rng.random_range(0..data.len());
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[first].clone());

    let mut nearest: Vec<f32> = data
        .iter()
        .map(|p| squared_euclidean(p, &data[first]))
        .collect();

    while centroids.len() < k {
        let next = match weighted_draw(&nearest, rng) {
            Ok(i) => i,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    chosen = centroids.len(),
                    "k-means++ weighted draw failed, drawing uniformly"
                );
                rng.random_range(0..data.len())
            }
        };
        centroids.push(data[next].clone());
        update_nearest(data, &data[next], &mut nearest);
    }
    centroids
}

fn manual(data: &[Vec<f32>], k: usize, points: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
    if points.len() != k {
        return Err(Error::InvalidCentroidCount {
            expected: k,
            found: points.len(),
        });
    }
    let d = data[0].len();
    if let Some(bad) = points.iter().find(|p| p.len() != d) {
        return Err(Error::DimensionMismatch {
            expected: d,
            found: bad.len(),
        });
    }
    if points.iter().flatten().any(|x| !x.is_finite()) {
        return Err(Error::InvalidParameter {
            name: "manual_centroids",
            message: "coordinates must be finite",
        });
    }
    Ok(points.to_vec())
}

fn update_nearest(data: &[Vec<f32>], centroid: &[f32], nearest: &mut [f32]) {
    for (p, best) in data.iter().zip(nearest.iter_mut()) {
        let d = squared_euclidean(p, centroid);
        if d < *best {
            *best = d;
        }
    }
}

/// Draw an index with probability proportional to `weights[i]`.
///
/// Fails with [`Error::DegenerateWeights`] when every weight is zero.
pub fn weighted_draw<R: Rng + ?Sized>(weights: &[f32], rng: &mut R) -> Result<usize> {
    match WeightedIndex::<f32>::new(weights.iter()) {
        Ok(dist) => Ok(dist.sample(rng)),
        Err(WeightError::InsufficientNonZero) => Err(Error::DegenerateWeights),
        Err(e) => Err(Error::Other(format!("invalid sampling weights: {e}"))),
    }
}
