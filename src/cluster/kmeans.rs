//! K-means via Lloyd iterations, driven one step at a time.
//!
//! [`KmeansEngine`] owns the mutable clustering state (centroids, assignment,
//! iteration count) and advances it only when asked:
//!
//! ```text
//! EMPTY --start--> SEEDED --step--> STEPPING --step--> ... --> CONVERGED
//!                                                        \--> MAX_ITER_REACHED
//! ```
//!
//! `reset` returns to `EMPTY` from any phase. The engine does not own the dataset;
//! callers pass the same slice to every call of a run.
//!
//! [`Kmeans`] is the batch front end: seed, iterate to a terminal phase, return
//! a [`KmeansFit`].

use super::seeding::{seed, InitMethod};
use super::traits::Clustering;
use super::util::{check_dimensions, mean, squared_euclidean};
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Iteration cap used when none is configured.
pub const DEFAULT_MAX_ITER: usize = 100;

/// Where an engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    /// No centroids.
    Empty,
    /// Centroids chosen and points assigned, no step taken yet.
    Seeded,
    /// At least one step moved the centroids.
    Stepping,
    /// A step reproduced the previous centroids.
    Converged,
    /// The iteration cap was hit before convergence.
    MaxIterReached,
}

impl Phase {
    /// Whether further steps are no-ops.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Converged | Self::MaxIterReached)
    }
}

/// Status reported with each snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepStatus {
    /// More steps may move the centroids.
    #[cfg_attr(feature = "serde", serde(rename = "stepping"))]
    Stepping,
    /// Centroids are fixed.
    #[cfg_attr(feature = "serde", serde(rename = "converged"))]
    Converged,
    /// Stopped by the iteration cap.
    #[cfg_attr(feature = "serde", serde(rename = "max_iters"))]
    MaxIter,
}

/// A copy of the engine state after an operation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// Run status.
    pub status: StepStatus,
    /// Exactly `k` centroids; index `i` is cluster `i`.
    pub centroids: Vec<Vec<f32>>,
    /// `point_idx -> cluster_idx`, nearest centroid in `centroids`.
    pub assignment: Vec<usize>,
    /// Current iteration (1 right after seeding).
    pub iteration: usize,
}

/// Assign every point to its nearest centroid.
///
/// Ties go to the lowest centroid index.
///
/// # Errors
///
/// [`Error::NoCentroids`] if `centroids` is empty.
pub fn assign(data: &[Vec<f32>], centroids: &[Vec<f32>]) -> Result<Vec<usize>> {
    if centroids.is_empty() {
        return Err(Error::NoCentroids);
    }
    Ok(data.iter().map(|p| nearest_centroid(p, centroids)).collect())
}

fn nearest_centroid(point: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (j, c) in centroids.iter().enumerate() {
        let d = squared_euclidean(point, c);
        if d < best_dist {
            best_dist = d;
            best = j;
        }
    }
    best
}

/// Recompute centroids as the mean of their assigned points.
///
/// A cluster with no points keeps its entry from `previous`, so the result
/// always has `previous.len()` centroids in the same order.
pub fn recompute(
    data: &[Vec<f32>],
    assignment: &[usize],
    previous: &[Vec<f32>],
) -> Vec<Vec<f32>> {
    previous
        .iter()
        .enumerate()
        .map(|(j, old)| {
            let members = data
                .iter()
                .zip(assignment.iter())
                .filter(|&(_, &a)| a == j)
                .map(|(p, _)| p);
            mean(members, old.len()).unwrap_or_else(|| old.clone())
        })
        .collect()
}

#[derive(Debug, Clone)]
struct Partition {
    centroids: Vec<Vec<f32>>,
    assignment: Vec<usize>,
}

/// Resumable Lloyd iteration state.
#[derive(Debug, Clone)]
pub struct KmeansEngine {
    max_iter: usize,
    tolerance: f32,
    method: Option<InitMethod>,
    // Some iff phase != Empty.
    current: Option<Partition>,
    iteration: usize,
    phase: Phase,
}

impl KmeansEngine {
    /// Create an empty engine with `max_iter = 100` and exact convergence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration cap (at least 1, since seeding counts as iteration 1).
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    /// Set the convergence tolerance.
    ///
    /// `0.0` requires exact coordinate equality between consecutive centroid sets.
    /// A positive value accepts any step where every centroid moved at most
    /// `tolerance` (Euclidean).
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance.max(0.0);
        self
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current iteration (0 when empty).
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Configured iteration cap.
    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    /// Number of clusters of the current run.
    pub fn k(&self) -> Option<usize> {
        self.current.as_ref().map(|p| p.centroids.len())
    }

    /// Seeding method of the current run.
    pub fn method(&self) -> Option<&InitMethod> {
        self.method.as_ref()
    }

    /// Current centroids.
    pub fn centroids(&self) -> Option<&[Vec<f32>]> {
        self.current.as_ref().map(|p| p.centroids.as_slice())
    }

    /// Current assignment.
    pub fn assignment(&self) -> Option<&[usize]> {
        self.current.as_ref().map(|p| p.assignment.as_slice())
    }

    /// Snapshot of the current run, `None` when empty.
    pub fn snapshot(&self) -> Option<Snapshot> {
        let status = match self.phase {
            Phase::Empty => return None,
            Phase::Seeded | Phase::Stepping => StepStatus::Stepping,
            Phase::Converged => StepStatus::Converged,
            Phase::MaxIterReached => StepStatus::MaxIter,
        };
        self.current.as_ref().map(|p| Snapshot {
            status,
            centroids: p.centroids.clone(),
            assignment: p.assignment.clone(),
            iteration: self.iteration,
        })
    }

    /// Seed `k` centroids and assign every point. Sets iteration to 1.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] unless the engine is empty.
    /// - [`Error::NoDataset`] if `data` is empty.
    /// - [`Error::DimensionMismatch`] / [`Error::InvalidParameter`] for malformed data.
    /// - Any seeding error ([`Error::InvalidK`], [`Error::InvalidCentroidCount`]).
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        data: &[Vec<f32>],
        k: usize,
        method: &InitMethod,
        rng: &mut R,
    ) -> Result<Snapshot> {
        if self.phase != Phase::Empty {
            return Err(Error::AlreadyStarted);
        }
        check_dimensions(data)?;

        let centroids = seed(data, k, method, rng)?;
        let assignment = assign(data, &centroids)?;

        self.current = Some(Partition {
            centroids,
            assignment,
        });
        self.method = Some(method.clone());
        self.iteration = 1;
        self.phase = Phase::Seeded;
        tracing::debug!(k, method = method.tag(), n = data.len(), "kmeans run started");

        self.current_snapshot()
    }

    /// Advance one Lloyd iteration.
    ///
    /// Reassigns points to the current centroids and recomputes the means. If the
    /// means equal the current centroids, or the iteration cap is reached, the
    /// run becomes terminal and the centroids stay where they are. In a terminal
    /// phase this returns the same snapshot without doing any work.
    ///
    /// # Errors
    ///
    /// - [`Error::NoCentroids`] if the engine is empty.
    /// - [`Error::InvalidParameter`] if `data` is not the dataset the run started on.
    pub fn step(&mut self, data: &[Vec<f32>]) -> Result<Snapshot> {
        if self.phase.is_terminal() {
            return self.current_snapshot();
        }
        let current = self.current.as_ref().ok_or(Error::NoCentroids)?;
        if data.len() != current.assignment.len() {
            return Err(Error::InvalidParameter {
                name: "data",
                message: "dataset changed since the run started",
            });
        }

        let assignment = assign(data, &current.centroids)?;
        let next = recompute(data, &assignment, &current.centroids);

        if self.same_centroids(&current.centroids, &next) {
            self.phase = Phase::Converged;
            tracing::info!(iteration = self.iteration, "kmeans converged");
        } else if self.iteration >= self.max_iter {
            self.phase = Phase::MaxIterReached;
            tracing::info!(iteration = self.iteration, "kmeans hit the iteration cap");
        } else {
            let assignment = assign(data, &next)?;
            self.current = Some(Partition {
                centroids: next,
                assignment,
            });
            self.iteration += 1;
            self.phase = Phase::Stepping;
            tracing::trace!(iteration = self.iteration, "kmeans step");
            return self.current_snapshot();
        }

        if let Some(p) = self.current.as_mut() {
            p.assignment = assignment;
        }
        self.current_snapshot()
    }

    /// `start` when empty, `step` otherwise.
    ///
    /// `k` and `method` are only used for the implicit start.
    pub fn step_or_start<R: Rng + ?Sized>(
        &mut self,
        data: &[Vec<f32>],
        k: usize,
        method: &InitMethod,
        rng: &mut R,
    ) -> Result<Snapshot> {
        if self.phase == Phase::Empty {
            self.start(data, k, method, rng)
        } else {
            self.step(data)
        }
    }

    /// Step until the run is terminal.
    pub fn run(&mut self, data: &[Vec<f32>]) -> Result<Snapshot> {
        loop {
            let snapshot = self.step(data)?;
            if snapshot.status != StepStatus::Stepping {
                return Ok(snapshot);
            }
        }
    }

    /// Discard centroids and assignment; back to iteration 0.
    pub fn reset(&mut self) {
        self.current = None;
        self.method = None;
        self.iteration = 0;
        self.phase = Phase::Empty;
    }

    fn current_snapshot(&self) -> Result<Snapshot> {
        self.snapshot().ok_or(Error::NoCentroids)
    }

    fn same_centroids(&self, a: &[Vec<f32>], b: &[Vec<f32>]) -> bool {
        if self.tolerance == 0.0 {
            return a == b;
        }
        let tol2 = self.tolerance * self.tolerance;
        a.len() == b.len()
            && a.iter()
                .zip(b.iter())
                .all(|(x, y)| squared_euclidean(x, y) <= tol2)
    }
}

impl Default for KmeansEngine {
    fn default() -> Self {
        Self {
            max_iter: DEFAULT_MAX_ITER,
            tolerance: 0.0,
            method: None,
            current: None,
            iteration: 0,
            phase: Phase::Empty,
        }
    }
}

/// Batch k-means: seed, then iterate to convergence or the iteration cap.
#[derive(Debug, Clone)]
pub struct Kmeans {
    k: usize,
    init: InitMethod,
    max_iter: usize,
    tolerance: f32,
    seed: Option<u64>,
}

/// Result of [`Kmeans::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct KmeansFit {
    /// Final centroids.
    pub centroids: Vec<Vec<f32>>,
    /// Cluster index per input point.
    pub labels: Vec<usize>,
    /// Iterations performed (including seeding).
    pub iterations: usize,
    /// How the run ended.
    pub status: StepStatus,
}

impl KmeansFit {
    /// Assign new points to the nearest fitted centroid.
    pub fn predict(&self, points: &[Vec<f32>]) -> Result<Vec<usize>> {
        let d = self.centroids.first().map_or(0, Vec::len);
        if let Some(bad) = points.iter().find(|p| p.len() != d) {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: bad.len(),
            });
        }
        assign(points, &self.centroids)
    }
}

impl Kmeans {
    /// Create a k-means clusterer with random seeding and `max_iter = 100`.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            init: InitMethod::default(),
            max_iter: DEFAULT_MAX_ITER,
            tolerance: 0.0,
            seed: None,
        }
    }

    /// Set the seeding method.
    pub fn with_init(mut self, init: InitMethod) -> Self {
        self.init = init;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence tolerance (`0.0` = exact equality).
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the RNG seed for reproducible seeding.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Run to a terminal phase and return the fitted model.
    pub fn fit(&self, data: &[Vec<f32>]) -> Result<KmeansFit> {
        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        let mut engine = KmeansEngine::new()
            .with_max_iter(self.max_iter)
            .with_tolerance(self.tolerance);

        engine.start(data, self.k, &self.init, &mut rng)?;
        let snapshot = engine.run(data)?;

        Ok(KmeansFit {
            centroids: snapshot.centroids,
            labels: snapshot.assignment,
            iterations: snapshot.iteration,
            status: snapshot.status,
        })
    }
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        Ok(self.fit(data)?.labels)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vec<f32>> {
        vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![10.0, 0.0],
            vec![10.0, 1.0],
        ]
    }

    fn manual(c: &[[f32; 2]]) -> InitMethod {
        InitMethod::Manual(c.iter().map(|p| p.to_vec()).collect())
    }

    #[test]
    fn assign_needs_centroids() {
        assert_eq!(assign(&square(), &[]), Err(Error::NoCentroids));
    }

    #[test]
    fn assign_ties_go_to_lowest_index() {
        let data = vec![vec![5.0, 0.0]];
        let centroids = vec![vec![10.0, 0.0], vec![0.0, 0.0]];
        assert_eq!(assign(&data, &centroids).unwrap(), vec![0]);
    }

    #[test]
    fn recompute_keeps_empty_clusters() {
        let data = square();
        let previous = vec![vec![0.0, 0.0], vec![10.0, 0.0], vec![100.0, 100.0]];
        let assignment = assign(&data, &previous).unwrap();
        assert_eq!(assignment, vec![0, 0, 1, 1]);

        let next = recompute(&data, &assignment, &previous);
        assert_eq!(
            next,
            vec![vec![0.0, 0.5], vec![10.0, 0.5], vec![100.0, 100.0]]
        );
    }

    #[test]
    fn engine_walks_to_convergence() {
        let data = square();
        let mut rng = StdRng::seed_from_u64(3);
        let mut engine = KmeansEngine::new();
        assert_eq!(engine.phase(), Phase::Empty);
        assert!(engine.snapshot().is_none());

        let s = engine
            .start(&data, 2, &manual(&[[0.0, 0.0], [10.0, 1.0]]), &mut rng)
            .unwrap();
        assert_eq!(s.iteration, 1);
        assert_eq!(s.assignment, vec![0, 0, 1, 1]);
        assert_eq!(engine.phase(), Phase::Seeded);

        let s = engine.step(&data).unwrap();
        assert_eq!(s.status, StepStatus::Stepping);
        assert_eq!(s.centroids, vec![vec![0.0, 0.5], vec![10.0, 0.5]]);
        assert_eq!(s.iteration, 2);

        let s = engine.step(&data).unwrap();
        assert_eq!(s.status, StepStatus::Converged);
        assert_eq!(s.iteration, 2);

        let again = engine.step(&data).unwrap();
        assert_eq!(again, s);
        assert_eq!(engine.phase(), Phase::Converged);
    }

    #[test]
    fn engine_stops_at_iteration_cap() {
        let data = square();
        let mut rng = StdRng::seed_from_u64(0);
        let mut engine = KmeansEngine::new().with_max_iter(1);
        let seeded = engine
            .start(&data, 2, &manual(&[[0.0, 0.0], [10.0, 0.0]]), &mut rng)
            .unwrap();

        let s = engine.step(&data).unwrap();
        assert_eq!(s.status, StepStatus::MaxIter);
        assert_eq!(s.iteration, 1);
        assert_eq!(s.centroids, seeded.centroids);
        assert_eq!(engine.phase(), Phase::MaxIterReached);
    }

    #[test]
    fn engine_step_requires_start() {
        let mut engine = KmeansEngine::new();
        assert_eq!(engine.step(&square()), Err(Error::NoCentroids));
        assert_eq!(engine.run(&square()), Err(Error::NoCentroids));
    }

    #[test]
    fn engine_start_only_from_empty() {
        let data = square();
        let mut rng = StdRng::seed_from_u64(0);
        let mut engine = KmeansEngine::new();
        engine.start(&data, 2, &InitMethod::Random, &mut rng).unwrap();
        assert_eq!(
            engine.start(&data, 2, &InitMethod::Random, &mut rng),
            Err(Error::AlreadyStarted)
        );

        engine.reset();
        assert_eq!(engine.phase(), Phase::Empty);
        assert_eq!(engine.iteration(), 0);
        assert!(engine.centroids().is_none());
        assert!(engine.assignment().is_none());
        assert!(engine.start(&data, 2, &InitMethod::Random, &mut rng).is_ok());
    }

    #[test]
    fn engine_start_rejects_empty_data() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut engine = KmeansEngine::new();
        assert_eq!(
            engine.start(&[], 1, &InitMethod::Random, &mut rng),
            Err(Error::NoDataset)
        );
        assert_eq!(engine.phase(), Phase::Empty);
    }

    #[test]
    fn engine_keeps_k_with_empty_cluster() {
        let data = square();
        let mut rng = StdRng::seed_from_u64(0);
        let mut engine = KmeansEngine::new();
        engine
            .start(
                &data,
                3,
                &manual(&[[0.0, 0.0], [10.0, 0.0], [100.0, 100.0]]),
                &mut rng,
            )
            .unwrap();
        let s = engine.run(&data).unwrap();
        assert_eq!(s.status, StepStatus::Converged);
        assert_eq!(s.centroids.len(), 3);
        assert_eq!(s.centroids[2], vec![100.0, 100.0]);
    }

    #[test]
    fn tolerance_accepts_small_moves() {
        let data = square();
        let mut rng = StdRng::seed_from_u64(0);
        let mut engine = KmeansEngine::new().with_tolerance(1.0);
        engine
            .start(&data, 2, &manual(&[[0.0, 0.0], [10.0, 0.0]]), &mut rng)
            .unwrap();
        // Each centroid moves by 0.5, inside the tolerance.
        let s = engine.step(&data).unwrap();
        assert_eq!(s.status, StepStatus::Converged);
        assert_eq!(s.iteration, 1);
    }

    #[test]
    fn step_rejects_a_different_dataset() {
        let data = square();
        let mut rng = StdRng::seed_from_u64(0);
        let mut engine = KmeansEngine::new();
        engine.start(&data, 2, &InitMethod::Random, &mut rng).unwrap();
        assert!(matches!(
            engine.step(&data[..3]),
            Err(Error::InvalidParameter { name: "data", .. })
        ));
    }

    #[test]
    fn kmeans_fit_and_predict() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.1],
        ];
        let fit = Kmeans::new(2)
            .with_init(InitMethod::FarthestFirst)
            .with_seed(42)
            .fit(&data)
            .unwrap();
        assert_eq!(fit.status, StepStatus::Converged);
        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_ne!(fit.labels[0], fit.labels[2]);

        let labels = fit.predict(&[vec![0.2, 0.0], vec![9.0, 9.5]]).unwrap();
        assert_eq!(labels, vec![fit.labels[0], fit.labels[2]]);
        assert!(fit.predict(&[vec![1.0]]).is_err());
    }

    #[test]
    fn kmeans_clustering_trait() {
        let data = square();
        let model = Kmeans::new(2).with_seed(7);
        assert_eq!(model.n_clusters(), 2);
        let labels = model.fit_predict(&data).unwrap();
        assert_eq!(labels.len(), 4);
        assert!(labels.iter().all(|&l| l < 2));
        assert!(model.fit_predict(&[]).is_err());
    }
}
