//! Session driver: one dataset plus one clustering engine.
//!
//! A [`Session`] is the unit a transport layer (HTTP handler, CLI, UI) holds per
//! user. It validates preconditions and delegates to [`KmeansEngine`]. Sessions
//! share nothing; serving several users means holding several sessions, and a
//! session must not see concurrent mutating calls (wrap it in a `Mutex` if the
//! transport is multi-threaded).

use crate::cluster::{
    check_dimensions, InitMethod, KmeansEngine, Phase, Snapshot, DEFAULT_MAX_ITER,
};
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Session parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Dimensionality of generated datasets.
    pub dim: usize,
    /// Iteration cap per run.
    pub max_iter: usize,
    /// Convergence tolerance; `0.0` means exact equality.
    pub tolerance: f32,
    /// RNG seed for dataset generation and seeding. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dim: 2,
            max_iter: DEFAULT_MAX_ITER,
            tolerance: 0.0,
            seed: None,
        }
    }
}

/// Result of [`Session::start`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Started {
    /// Seeded centroids.
    pub centroids: Vec<Vec<f32>>,
    /// Initial assignment against `centroids`.
    pub assignment: Vec<usize>,
}

/// Dataset and clustering state of one user.
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    dataset: Option<Vec<Vec<f32>>>,
    engine: KmeansEngine,
    rng: StdRng,
}

impl Session {
    /// Create a session without a dataset.
    pub fn new(config: SessionConfig) -> Self {
        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        let engine = Self::fresh_engine(&config);
        Self {
            config,
            dataset: None,
            engine,
            rng,
        }
    }

    /// Create a session over caller-supplied points.
    ///
    /// # Errors
    ///
    /// [`Error::NoDataset`] for no points, [`Error::DimensionMismatch`] if a point's
    /// dimension differs from `config.dim`, [`Error::InvalidParameter`] for
    /// non-finite coordinates.
    pub fn with_dataset(config: SessionConfig, points: Vec<Vec<f32>>) -> Result<Self> {
        let d = check_dimensions(&points)?;
        if d != config.dim {
            return Err(Error::DimensionMismatch {
                expected: config.dim,
                found: d,
            });
        }
        let mut session = Self::new(config);
        session.dataset = Some(points);
        Ok(session)
    }

    fn fresh_engine(config: &SessionConfig) -> KmeansEngine {
        KmeansEngine::new()
            .with_max_iter(config.max_iter)
            .with_tolerance(config.tolerance)
    }

    /// Replace the dataset with `num_points` uniform points in `[0, 1)^dim`.
    ///
    /// Any clustering run is discarded.
    pub fn generate_dataset(&mut self, num_points: usize) -> Result<&[Vec<f32>]> {
        if num_points == 0 {
            return Err(Error::InvalidParameter {
                name: "num_points",
                message: "must be positive",
            });
        }
        if self.config.dim == 0 {
            return Err(Error::InvalidParameter {
                name: "dim",
                message: "must be at least 1",
            });
        }

        let dim = self.config.dim;
        let rng = &mut self.rng;
        let points: Vec<Vec<f32>> = (0..num_points)
            .map(|_| (0..dim).map(|_| rng.random::<f32>()).collect())
            .collect();

        self.engine.reset();
        tracing::debug!(num_points, dim, "generated dataset");
        Ok(self.dataset.insert(points).as_slice())
    }

    /// Seed a new run, discarding any current one.
    ///
    /// On error the previous run is left untouched.
    ///
    /// # Errors
    ///
    /// [`Error::NoDataset`] without a dataset, otherwise any error of
    /// [`KmeansEngine::start`].
    pub fn start(&mut self, k: usize, method: &InitMethod) -> Result<Started> {
        let data = self.dataset.as_deref().ok_or(Error::NoDataset)?;

        let mut engine = Self::fresh_engine(&self.config);
        let snapshot = engine.start(data, k, method, &mut self.rng)?;
        self.engine = engine;

        Ok(Started {
            centroids: snapshot.centroids,
            assignment: snapshot.assignment,
        })
    }

    /// Advance the run by one iteration, seeding it first if it is empty.
    ///
    /// `k` and `method` only matter for that implicit start; a running engine
    /// keeps the parameters it was started with.
    pub fn step(&mut self, k: usize, method: &InitMethod) -> Result<Snapshot> {
        let data = self.dataset.as_deref().ok_or(Error::NoDataset)?;
        if self.engine.phase() == Phase::Empty {
            tracing::debug!(k, method = method.tag(), "step on empty session, starting run");
        }
        self.engine.step_or_start(data, k, method, &mut self.rng)
    }

    /// Drop the current run and keep the dataset.
    pub fn reset(&mut self) -> Result<&[Vec<f32>]> {
        let data = self.dataset.as_deref().ok_or(Error::NoDataset)?;
        self.engine.reset();
        tracing::debug!("session reset");
        Ok(data)
    }

    /// Current dataset.
    pub fn dataset(&self) -> Option<&[Vec<f32>]> {
        self.dataset.as_deref()
    }

    /// The clustering engine.
    pub fn engine(&self) -> &KmeansEngine {
        &self.engine
    }

    /// Session parameters.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Engine phase.
    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    /// Engine iteration.
    pub fn iteration(&self) -> usize {
        self.engine.iteration()
    }

    /// Snapshot of the current run, `None` when empty.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.engine.snapshot()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> Session {
        Session::new(SessionConfig {
            seed: Some(seed),
            ..Default::default()
        })
    }

    #[test]
    fn generate_produces_unit_square_points() {
        let mut session = seeded(1);
        let data = session.generate_dataset(50).unwrap();
        assert_eq!(data.len(), 50);
        for p in data {
            assert_eq!(p.len(), 2);
            assert!(p.iter().all(|&x| (0.0..1.0).contains(&x)));
        }
    }

    #[test]
    fn generate_rejects_zero_points() {
        let mut session = seeded(1);
        assert!(matches!(
            session.generate_dataset(0),
            Err(Error::InvalidParameter {
                name: "num_points",
                ..
            })
        ));
        assert!(session.dataset().is_none());
    }

    #[test]
    fn operations_need_a_dataset() {
        let mut session = seeded(1);
        assert_eq!(session.start(2, &InitMethod::Random), Err(Error::NoDataset));
        assert_eq!(session.step(2, &InitMethod::Random), Err(Error::NoDataset));
        assert_eq!(session.reset(), Err(Error::NoDataset));
    }

    #[test]
    fn generate_clears_the_run() {
        let mut session = seeded(2);
        session.generate_dataset(10).unwrap();
        session.start(3, &InitMethod::KmeansPlusPlus).unwrap();
        assert_eq!(session.iteration(), 1);

        session.generate_dataset(8).unwrap();
        assert_eq!(session.phase(), Phase::Empty);
        assert_eq!(session.iteration(), 0);
        assert!(session.snapshot().is_none());
    }

    #[test]
    fn failed_start_keeps_previous_run() {
        let mut session = seeded(3);
        session.generate_dataset(10).unwrap();
        let started = session.start(2, &InitMethod::Random).unwrap();

        let err = session.start(11, &InitMethod::Random).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidK {
                requested: 11,
                n_items: 10
            }
        );
        assert_eq!(session.engine().centroids(), Some(started.centroids.as_slice()));
    }

    #[test]
    fn with_dataset_checks_dimension() {
        let config = SessionConfig::default();
        assert!(Session::with_dataset(config.clone(), vec![vec![1.0, 2.0]]).is_ok());
        assert_eq!(
            Session::with_dataset(config.clone(), vec![vec![1.0, 2.0, 3.0]]).unwrap_err(),
            Error::DimensionMismatch {
                expected: 2,
                found: 3
            }
        );
        assert_eq!(
            Session::with_dataset(config, Vec::new()).unwrap_err(),
            Error::NoDataset
        );
    }

    #[test]
    fn higher_dimensional_sessions() {
        let mut session = Session::new(SessionConfig {
            dim: 3,
            seed: Some(5),
            ..Default::default()
        });
        session.generate_dataset(30).unwrap();
        let s = session.step(4, &InitMethod::FarthestFirst).unwrap();
        assert_eq!(s.centroids.len(), 4);
        assert!(s.centroids.iter().all(|c| c.len() == 3));
    }
}
