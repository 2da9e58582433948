//! Lloyd's k-means, exposed as a resumable state machine.
//!
//! ## Algorithm
//!
//! Assign each point to the nearest centroid, then move every centroid to the
//! mean of its points. Repeat until the centroids stop moving.
//!
//! **Objective**: Minimize within-cluster sum of squares:
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} ||x - μ_k||²
//! ```
//!
//! Each iteration costs `O(N·k·d)`; a run is capped at `max_iter` iterations.
//!
//! ## Seeding
//!
//! The starting centroids decide which local optimum Lloyd's algorithm lands in.
//! [`InitMethod`] offers uniform random, farthest-first, k-means++, and manual
//! centroids.
//!
//! ## Stepping
//!
//! [`KmeansEngine`] keeps the run state between calls so a caller can advance the
//! algorithm one iteration at a time (e.g. to animate it), while [`Kmeans`] runs
//! it to completion.
//!
//! ## Usage
//!
//! ```rust
//! use kstep::cluster::{Clustering, InitMethod, Kmeans, KmeansEngine, StepStatus};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let data = vec![
//!     vec![0.0, 0.0],
//!     vec![0.0, 1.0],
//!     vec![10.0, 0.0],
//!     vec![10.0, 1.0],
//! ];
//!
//! // One call, run to convergence.
//! let labels = Kmeans::new(2)
//!     .with_init(InitMethod::FarthestFirst)
//!     .with_seed(42)
//!     .fit_predict(&data)
//!     .unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//!
//! // Step by step.
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut engine = KmeansEngine::new();
//! engine.start(&data, 2, &InitMethod::FarthestFirst, &mut rng).unwrap();
//! let mut snapshot = engine.step(&data).unwrap();
//! while snapshot.status == StepStatus::Stepping {
//!     snapshot = engine.step(&data).unwrap();
//! }
//! assert_eq!(snapshot.status, StepStatus::Converged);
//! ```

mod kmeans;
mod seeding;
mod traits;
mod util;

pub use kmeans::{
    assign, recompute, Kmeans, KmeansEngine, KmeansFit, Phase, Snapshot, StepStatus,
    DEFAULT_MAX_ITER,
};
pub use seeding::{seed, weighted_draw, InitMethod};
pub use traits::Clustering;
pub use util::{euclidean, mean};
pub(crate) use util::check_dimensions;
