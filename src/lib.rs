//! Resumable k-means clustering.
//!
//! `kstep` runs Lloyd's algorithm one externally driven iteration at a time.
//!
//! - [`cluster`]: geometry, seeding strategies (random, farthest-first, k-means++,
//!   manual), and the [`KmeansEngine`] state machine.
//! - [`session`]: a per-user [`Session`] holding a dataset and an engine, with the
//!   generate / start / step / reset operations a UI or HTTP layer calls.
//!
//! Enable the `serde` feature to (de)serialize the plain data types.

#![forbid(unsafe_code)]

pub mod cluster;
pub mod error;
pub mod session;

pub use cluster::{
    Clustering, InitMethod, Kmeans, KmeansEngine, KmeansFit, Phase, Snapshot, StepStatus,
};
pub use error::{Error, Result};
pub use session::{Session, SessionConfig, Started};
