use thiserror::Error;

/// Errors returned by the clustering engine and session driver.
///
/// Every variant is recoverable: a driver maps it to a rejected request and
/// keeps serving.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The operation needs a dataset, but none was generated (or it is empty).
    #[error("no dataset available, generate one first")]
    NoDataset,

    /// Requested cluster count is incompatible with the dataset.
    #[error("invalid cluster count: requested {requested}, but dataset has {n_items} items")]
    InvalidK {
        /// Requested number of clusters.
        requested: usize,
        /// Number of items in the dataset.
        n_items: usize,
    },

    /// Manual seeding got a different number of centroids than `k`.
    #[error("incorrect number of manual centroids: expected {expected}, found {found}")]
    InvalidCentroidCount {
        /// The requested `k`.
        expected: usize,
        /// Number of centroids supplied.
        found: usize,
    },

    /// Assignment was attempted without any centroids.
    #[error("no centroids to assign points to")]
    NoCentroids,

    /// Every k-means++ sampling weight is zero.
    #[error("k-means++ weights are all zero")]
    DegenerateWeights,

    /// `start` was called on an engine that already holds centroids.
    #[error("clustering already started, reset first")]
    AlreadyStarted,

    /// Points have inconsistent dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
