//! Engine contract
//!
//! The engine computes embeddings and cluster assignments; this crate only
//! guards calls into it. Engines report failures as errors whose `Display`
//! text is the only information available to the classifier.
//!
//! An engine receives the full configuration mapping on construction. The
//! mapping is a superset of what any one algorithm uses, and engines must
//! ignore keys they do not understand.
//!
//! Calls are blocking and cannot be cancelled. Some engine failures
//! terminate the process and are not reported as errors at all.

#[cfg(feature = "python")]
pub mod python;

use serde_json::{Map, Value};
use std::path::Path;

/// A native dimensionality reduction / clustering engine.
pub trait Engine: Sized {
    /// Free-text engine failure
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build an unfitted handle from the configuration mapping.
    fn construct(params: &Map<String, Value>) -> Result<Self, Self::Error>;

    /// Fit on `data` and return its embedding (`n_samples x n_components`).
    fn fit_transform(&mut self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, Self::Error>;

    /// Fit on `data` and return one cluster label per row (`-1` for noise).
    fn fit_predict(&mut self, data: &[Vec<f64>]) -> Result<Vec<i64>, Self::Error>;

    /// Project unseen points with a fitted handle.
    fn transform(&self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, Self::Error>;

    /// Label unseen points with a fitted handle.
    fn predict(&self, data: &[Vec<f64>]) -> Result<Vec<i64>, Self::Error>;

    /// Persist a fitted handle. The file format is the engine's own.
    fn save(&self, path: &Path) -> Result<(), Self::Error>;

    /// Restore a handle written by [`save`](Self::save).
    fn load(path: &Path) -> Result<Self, Self::Error>;
}
