//! # clusterguard
//!
//! Guard rails around a native dimensionality reduction / clustering engine.
//!
//! The engine itself (UMAP, t-SNE, PCA, K-means, HDBSCAN, ...) is an external
//! collaborator behind the [`Engine`] trait. This crate makes calling it safe:
//!
//! - **validate**: structural and numeric checks on the dataset before it
//!   reaches the engine
//! - **adjust**: rewrite parameters that are invalid for the dataset shape
//! - **silence**: redirect the process stdout/stderr around an engine call,
//!   restoring them on every exit path
//! - **classify**: turn free-text engine failures into typed, actionable errors
//! - **estimator**: the facade tying the above together around one call
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clusterguard::{Algorithm, Estimator};
//! use serde_json::json;
//!
//! let overrides = json!({ "n_neighbors": 30, "random_seed": 42 });
//! let mut umap = Estimator::<MyEngine>::new(Algorithm::Umap, overrides.as_object().cloned().unwrap_or_default())?;
//! let embedding = umap.fit_transform(&data)?;
//! ```
//!
//! ## Residual risk
//!
//! Some engine failure modes terminate the process outright and cannot be
//! caught. Validation and parameter adjustment narrow the inputs that reach
//! the engine; they do not contain such failures.

pub mod adjust;
pub mod classify;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod logging;
pub mod silence;
pub mod validate;
pub mod verbosity;

// Re-export commonly used items at crate root
pub use adjust::{Adjustment, AdjustmentReport, ParameterAdjuster};
pub use classify::ErrorClassifier;
pub use config::{Algorithm, Configuration};
pub use dataset::{DatasetStats, DatasetView, Rows};
pub use engine::Engine;
pub use error::{ClassifiedError, EnginePanic, Error, ErrorKind, Result, ValidationError};
pub use estimator::Estimator;
pub use silence::Stream;
pub use validate::{DatasetValidator, ValidationOptions};
