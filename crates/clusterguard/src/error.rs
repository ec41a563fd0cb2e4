//! Error types for clusterguard.
//!
//! Three layers:
//! - [`ValidationError`]: the dataset was rejected before any engine call
//! - [`ClassifiedError`]: the engine (or a pre-flight check) failed, reinterpreted
//!   into an [`ErrorKind`] with a remediation-oriented message
//! - [`Error`]: the crate-wide error wrapping both, plus facade preconditions

use crate::config::Algorithm;
use crate::dataset::DatasetStats;
use thiserror::Error;

/// Boxed underlying engine failure kept as the source of a classified error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dataset rejected by the validator.
///
/// These are caller bugs and are never recovered locally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Container is not array-like or has no rows
    #[error("input data cannot be empty: expected a non-empty array of rows")]
    EmptyInput,

    /// A row is not itself array-like
    #[error("expected array of arrays (2D array): row {row} is not an array")]
    NotTwoDimensional { row: usize },

    /// First row has no columns
    #[error("data rows cannot be empty: row 0 has no features")]
    NoFeatures,

    /// Row length differs from the first row
    #[error("row {row} has {found} elements, expected {expected} (all rows must have the same length)")]
    InconsistentRowLength {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Element is not a number
    #[error("all values must be numeric: element at [{row}, {col}] is not a number")]
    NonNumericElement { row: usize, col: usize },

    /// Element is NaN or infinite
    #[error("element at [{row}, {col}] is not finite ({value}); remove or impute NaN/infinite values")]
    NonFiniteElement { row: usize, col: usize, value: f64 },

    /// Column count differs from the data the model was fitted on
    #[error("data has {found} features but the model was fitted on {expected}")]
    FeatureCountMismatch { expected: usize, found: usize },
}

/// Kind of a classified engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Neighbor graph construction found points with no neighbors
    IsolatedPoint,
    /// Numerical instability during optimisation
    Convergence,
    /// A parameter is incompatible with the dataset shape
    InvalidParameter,
    /// Unrecognised engine failure
    Engine,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IsolatedPoint => write!(f, "isolated point"),
            Self::Convergence => write!(f, "convergence"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::Engine => write!(f, "engine"),
        }
    }
}

/// Typed reinterpretation of an engine failure.
///
/// The message combines what happened, the dataset statistics at the time of
/// failure and one or more suggestions. The raw engine error, when there is
/// one, is preserved as [`std::error::Error::source`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    algorithm: Algorithm,
    stats: DatasetStats,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ClassifiedError {
    pub(crate) fn new(
        kind: ErrorKind,
        algorithm: Algorithm,
        stats: DatasetStats,
        message: String,
        source: Option<BoxError>,
    ) -> Self {
        Self {
            kind,
            algorithm,
            stats,
            message,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Dataset statistics captured when the failure was classified
    pub fn stats(&self) -> &DatasetStats {
        &self.stats
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Raw engine message, if the failure came from the engine
    pub fn raw_message(&self) -> Option<String> {
        self.source.as_ref().map(|e| e.to_string())
    }
}

/// Panic raised inside an engine call, caught at the facade boundary.
///
/// Carries the panic message so it can be classified like any other raw
/// engine failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct EnginePanic(String);

impl EnginePanic {
    /// Recover the message from a `catch_unwind` payload.
    pub fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast_ref::<&'static str>() {
                Some(message) => (*message).to_string(),
                None => "engine panicked with a non-string payload".to_string(),
            },
        };
        Self(message)
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Common error type for clusterguard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Dataset rejected before the engine was called
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Engine failure, classified
    #[error(transparent)]
    Classified(#[from] ClassifiedError),

    /// Bad configuration override
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation needs a fitted model
    #[error("{algorithm} model not fitted: call {hint} first")]
    NotFitted {
        algorithm: Algorithm,
        hint: &'static str,
    },

    /// Operation not offered by the algorithm
    #[error("{algorithm} does not support {operation}: {hint}")]
    Unsupported {
        algorithm: Algorithm,
        operation: &'static str,
        hint: &'static str,
    },

    /// IO error (output scope setup)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Classified kind, if this is an engine failure
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Classified(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Result type alias using clusterguard Error.
pub type Result<T> = std::result::Result<T, Error>;
