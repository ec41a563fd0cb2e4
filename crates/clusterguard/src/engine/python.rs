//! Python engine backend using PyO3
//!
//! Runs the algorithms from `umap-learn` and `scikit-learn` in an embedded
//! interpreter. Each algorithm picks the keyword arguments it understands
//! from the configuration mapping; the rest of the mapping is ignored.
//!
//! Python exceptions surface as [`PythonEngineError::Python`] carrying the
//! exception text, which is what the classifier matches on.

use super::Engine;
use crate::config::Algorithm;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PythonEngineError {
    /// Exception raised by the Python side
    #[error("{0}")]
    Python(String),

    #[error("the python engine has no backend for {0}")]
    Unsupported(Algorithm),

    #[error("invalid engine parameters: {0}")]
    Params(String),
}

impl From<PyErr> for PythonEngineError {
    fn from(e: PyErr) -> Self {
        Self::Python(e.to_string())
    }
}

/// Python class backing one algorithm.
struct Backend {
    module: &'static str,
    class: &'static str,
    /// (mapping key, python keyword)
    kwargs: &'static [(&'static str, &'static str)],
    /// Fixed keyword arguments
    fixed: &'static [(&'static str, &'static str)],
}

fn backend(algorithm: Algorithm) -> Option<Backend> {
    let backend = match algorithm {
        Algorithm::Umap => Backend {
            module: "umap",
            class: "UMAP",
            kwargs: &[
                ("n_neighbors", "n_neighbors"),
                ("n_components", "n_components"),
                ("min_dist", "min_dist"),
                ("metric", "metric"),
                ("learning_rate", "learning_rate"),
                ("max_iter", "n_epochs"),
                ("random_seed", "random_state"),
            ],
            fixed: &[],
        },
        Algorithm::Tsne => Backend {
            module: "sklearn.manifold",
            class: "TSNE",
            kwargs: &[
                ("n_components", "n_components"),
                ("perplexity", "perplexity"),
                ("learning_rate", "learning_rate"),
                ("max_iter", "max_iter"),
                ("metric", "metric"),
                ("random_seed", "random_state"),
            ],
            fixed: &[],
        },
        Algorithm::DiffusionMap => Backend {
            module: "sklearn.manifold",
            class: "SpectralEmbedding",
            kwargs: &[
                ("n_components", "n_components"),
                ("n_neighbors", "n_neighbors"),
                ("random_seed", "random_state"),
            ],
            fixed: &[("affinity", "nearest_neighbors")],
        },
        Algorithm::Pca => Backend {
            module: "sklearn.decomposition",
            class: "PCA",
            kwargs: &[
                ("n_components", "n_components"),
                ("random_seed", "random_state"),
            ],
            fixed: &[],
        },
        Algorithm::KMeans => Backend {
            module: "sklearn.cluster",
            class: "KMeans",
            kwargs: &[
                ("n_clusters", "n_clusters"),
                ("max_iter", "max_iter"),
                ("random_seed", "random_state"),
            ],
            fixed: &[],
        },
        Algorithm::Hdbscan => Backend {
            module: "sklearn.cluster",
            class: "HDBSCAN",
            kwargs: &[
                ("min_cluster_size", "min_cluster_size"),
                ("min_samples", "min_samples"),
                ("metric", "metric"),
            ],
            fixed: &[],
        },
        Algorithm::LargeVis => return None,
    };
    Some(backend)
}

/// Fitted or unfitted Python estimator object.
pub struct PythonEngine {
    algorithm: Algorithm,
    model: Py<PyAny>,
}

impl PythonEngine {
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn call_rows(&self, method: &str, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, PythonEngineError> {
        run(|py| {
            let array = to_numpy(py, data)?;
            let result = self.model.bind(py).call_method1(method, (array,))?;
            Ok(result.call_method0("tolist")?.extract()?)
        })
    }

    fn call_labels(&self, method: &str, data: &[Vec<f64>]) -> Result<Vec<i64>, PythonEngineError> {
        run(|py| {
            let array = to_numpy(py, data)?;
            let result = self.model.bind(py).call_method1(method, (array,))?;
            Ok(result.call_method0("tolist")?.extract()?)
        })
    }
}

impl Engine for PythonEngine {
    type Error = PythonEngineError;

    fn construct(params: &Map<String, Value>) -> Result<Self, Self::Error> {
        let algorithm: Algorithm = params
            .get("algorithm")
            .and_then(Value::as_str)
            .ok_or_else(|| PythonEngineError::Params("missing 'algorithm'".to_string()))?
            .parse()
            .map_err(|e: crate::Error| PythonEngineError::Params(e.to_string()))?;
        let backend = backend(algorithm).ok_or(PythonEngineError::Unsupported(algorithm))?;

        let model = run(|py| {
            let module = py.import(backend.module)?;
            let kwargs = PyDict::new(py);
            for (key, py_key) in backend.kwargs {
                set_kwarg(&kwargs, params, key, py_key)?;
            }
            for (py_key, value) in backend.fixed {
                kwargs.set_item(*py_key, *value)?;
            }
            let model = module.getattr(backend.class)?.call((), Some(&kwargs))?;
            Ok(model.unbind())
        })?;

        Ok(Self { algorithm, model })
    }

    fn fit_transform(&mut self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, Self::Error> {
        self.call_rows("fit_transform", data)
    }

    fn fit_predict(&mut self, data: &[Vec<f64>]) -> Result<Vec<i64>, Self::Error> {
        self.call_labels("fit_predict", data)
    }

    fn transform(&self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, Self::Error> {
        self.call_rows("transform", data)
    }

    fn predict(&self, data: &[Vec<f64>]) -> Result<Vec<i64>, Self::Error> {
        self.call_labels("predict", data)
    }

    fn save(&self, path: &Path) -> Result<(), Self::Error> {
        let path = path.to_string_lossy().into_owned();
        run(|py| {
            let pickle = py.import("pickle")?;
            let builtins = py.import("builtins")?;

            let state = PyDict::new(py);
            state.set_item("algorithm", self.algorithm.as_str())?;
            state.set_item("model", self.model.bind(py))?;

            let file = builtins.call_method1("open", (path.as_str(), "wb"))?;
            let dumped = pickle.call_method1("dump", (&state, &file));
            file.call_method0("close")?;
            dumped?;
            Ok(())
        })
    }

    fn load(path: &Path) -> Result<Self, Self::Error> {
        let path = path.to_string_lossy().into_owned();
        let (name, model) = run(|py| {
            let pickle = py.import("pickle")?;
            let builtins = py.import("builtins")?;

            let file = builtins.call_method1("open", (path.as_str(), "rb"))?;
            let loaded = pickle.call_method1("load", (&file,));
            file.call_method0("close")?;
            let state = loaded?;

            let name: String = state.get_item("algorithm")?.extract()?;
            let model = state.get_item("model")?.unbind();
            Ok((name, model))
        })?;

        let algorithm: Algorithm = name
            .parse()
            .map_err(|e: crate::Error| PythonEngineError::Params(e.to_string()))?;
        Ok(Self { algorithm, model })
    }
}

/// Run `body` holding the GIL, then flush Python's own stdio buffers.
///
/// Python buffers `sys.stdout` / `sys.stderr` above the file descriptors, so
/// anything the model printed must be pushed out before the caller restores
/// the descriptors.
fn run<T, F>(body: F) -> Result<T, PythonEngineError>
where
    F: for<'py> FnOnce(Python<'py>) -> Result<T, PythonEngineError>,
{
    Python::with_gil(|py| {
        let result = body(py);
        flush_python_stdio(py);
        result
    })
}

fn flush_python_stdio(py: Python<'_>) {
    let flushed = py.import("sys").and_then(|sys| {
        for name in ["stdout", "stderr"] {
            let stream = sys.getattr(name)?;
            if !stream.is_none() {
                stream.call_method0("flush")?;
            }
        }
        Ok(())
    });
    if let Err(e) = flushed {
        debug!("failed to flush python stdio: {}", e);
    }
}

fn to_numpy<'py>(py: Python<'py>, data: &[Vec<f64>]) -> PyResult<Bound<'py, PyAny>> {
    let np = py.import("numpy")?;
    np.call_method1("asarray", (data.to_vec(), "float64"))
}

/// Copy one mapping entry into the keyword arguments, if present.
fn set_kwarg(
    kwargs: &Bound<'_, PyDict>,
    params: &Map<String, Value>,
    key: &str,
    py_key: &str,
) -> PyResult<()> {
    match params.get(key) {
        Some(Value::Number(n)) if n.is_u64() => kwargs.set_item(py_key, n.as_u64()),
        Some(Value::Number(n)) if n.is_i64() => kwargs.set_item(py_key, n.as_i64()),
        Some(Value::Number(n)) => kwargs.set_item(py_key, n.as_f64()),
        Some(Value::String(s)) => kwargs.set_item(py_key, s.as_str()),
        Some(Value::Bool(b)) => kwargs.set_item(py_key, *b),
        _ => Ok(()),
    }
}
