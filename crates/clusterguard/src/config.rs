//! Algorithm configuration.
//!
//! A [`Configuration`] carries every tunable of every supported algorithm,
//! filled with the defaults of its active [`Algorithm`]. Fields irrelevant to
//! the active algorithm are kept (and handed to the engine, which ignores
//! them) rather than cleared.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Supported algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Projection by neighbor graph (UMAP)
    #[serde(rename = "umap")]
    Umap,
    /// Projection by probabilistic affinity (t-SNE)
    #[serde(rename = "tsne")]
    Tsne,
    /// Large-scale graph layout
    #[serde(rename = "largevis")]
    LargeVis,
    /// Diffusion map
    #[serde(rename = "diffusion_map")]
    DiffusionMap,
    /// Linear decomposition
    #[serde(rename = "pca")]
    Pca,
    /// Partition clustering
    #[serde(rename = "kmeans")]
    KMeans,
    /// Density clustering
    #[serde(rename = "hdbscan")]
    Hdbscan,
}

impl Algorithm {
    pub const ALL: [Algorithm; 7] = [
        Self::Umap,
        Self::Tsne,
        Self::LargeVis,
        Self::DiffusionMap,
        Self::Pca,
        Self::KMeans,
        Self::Hdbscan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Umap => "umap",
            Self::Tsne => "tsne",
            Self::LargeVis => "largevis",
            Self::DiffusionMap => "diffusion_map",
            Self::Pca => "pca",
            Self::KMeans => "kmeans",
            Self::Hdbscan => "hdbscan",
        }
    }

    /// Builds a k-nearest-neighbor graph first; needs `n_neighbors < n_samples`
    pub fn uses_neighbor_graph(&self) -> bool {
        matches!(
            self,
            Self::Umap | Self::Tsne | Self::LargeVis | Self::DiffusionMap
        )
    }

    /// Produces labels rather than coordinates
    pub fn is_clustering(&self) -> bool {
        matches!(self, Self::KMeans | Self::Hdbscan)
    }

    /// A fitted model can project unseen points
    pub fn supports_transform(&self) -> bool {
        matches!(
            self,
            Self::Umap | Self::LargeVis | Self::DiffusionMap | Self::Pca
        )
    }

    /// A fitted model can label unseen points
    pub fn supports_predict(&self) -> bool {
        matches!(self, Self::KMeans)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == lower)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|a| a.as_str()).collect();
                Error::Config(format!(
                    "unknown algorithm '{}', expected one of: {}",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// Keys accepted by [`Configuration::set`].
pub const KNOWN_KEYS: &[&str] = &[
    "algorithm",
    "n_components",
    "n_neighbors",
    "metric",
    "random_seed",
    "min_dist",
    "perplexity",
    "learning_rate",
    "max_iter",
    "nb_grad_batch",
    "nb_sampling_by_edge",
    "ef_construction",
    "max_nb_connection",
    "n_iter",
    "n_clusters",
    "min_samples",
    "min_cluster_size",
    "verbose",
];

/// Metrics the density clustering engine actually computes.
const EUCLIDEAN_METRICS: &[&str] = &["euclidean", "l2"];

/// Parameters for one algorithm, superset of all algorithms' tunables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Configuration {
    algorithm: Algorithm,

    /// Target dimensionality
    pub n_components: usize,

    /// Neighbor count for graph-based projections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_neighbors: Option<usize>,

    /// Distance metric name, passed through to the engine
    pub metric: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u64>,

    pub min_dist: f64,
    pub perplexity: f64,
    pub learning_rate: f64,
    pub max_iter: usize,

    /// Gradient batches per epoch
    pub nb_grad_batch: usize,

    /// Negative samples drawn per edge
    pub nb_sampling_by_edge: usize,

    /// Approximate neighbor index construction quality
    pub ef_construction: usize,

    /// Approximate neighbor index maximum connections per node
    pub max_nb_connection: usize,

    /// Power iterations for randomized decomposition
    pub n_iter: usize,

    pub n_clusters: usize,
    pub min_samples: usize,
    pub min_cluster_size: usize,

    /// Per-instance override of the process-wide verbosity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

impl Configuration {
    /// Defaults for `algorithm`.
    pub fn new(algorithm: Algorithm) -> Self {
        let mut config = Self {
            algorithm,
            n_components: 2,
            n_neighbors: Some(15),
            metric: "euclidean".to_string(),
            random_seed: None,
            min_dist: 0.1,
            perplexity: 30.0,
            learning_rate: 1.0,
            max_iter: 200,
            nb_grad_batch: 10,
            nb_sampling_by_edge: 8,
            ef_construction: 50,
            max_nb_connection: 70,
            n_iter: 2,
            n_clusters: 8,
            min_samples: 5,
            min_cluster_size: 5,
            verbose: None,
        };

        match algorithm {
            Algorithm::Tsne => {
                config.learning_rate = 200.0;
                config.max_iter = 1000;
            }
            Algorithm::LargeVis => config.nb_grad_batch = 20,
            Algorithm::Pca | Algorithm::Hdbscan => config.n_neighbors = None,
            Algorithm::KMeans => {
                config.n_neighbors = None;
                config.max_iter = 300;
            }
            Algorithm::Umap | Algorithm::DiffusionMap => {}
        }

        config
    }

    /// Defaults for `algorithm`, then `overrides` applied key by key.
    ///
    /// Unknown keys are logged and dropped. A known key with a value of the
    /// wrong type is an error.
    pub fn create<I, K>(algorithm: Algorithm, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut config = Self::new(algorithm);
        for (key, value) in overrides {
            config.set(key.as_ref(), value)?;
        }

        if algorithm == Algorithm::Hdbscan
            && !EUCLIDEAN_METRICS.contains(&config.metric.to_lowercase().as_str())
        {
            warn!(
                "hdbscan computes euclidean distances only, metric '{}' will be ignored",
                config.metric
            );
        }

        Ok(config)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Set one parameter by name.
    ///
    /// Returns `Ok(false)` when the key is not recognised (the value is dropped).
    pub fn set(&mut self, key: &str, value: Value) -> Result<bool> {
        match key {
            "algorithm" => {
                let requested: Algorithm = parse(key, value)?;
                if requested != self.algorithm {
                    return Err(Error::Config(format!(
                        "cannot change algorithm from {} to {} on an existing configuration",
                        self.algorithm, requested
                    )));
                }
            }
            "n_components" => self.n_components = parse(key, value)?,
            "n_neighbors" => self.n_neighbors = parse(key, value)?,
            "metric" => self.metric = parse(key, value)?,
            "random_seed" => self.random_seed = parse(key, value)?,
            "min_dist" => self.min_dist = parse(key, value)?,
            "perplexity" => self.perplexity = parse(key, value)?,
            "learning_rate" => self.learning_rate = parse(key, value)?,
            "max_iter" => self.max_iter = parse(key, value)?,
            "nb_grad_batch" => self.nb_grad_batch = parse(key, value)?,
            "nb_sampling_by_edge" => self.nb_sampling_by_edge = parse(key, value)?,
            "ef_construction" => self.ef_construction = parse(key, value)?,
            "max_nb_connection" => self.max_nb_connection = parse(key, value)?,
            "n_iter" => self.n_iter = parse(key, value)?,
            "n_clusters" => self.n_clusters = parse(key, value)?,
            "min_samples" => self.min_samples = parse(key, value)?,
            "min_cluster_size" => self.min_cluster_size = parse(key, value)?,
            "verbose" => self.verbose = parse(key, value)?,
            _ => {
                warn!(
                    "unknown {} parameter '{}' ignored (known: {})",
                    self.algorithm,
                    key,
                    KNOWN_KEYS.join(", ")
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Flatten every field into the mapping handed to the engine.
    ///
    /// The mapping is a superset: it includes fields the active algorithm
    /// does not use. Unset optional fields are omitted.
    pub fn as_mapping(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Config(format!(
                "configuration did not serialize to a mapping: {}",
                other
            ))),
        }
    }

    /// Current value of one parameter, as it appears in the mapping
    pub fn get(&self, key: &str) -> Option<Value> {
        self.as_mapping().ok()?.remove(key)
    }
}

fn parse<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
    let shown = value.to_string();
    serde_json::from_value(value)
        .map_err(|e| Error::Config(format!("invalid value {} for '{}': {}", shown, key, e)))
}
