//! Parameter adjustment
//!
//! Rewrites parameters that are invalid for the dataset shape to the nearest
//! safe value. The engine panics (or worse) on some of these, e.g. a neighbor
//! count at or above the sample count.

use crate::classify;
use crate::config::{Algorithm, Configuration};
use crate::dataset::DatasetStats;
use crate::error::ClassifiedError;
use serde::Serialize;

/// Neighbor count used when the data allows it.
pub const PREFERRED_NEIGHBORS: usize = 15;

/// Lower bound for any neighbor count.
pub const MIN_NEIGHBORS: usize = 2;

/// Largest neighbor count the engine accepts for `n_samples` points.
pub fn max_neighbors(n_samples: usize) -> usize {
    n_samples.saturating_sub(1).max(MIN_NEIGHBORS)
}

/// Neighbor count suggested for `n_samples` points.
pub fn suggested_neighbors(n_samples: usize) -> usize {
    PREFERRED_NEIGHBORS.min(n_samples / 4).max(MIN_NEIGHBORS)
}

/// One rewritten parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adjustment {
    pub parameter: &'static str,
    pub old_value: usize,
    pub new_value: usize,
    pub reason: String,
}

impl std::fmt::Display for Adjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} adjusted from {} to {}: {}",
            self.parameter, self.old_value, self.new_value, self.reason
        )
    }
}

/// Changes made by one [`ParameterAdjuster::adjust`] call, possibly none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdjustmentReport {
    adjustments: Vec<Adjustment>,
}

impl AdjustmentReport {
    pub fn is_empty(&self) -> bool {
        self.adjustments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adjustments.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Adjustment> {
        self.adjustments.iter()
    }

    /// Adjustment recorded for `parameter`, if any
    pub fn get(&self, parameter: &str) -> Option<&Adjustment> {
        self.adjustments.iter().find(|a| a.parameter == parameter)
    }

    fn record(&mut self, parameter: &'static str, old_value: usize, new_value: usize, reason: String) {
        self.adjustments.push(Adjustment {
            parameter,
            old_value,
            new_value,
            reason,
        });
    }
}

impl<'a> IntoIterator for &'a AdjustmentReport {
    type Item = &'a Adjustment;
    type IntoIter = std::slice::Iter<'a, Adjustment>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Corrects shape-dependent parameters before an engine call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterAdjuster;

impl ParameterAdjuster {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite parameters that are invalid for `n_samples` points.
    ///
    /// Values already within bounds are left alone, so a second call with the
    /// same sample count changes nothing.
    pub fn adjust(&self, config: &mut Configuration, n_samples: usize) -> AdjustmentReport {
        let mut report = AdjustmentReport::default();

        if config.algorithm().uses_neighbor_graph() {
            if let Some(current) = config.n_neighbors {
                let max_allowed = max_neighbors(n_samples);
                if current > max_allowed {
                    let new_value = suggested_neighbors(n_samples).min(max_allowed);
                    config.n_neighbors = Some(new_value);
                    report.record(
                        "n_neighbors",
                        current,
                        new_value,
                        format!(
                            "must be less than the number of samples ({}), at most {}",
                            n_samples, max_allowed
                        ),
                    );
                }
            }
        }

        if config.algorithm() == Algorithm::Hdbscan {
            let max_samples = n_samples.saturating_sub(1).max(1);
            let bounded = config.min_samples.clamp(1, max_samples);
            if bounded != config.min_samples {
                report.record(
                    "min_samples",
                    config.min_samples,
                    bounded,
                    format!(
                        "must be between 1 and {} for {} samples",
                        max_samples, n_samples
                    ),
                );
                config.min_samples = bounded;
            }

            let max_cluster = n_samples.max(2);
            let bounded = config.min_cluster_size.clamp(2, max_cluster);
            if bounded != config.min_cluster_size {
                report.record(
                    "min_cluster_size",
                    config.min_cluster_size,
                    bounded,
                    format!(
                        "must be between 2 and {} for {} samples",
                        max_cluster, n_samples
                    ),
                );
                config.min_cluster_size = bounded;
            }
        }

        report
    }

    /// Reject parameters that cannot be corrected without changing what the
    /// caller asked for.
    pub fn preflight(
        &self,
        config: &Configuration,
        stats: &DatasetStats,
        operation: &str,
    ) -> Result<(), ClassifiedError> {
        let reject = |problem: String, suggestion: String| {
            Err(classify::invalid_parameter(
                config, stats, operation, problem, suggestion,
            ))
        };

        if config.n_components == 0 && !config.algorithm().is_clustering() {
            return reject(
                "n_components is 0".to_string(),
                "Request at least one output dimension (n_components: 2 is typical)".to_string(),
            );
        }

        match config.algorithm() {
            Algorithm::Pca if config.n_components > stats.n_features => reject(
                format!(
                    "n_components ({}) exceeds the number of features ({})",
                    config.n_components, stats.n_features
                ),
                format!("Use n_components <= {}", stats.n_features),
            ),
            Algorithm::KMeans if config.n_clusters == 0 => reject(
                "n_clusters is 0".to_string(),
                "Request at least one cluster".to_string(),
            ),
            Algorithm::KMeans if config.n_clusters > stats.n_samples => reject(
                format!(
                    "n_clusters ({}) cannot be larger than the number of samples ({})",
                    config.n_clusters, stats.n_samples
                ),
                format!(
                    "Use n_clusters <= {} or provide more data",
                    stats.n_samples
                ),
            ),
            _ => Ok(()),
        }
    }
}
