//! Engine facade
//!
//! [`Estimator`] owns a [`Configuration`] and, once fitted, an engine handle.
//! Every call runs the same state machine from scratch:
//!
//! ```text
//! Idle -> Validating -> AdjustingParameters -> (Silencing) -> Invoking -> Success
//!                                                                     \-> ClassifyingError
//! ```
//!
//! Validation and pre-flight failures abort before the engine is touched.
//! Engine failures, returned or panicked, are classified into
//! [`ClassifiedError`]s. Nothing is
//! retried: calling the engine again with unchanged parameters is not safe.

use crate::adjust::{AdjustmentReport, ParameterAdjuster};
use crate::classify::ErrorClassifier;
use crate::config::{Algorithm, Configuration};
use crate::dataset::{self, DatasetStats, DatasetView, Rows};
use crate::engine::Engine;
use crate::error::{BoxError, ClassifiedError, EnginePanic, Error, Result};
use crate::silence;
use crate::validate::{DatasetValidator, ValidationOptions};
use crate::verbosity;
use serde_json::Value;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Stage of a single guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    AdjustingParameters,
    Silencing,
    Invoking,
    Success,
    ClassifyingError,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::AdjustingParameters => "adjusting parameters",
            Self::Silencing => "silencing",
            Self::Invoking => "invoking",
            Self::Success => "success",
            Self::ClassifyingError => "classifying error",
        };
        f.write_str(name)
    }
}

/// Guarded front end to an [`Engine`].
pub struct Estimator<E: Engine> {
    config: Configuration,
    handle: Option<E>,
    /// Statistics of the data the handle was fitted on (unknown after `load`)
    fitted_stats: Option<DatasetStats>,
    last_adjustments: AdjustmentReport,
    adjuster: ParameterAdjuster,
    classifier: ErrorClassifier,
}

impl<E: Engine> Estimator<E> {
    /// Estimator for `algorithm` with its defaults and `overrides`.
    pub fn new<I, K>(algorithm: Algorithm, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        Ok(Self::with_configuration(Configuration::create(
            algorithm, overrides,
        )?))
    }

    pub fn with_configuration(config: Configuration) -> Self {
        Self {
            config,
            handle: None,
            fitted_stats: None,
            last_adjustments: AdjustmentReport::default(),
            adjuster: ParameterAdjuster::new(),
            classifier: ErrorClassifier::new(),
        }
    }

    /// Restore a fitted estimator from a file written by [`save`](Self::save).
    pub fn load<I, K>(algorithm: Algorithm, path: impl AsRef<Path>, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut estimator = Self::new(algorithm, overrides)?;
        let path = path.as_ref();
        let stats = DatasetStats::default();

        let handle = estimator.invoke(&stats, "load", || E::load(path))?;
        info!("{} model loaded from {}", algorithm, path.display());

        estimator.handle = Some(handle);
        Ok(estimator)
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn algorithm(&self) -> Algorithm {
        self.config.algorithm()
    }

    pub fn is_fitted(&self) -> bool {
        self.handle.is_some()
    }

    /// Parameter changes made by the most recent fit
    pub fn last_adjustments(&self) -> &AdjustmentReport {
        &self.last_adjustments
    }

    /// Fit a projection and return the embedding of `data`.
    pub fn fit_transform<D: DatasetView + ?Sized>(&mut self, data: &D) -> Result<Rows> {
        if self.algorithm().is_clustering() {
            return Err(self.unsupported(
                "fit_transform",
                "use fit_predict for clustering algorithms",
            ));
        }
        self.fit_with(data, "fit_transform", |engine, rows| engine.fit_transform(rows))
    }

    /// Fit a clustering and return one label per row of `data`.
    pub fn fit_predict<D: DatasetView + ?Sized>(&mut self, data: &D) -> Result<Vec<i64>> {
        if !self.algorithm().is_clustering() {
            return Err(self.unsupported(
                "fit_predict",
                "use fit_transform for projection algorithms",
            ));
        }
        self.fit_with(data, "fit_predict", |engine, rows| engine.fit_predict(rows))
    }

    /// Project unseen points with the fitted model.
    pub fn transform<D: DatasetView + ?Sized>(&self, data: &D) -> Result<Rows> {
        if !self.algorithm().supports_transform() {
            let hint = if self.algorithm().is_clustering() {
                "use predict to label new points"
            } else {
                "re-fit with all points instead"
            };
            return Err(self.unsupported("transform", hint));
        }
        self.apply(data, "transform", |engine, rows| engine.transform(rows))
    }

    /// Label unseen points with the fitted model.
    pub fn predict<D: DatasetView + ?Sized>(&self, data: &D) -> Result<Vec<i64>> {
        if !self.algorithm().supports_predict() {
            let hint = if self.algorithm().is_clustering() {
                "re-fit with all points using fit_predict"
            } else {
                "use transform for projection algorithms"
            };
            return Err(self.unsupported("predict", hint));
        }
        self.apply(data, "predict", |engine, rows| engine.predict(rows))
    }

    /// Persist the fitted model through the engine.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let handle = self.fitted()?;
        let stats = self.fitted_stats.clone().unwrap_or_default();

        self.invoke(&stats, "save", || handle.save(path))?;
        info!("{} model saved to {}", self.algorithm(), path.display());
        Ok(())
    }

    fn fit_with<D, T, F>(&mut self, data: &D, operation: &'static str, call: F) -> Result<T>
    where
        D: DatasetView + ?Sized,
        F: FnOnce(&mut E, &[Vec<f64>]) -> std::result::Result<T, E::Error>,
    {
        let start = Instant::now();
        let (rows, stats) = self.prepare(data, operation)?;

        self.trace(operation, Phase::AdjustingParameters);
        let report = self.adjuster.adjust(&mut self.config, stats.n_samples);
        let verbose = self.verbose();
        for change in &report {
            if verbose {
                warn!("{}: {}", self.algorithm(), change);
            } else {
                debug!("{}: {}", self.algorithm(), change);
            }
        }
        self.last_adjustments = report;
        self.adjuster.preflight(&self.config, &stats, operation)?;

        let mapping = self.config.as_mapping()?;
        let (engine, output) = self.invoke(&stats, operation, || {
            let mut engine = E::construct(&mapping)?;
            let output = call(&mut engine, &rows)?;
            Ok((engine, output))
        })?;

        self.handle = Some(engine);
        info!(
            "{} {} complete: {} points in {}ms",
            self.algorithm(),
            operation,
            stats.n_samples,
            start.elapsed().as_millis()
        );
        self.fitted_stats = Some(stats);
        Ok(output)
    }

    fn apply<D, T, F>(&self, data: &D, operation: &'static str, call: F) -> Result<T>
    where
        D: DatasetView + ?Sized,
        F: FnOnce(&E, &[Vec<f64>]) -> std::result::Result<T, E::Error>,
    {
        let start = Instant::now();
        let handle = self.fitted()?;
        let (rows, stats) = self.prepare(data, operation)?;

        if let Some(fitted) = &self.fitted_stats {
            DatasetValidator::default().validate_features(&rows, fitted.n_features)?;
        }

        let output = self.invoke(&stats, operation, || call(handle, &rows))?;
        info!(
            "{} {} complete: {} points in {}ms",
            self.algorithm(),
            operation,
            stats.n_samples,
            start.elapsed().as_millis()
        );
        Ok(output)
    }

    /// Validating: check `data` and copy it into owned rows.
    fn prepare<D: DatasetView + ?Sized>(
        &self,
        data: &D,
        operation: &str,
    ) -> Result<(Rows, DatasetStats)> {
        self.trace(operation, Phase::Idle);
        self.trace(operation, Phase::Validating);

        let options = if self.algorithm().is_clustering() {
            ValidationOptions::allow_non_finite()
        } else {
            ValidationOptions::default()
        };
        if let Err(e) = DatasetValidator::new(options).validate(data) {
            warn!("{} {} rejected input: {}", self.algorithm(), operation, e);
            return Err(e.into());
        }

        let rows = dataset::to_rows(data);
        let stats = DatasetStats::from_rows(&rows);
        debug!("{} {}: {}", self.algorithm(), operation, stats.describe());
        Ok((rows, stats))
    }

    /// Silencing, Invoking, then Success or ClassifyingError.
    ///
    /// A panic inside `call` is caught and classified like an error value.
    fn invoke<T, F>(&self, stats: &DatasetStats, operation: &str, call: F) -> Result<T>
    where
        F: FnOnce() -> std::result::Result<T, E::Error>,
    {
        let verbose = self.verbose();
        if !verbose {
            self.trace(operation, Phase::Silencing);
        }
        self.trace(operation, Phase::Invoking);

        let outcome = silence::scoped(verbose, || panic::catch_unwind(AssertUnwindSafe(call)))?;
        let raw: BoxError = match outcome {
            Ok(Ok(output)) => {
                self.trace(operation, Phase::Success);
                return Ok(output);
            }
            Ok(Err(raw)) => Box::new(raw),
            Err(payload) => {
                let caught = EnginePanic::from_payload(payload);
                debug!("{} {}: engine panicked: {}", self.algorithm(), operation, caught);
                Box::new(caught)
            }
        };

        self.trace(operation, Phase::ClassifyingError);
        let classified = self.classify(raw, stats, operation);
        warn!(
            "{} {} failed ({}): {}",
            self.algorithm(),
            operation,
            classified.kind(),
            classified.raw_message().unwrap_or_default()
        );
        Err(classified.into())
    }

    fn classify(&self, raw: BoxError, stats: &DatasetStats, operation: &str) -> ClassifiedError {
        self.classifier.classify(raw, stats, &self.config, operation)
    }

    fn fitted(&self) -> Result<&E> {
        self.handle.as_ref().ok_or(Error::NotFitted {
            algorithm: self.algorithm(),
            hint: if self.algorithm().is_clustering() {
                "fit_predict"
            } else {
                "fit_transform"
            },
        })
    }

    fn verbose(&self) -> bool {
        self.config
            .verbose
            .unwrap_or_else(|| verbosity::global().is_verbose())
    }

    fn unsupported(&self, operation: &'static str, hint: &'static str) -> Error {
        Error::Unsupported {
            algorithm: self.algorithm(),
            operation,
            hint,
        }
    }

    fn trace(&self, operation: &str, phase: Phase) {
        debug!("{} {}: {}", self.algorithm(), operation, phase);
    }
}
