//! Engine error classification
//!
//! The engine reports failures as free text. Classification matches that text
//! against an ordered rule table, first match wins, and renders a message with
//! the dataset statistics and concrete next steps. Wording changes in the
//! engine degrade to [`ErrorKind::Engine`], never to a classification failure.

use crate::adjust::suggested_neighbors;
use crate::config::Configuration;
use crate::dataset::DatasetStats;
use crate::error::{BoxError, ClassifiedError, ErrorKind};
use std::fmt::Write;

/// Inputs available to a message renderer.
struct Context<'a> {
    raw: &'a str,
    stats: &'a DatasetStats,
    config: &'a Configuration,
    operation: &'a str,
}

impl Context<'_> {
    fn header(&self) -> String {
        format!("{} {}", self.config.algorithm(), self.operation)
    }

    fn neighbors(&self) -> String {
        self.config
            .n_neighbors
            .map_or_else(|| "not set".to_string(), |n| n.to_string())
    }

    fn suggested(&self) -> usize {
        suggested_neighbors(self.stats.n_samples)
    }
}

/// One classification rule: any fragment matching selects `kind`.
struct Rule {
    fragments: &'static [&'static str],
    kind: ErrorKind,
    render: fn(&Context<'_>) -> String,
}

/// Ordered rules. Fragments are lowercase and matched as substrings.
const RULES: &[Rule] = &[
    Rule {
        fragments: &[
            "isolated point",
            "graph not connected",
            "graph is not connected",
            "disconnected",
        ],
        kind: ErrorKind::IsolatedPoint,
        render: render_isolated_point,
    },
    Rule {
        fragments: &[
            "box_size",
            "box size",
            "not normalized",
            "normalization assertion",
        ],
        kind: ErrorKind::Convergence,
        render: render_convergence,
    },
    Rule {
        fragments: &[
            "n_neighbors",
            "too many neighbors",
            "neighbors exceeds",
            "larger than the number of samples",
        ],
        kind: ErrorKind::InvalidParameter,
        render: render_invalid_neighbors,
    },
];

fn render_isolated_point(ctx: &Context<'_>) -> String {
    let mut msg = format!("{} failed: isolated points in the data.\n\n", ctx.header());
    msg.push_str(
        "Some points are too far from all other points to form neighbor edges, \
         so the neighbor graph is not connected.\n\n",
    );
    let _ = writeln!(msg, "Dataset: {}", ctx.stats.describe());
    let _ = writeln!(msg, "n_neighbors: {}\n", ctx.neighbors());
    msg.push_str("Suggestions:\n");
    let _ = writeln!(
        msg,
        "  1. Reduce n_neighbors (try {})",
        ctx.suggested()
    );
    msg.push_str("  2. Remove outliers before fitting\n");
    msg.push_str(
        "  3. Check that the data has manifold structure (uniform random data often does not)",
    );
    msg
}

fn render_convergence(ctx: &Context<'_>) -> String {
    let mut msg = format!(
        "{} failed: numerical instability during optimization.\n\n",
        ctx.header()
    );
    msg.push_str(
        "The optimizer hit a numerical assertion. This usually comes from features on \
         very different scales or from extreme values.\n\n",
    );
    let _ = writeln!(msg, "Dataset: {}", ctx.stats.describe());
    if let Some(range) = ctx.stats.range() {
        let _ = writeln!(msg, "Value range: {}", range);
    }
    msg.push_str("\nSuggestions:\n");
    msg.push_str("  1. Normalize the data to a bounded range, e.g. [0, 1] or zero mean and unit variance\n");
    msg.push_str("  2. Remove or clip extreme values\n");
    msg.push_str("  3. Check that no feature dominates the scale of the others");
    msg
}

fn render_invalid_neighbors(ctx: &Context<'_>) -> String {
    let mut msg = format!("{} failed: invalid parameter for this dataset.\n\n", ctx.header());
    let _ = writeln!(
        msg,
        "n_neighbors is {} but the dataset has {} samples.",
        ctx.neighbors(),
        ctx.stats.n_samples
    );
    let _ = writeln!(msg, "Dataset: {}\n", ctx.stats.describe());
    msg.push_str("Suggestions:\n");
    let _ = writeln!(msg, "  1. Use n_neighbors: {}", ctx.suggested());
    msg.push_str(
        "\nAutomatic parameter adjustment should have prevented this. \
         Please report it as a bug, including this message.\n",
    );
    let _ = write!(msg, "Engine message: {}", ctx.raw);
    msg
}

fn render_engine(ctx: &Context<'_>) -> String {
    let mut msg = format!("{} failed: {}\n\n", ctx.header(), ctx.raw);
    let _ = writeln!(msg, "Dataset: {}\n", ctx.stats.describe());
    msg.push_str("Suggestions:\n");
    let _ = writeln!(
        msg,
        "  1. Reduce n_neighbors (currently {}, try {})",
        ctx.neighbors(),
        ctx.suggested()
    );
    msg.push_str("  2. Normalize the data to a bounded range\n");
    msg.push_str("  3. Check the data for NaN or infinite values\n");
    msg.push_str("  4. Use pca (linear decomposition) as a fallback");
    msg
}

/// Maps raw engine failures to [`ClassifiedError`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Kind selected for a raw engine message.
    pub fn kind_of(&self, raw_message: &str) -> ErrorKind {
        find_rule(&raw_message.to_lowercase()).map_or(ErrorKind::Engine, |r| r.kind)
    }

    /// Classify a raw engine failure raised during `operation`.
    ///
    /// The raw error becomes the classified error's source.
    pub fn classify<E>(
        &self,
        raw_error: E,
        stats: &DatasetStats,
        config: &Configuration,
        operation: &str,
    ) -> ClassifiedError
    where
        E: Into<BoxError>,
    {
        let raw_error: BoxError = raw_error.into();
        let raw = raw_error.to_string();
        let ctx = Context {
            raw: &raw,
            stats,
            config,
            operation,
        };

        let (kind, message) = match find_rule(&raw.to_lowercase()) {
            Some(rule) => (rule.kind, (rule.render)(&ctx)),
            None => (ErrorKind::Engine, render_engine(&ctx)),
        };

        ClassifiedError::new(
            kind,
            config.algorithm(),
            stats.clone(),
            message,
            Some(raw_error),
        )
    }
}

fn find_rule(lowered: &str) -> Option<&'static Rule> {
    RULES
        .iter()
        .find(|rule| rule.fragments.iter().any(|f| lowered.contains(f)))
}

/// Parameter rejected before reaching the engine.
pub(crate) fn invalid_parameter(
    config: &Configuration,
    stats: &DatasetStats,
    operation: &str,
    problem: String,
    suggestion: String,
) -> ClassifiedError {
    let mut msg = format!(
        "{} {} rejected: {}.\n\n",
        config.algorithm(),
        operation,
        problem
    );
    let _ = writeln!(msg, "Dataset: {}\n", stats.describe());
    msg.push_str("Suggestions:\n");
    let _ = write!(msg, "  1. {}", suggestion);

    ClassifiedError::new(
        ErrorKind::InvalidParameter,
        config.algorithm(),
        stats.clone(),
        msg,
        None,
    )
}
