//! Process-wide verbosity flag.
//!
//! Decides whether engine diagnostic output is shown or silenced. The default
//! comes from `CLUSTERGUARD_VERBOSE`, read once on first access; after that
//! only [`Verbosity::set_verbose`] changes it. Readers query the flag at call
//! time, so a toggle between two engine calls takes effect on the second.

use lazy_static::lazy_static;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Environment variable holding the default verbosity.
pub const VERBOSE_ENV: &str = "CLUSTERGUARD_VERBOSE";

lazy_static! {
    static ref VERBOSITY: Verbosity = Verbosity::from_env();
}

/// Process-wide verbosity setting.
#[derive(Debug)]
pub struct Verbosity {
    verbose: AtomicBool,
}

impl Verbosity {
    fn from_env() -> Self {
        let verbose = std::env::var(VERBOSE_ENV)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        debug!("{}={} (initial verbosity)", VERBOSE_ENV, verbose);
        Self::new(verbose)
    }

    fn new(verbose: bool) -> Self {
        Self {
            verbose: AtomicBool::new(verbose),
        }
    }

    /// Whether engine output should be shown
    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::SeqCst)
    }

    /// Override the flag for all subsequent calls
    pub fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::SeqCst);
    }
}

/// The process-wide verbosity setting.
pub fn global() -> &'static Verbosity {
    &VERBOSITY
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
