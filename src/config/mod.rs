//! Run Configuration Module
//!
//! Provides per-run configuration loaded from TOML files, replacing
//! hardcoded reduction thresholds with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `FORWARD_MULT_CONFIG` environment variable (path to TOML file)
//! 2. `forward_mult.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(RunConfig::load());
//!
//! // Anywhere in the codebase:
//! let cut = config::get().sharing.merge_cut;
//! ```

mod run_config;
pub mod defaults;

pub use run_config::*;

use std::sync::OnceLock;

/// Global run configuration, initialized once at startup.
static RUN_CONFIG: OnceLock<RunConfig> = OnceLock::new();

/// Initialize the global run configuration.
///
/// Must be called exactly once before any calls to `get()`; later calls are
/// ignored with a warning.
pub fn init(config: RunConfig) {
    if RUN_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get a reference to the global run configuration.
///
/// Panics if `init()` has not been called. A missing config is a fatal
/// startup error, not a recoverable condition.
#[allow(clippy::expect_used)]
pub fn get() -> &'static RunConfig {
    RUN_CONFIG
        .get()
        .expect("config::get() called before config::init() — this is a startup bug")
}

/// Check whether the config has been initialized.
///
/// Useful for tests and optional config paths.
pub fn is_initialized() -> bool {
    RUN_CONFIG.get().is_some()
}
