//! Run configuration — every reduction tunable as an operator-editable TOML value.
//!
//! Each section struct implements `Default` with the values the reduction has
//! always used, so behavior is unchanged when no config file is present.

use crate::detector::VertexAxis;
use crate::types::{Correction, CorrectionSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors while loading or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// Top-level config
// ============================================================================

/// Root configuration for one reduction run.
///
/// Load with [`RunConfig::load`], which searches:
/// 1. `$FORWARD_MULT_CONFIG` env var
/// 2. `./forward_mult.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub inspector: InspectorConfig,

    #[serde(default)]
    pub fixer: FixerConfig,

    #[serde(default)]
    pub sharing: SharingConfig,

    #[serde(default)]
    pub density: DensityConfig,

    #[serde(default)]
    pub corrections: CorrectionsConfig,

    #[serde(default)]
    pub timing: TimingConfig,
}

impl RunConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("FORWARD_MULT_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded run config from FORWARD_MULT_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from FORWARD_MULT_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "FORWARD_MULT_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("forward_mult.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded run config from ./forward_mult.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./forward_mult.toml, using defaults");
                }
            }
        }

        info!("No forward_mult.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inspector.vertex_axis.bins == 0 {
            return Err(ConfigError::Invalid("inspector.vertex_axis.bins must be > 0".into()));
        }
        if self.inspector.vertex_axis.min_cm >= self.inspector.vertex_axis.max_cm {
            return Err(ConfigError::Invalid(
                "inspector.vertex_axis: min_cm must be below max_cm".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.sharing.low_cut) {
            return Err(ConfigError::Invalid("sharing.low_cut must be in [0, 1)".into()));
        }
        if self.sharing.merge_cut <= self.sharing.low_cut {
            return Err(ConfigError::Invalid(
                "sharing.merge_cut must be above sharing.low_cut".into(),
            ));
        }
        if self.density.outlier_sigma <= 0.0 {
            return Err(ConfigError::Invalid("density.outlier_sigma must be > 0".into()));
        }
        if self.fixer.max_signal_mip <= 0.0 {
            return Err(ConfigError::Invalid("fixer.max_signal_mip must be > 0".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Run-level switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    /// Enable the low-flux (hit-counting) reconstruction path. Off by
    /// default: the inspector's low-flux flag is then forced to false.
    #[serde(default)]
    pub enable_low_flux: bool,
}

impl Default for RunSection {
    fn default() -> Self {
        Self { enable_low_flux: false }
    }
}

/// Event-inspector thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectorConfig {
    /// Accepted vertex-z window and binning.
    #[serde(default)]
    pub vertex_axis: VertexAxis,

    /// Cluster count below which a pp event counts as low flux.
    #[serde(default = "default_low_flux_cut")]
    pub low_flux_cluster_cut: u16,
}

fn default_low_flux_cut() -> u16 {
    100
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            vertex_axis: VertexAxis::default(),
            low_flux_cluster_cut: default_low_flux_cut(),
        }
    }
}

/// Raw-data fixer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixerConfig {
    /// Reconstruction noise factor applied when the pre-run probe finds the
    /// noise/gain correction unreliable.
    #[serde(default = "default_fallback_noise_factor")]
    pub fallback_noise_factor: i32,

    /// Signals above this many MIPs are clamped as readout saturation.
    #[serde(default = "default_max_signal")]
    pub max_signal_mip: f64,

    /// Signals below this many MIPs are treated as pedestal noise and zeroed.
    #[serde(default = "default_noise_floor")]
    pub noise_floor_mip: f64,
}

fn default_fallback_noise_factor() -> i32 {
    4
}

fn default_max_signal() -> f64 {
    20.0
}

fn default_noise_floor() -> f64 {
    0.05
}

impl Default for FixerConfig {
    fn default() -> Self {
        Self {
            fallback_noise_factor: default_fallback_noise_factor(),
            max_signal_mip: default_max_signal(),
            noise_floor_mip: default_noise_floor(),
        }
    }
}

/// Sharing-filter cuts, in MIP units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingConfig {
    /// Below this a strip signal is only ever spillover from a neighbor.
    #[serde(default = "default_low_cut")]
    pub low_cut: f64,

    /// Below this a strip signal is merged into a neighboring candidate hit.
    #[serde(default = "default_merge_cut")]
    pub merge_cut: f64,
}

fn default_low_cut() -> f64 {
    0.15
}

fn default_merge_cut() -> f64 {
    0.50
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            low_cut: default_low_cut(),
            merge_cut: default_merge_cut(),
        }
    }
}

/// Density-calculator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityConfig {
    /// A ring whose occupancy deviates from the detector mean by more than
    /// this many standard deviations is flagged for skipping.
    #[serde(default = "default_outlier_sigma")]
    pub outlier_sigma: f64,

    /// Minimum occupancy spread before the outlier scan is meaningful;
    /// below it no ring is flagged.
    #[serde(default = "default_min_spread")]
    pub min_occupancy_spread: f64,
}

fn default_outlier_sigma() -> f64 {
    4.0
}

fn default_min_spread() -> f64 {
    1e-4
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            outlier_sigma: default_outlier_sigma(),
            min_occupancy_spread: default_min_spread(),
        }
    }
}

/// Which correction maps start the run enabled, and their strengths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionsConfig {
    #[serde(default = "default_true")]
    pub secondary_map: bool,
    #[serde(default = "default_true")]
    pub vertex_bias: bool,
    #[serde(default = "default_true")]
    pub merging_efficiency: bool,
    #[serde(default = "default_true")]
    pub acceptance: bool,
    #[serde(default = "default_true")]
    pub noise_gain: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for CorrectionsConfig {
    fn default() -> Self {
        Self {
            secondary_map: true,
            vertex_bias: true,
            merging_efficiency: true,
            acceptance: true,
            noise_gain: true,
        }
    }
}

impl CorrectionsConfig {
    /// Initial run-wide correction mask.
    pub fn initial_mask(&self) -> CorrectionSet {
        let mut mask = CorrectionSet::empty();
        for (enabled, correction) in [
            (self.secondary_map, Correction::SecondaryMap),
            (self.vertex_bias, Correction::VertexBias),
            (self.merging_efficiency, Correction::MergingEfficiency),
            (self.acceptance, Correction::Acceptance),
            (self.noise_gain, Correction::NoiseGain),
        ] {
            if enabled {
                mask.insert(correction);
            }
        }
        mask
    }
}

/// Diagnostic timing instrumentation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingConfig {
    /// When false (the default) no timestamps are taken at all.
    #[serde(default)]
    pub enabled: bool,
}
