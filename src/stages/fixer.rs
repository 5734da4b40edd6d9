//! Raw-data fixer: repairs known hardware artifacts in the detector payload.
//!
//! Two jobs: the per-event in-place repair (`fix`), and the pre-run noise
//! probe (`find_target_noise_factor`) that the controller uses to decide
//! whether the noise/gain correction can be trusted for the run.

use crate::config::defaults::{NOISE_PROBE_MIN_HITS, NOISE_PROBE_SPREAD_PER_UNIT};
use crate::config::{FixerConfig, RunConfig};
use crate::detector::DetectorPayload;
use statrs::statistics::Statistics;
use tracing::debug;

/// Incidence-angle attenuation per cm of vertex displacement. A vertex off
/// the nominal interaction point lengthens the track path through the
/// silicon, inflating the deposited signal.
const PATH_LENGTH_PER_CM: f64 = 0.002;

pub struct AmplitudeFixer {
    cfg: FixerConfig,
    /// Zero-suppression factor assumed by reconstruction. Retuned once per
    /// run by the pre-run probe when the default is found unreliable.
    noise_factor: i32,
}

impl AmplitudeFixer {
    pub fn new(cfg: &RunConfig) -> Self {
        Self {
            cfg: cfg.fixer.clone(),
            noise_factor: cfg.fixer.fallback_noise_factor,
        }
    }

    /// Recommend a reconstruction noise factor from a representative payload.
    ///
    /// The recommendation is derived from the spread of the signal sample: a
    /// healthy detector shows a narrow single-particle peak, a noisy one a
    /// wide smear. Returns 0 (meaning "unreliable, disable the correction")
    /// when the sample is too small to judge.
    ///
    /// With `dry_run` the fixer's own factor is left untouched.
    pub fn find_target_noise_factor(&mut self, payload: &DetectorPayload, dry_run: bool) -> i32 {
        if payload.len() < NOISE_PROBE_MIN_HITS {
            debug!(hits = payload.len(), "Noise probe sample too small");
            return 0;
        }

        let signals: Vec<f64> = payload.signals().filter(|s| s.is_finite()).collect();
        if signals.len() < NOISE_PROBE_MIN_HITS {
            return 0;
        }

        let spread = Statistics::std_dev(&signals);
        #[allow(clippy::cast_possible_truncation)]
        let target = (spread / NOISE_PROBE_SPREAD_PER_UNIT).round() as i32;

        debug!(spread, target, dry_run, "Noise probe complete");
        if !dry_run && target > 0 {
            self.noise_factor = target;
        }
        target
    }

    /// Override the reconstruction noise factor for the rest of the run.
    pub fn set_reco_noise_factor(&mut self, factor: i32) {
        debug!(factor, "Reconstruction noise factor set");
        self.noise_factor = factor;
    }

    pub fn reco_noise_factor(&self) -> i32 {
        self.noise_factor
    }

    /// Repair the payload in place: drop pedestal noise, clamp readout
    /// saturation, and undo the vertex-dependent path-length inflation.
    ///
    /// No failure mode — a payload that repairs down to nothing is caught by
    /// the sharing filter downstream.
    pub fn fix(&self, payload: &mut DetectorPayload, vertex_z: f64) {
        // The zero-suppression threshold scales with the assumed noise
        // factor relative to the nominal setting of 4.
        let floor = self.cfg.noise_floor_mip * f64::from(self.noise_factor) / 4.0;
        let path_scale = 1.0 / (1.0 + PATH_LENGTH_PER_CM * vertex_z.abs());

        let before = payload.len();
        payload.hits.retain_mut(|hit| {
            if !hit.signal.is_finite() || hit.signal < floor {
                return false;
            }
            hit.signal = (hit.signal * path_scale).min(self.cfg.max_signal_mip);
            true
        });

        if payload.len() != before {
            debug!(dropped = before - payload.len(), floor, "Fixer dropped sub-threshold hits");
        }
    }
}
