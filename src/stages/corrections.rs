//! Correction applier: multiplicative maps over the working histograms.
//!
//! Which maps run is decided by the run-wide correction mask the controller
//! passes in on every event — the applier itself is stateless apart from the
//! map strengths. The strengths here are flat per-ring placeholders standing
//! in for the measured maps.

use super::{CorrectionApplier, StageError};
use crate::config::RunConfig;
use crate::detector::{RingId, RingKind, VertexAxis};
use crate::hist::RingHistos;
use crate::types::{Correction, CorrectionSet};
use tracing::trace;

pub struct DefaultCorrectionApplier {
    vertex_axis: VertexAxis,
}

impl DefaultCorrectionApplier {
    pub fn new(cfg: &RunConfig) -> Self {
        Self { vertex_axis: cfg.inspector.vertex_axis }
    }

    /// Map strength for one (correction, ring, vertex bin) cell.
    fn factor(&self, correction: Correction, ring: RingId, vertex_bin: u16) -> f64 {
        match correction {
            // Secondary particles inflate the raw density by ~25%.
            Correction::SecondaryMap => 1.0 / 1.25,
            // Acceptance loss grows with distance from the nominal vertex.
            Correction::VertexBias => {
                let center = f64::from(self.vertex_axis.bins - 1) / 2.0;
                1.0 / (1.0 - 0.01 * (f64::from(vertex_bin) - center).abs())
            }
            // Hit merging loses a few percent of genuine pairs.
            Correction::MergingEfficiency => 1.0 / 0.95,
            // Dead-region acceptance, worse for the coarser outer rings.
            Correction::Acceptance => match ring.kind {
                RingKind::Inner => 1.0 / 0.98,
                RingKind::Outer => 1.0 / 0.96,
            },
            // Residual zero-suppression loss.
            Correction::NoiseGain => 1.02,
        }
    }
}

impl CorrectionApplier for DefaultCorrectionApplier {
    fn correct(
        &self,
        histos: &mut RingHistos,
        vertex_bin: u16,
        enabled: &CorrectionSet,
    ) -> Result<(), StageError> {
        if vertex_bin >= self.vertex_axis.bins {
            return Err(StageError::BadVertexBin(vertex_bin));
        }

        for ring_hist in histos.iter_mut() {
            let mut combined = 1.0;
            for correction in Correction::ALL {
                if enabled.contains(correction) {
                    combined *= self.factor(correction, ring_hist.ring, vertex_bin);
                }
            }
            ring_hist.hist.scale(combined);
        }

        trace!(vertex_bin, mask = %enabled, "Corrections applied");
        Ok(())
    }
}
