//! Density calculator: per-ring η×φ particle-density estimates.
//!
//! Converts the merged-hit snapshot into density histograms, one per ring,
//! and flags rings whose occupancy is a statistical outlier against the rest
//! of the detector for the same event. The flagged skip bits are the input
//! to the controller's quality-skip scan.

use super::{DensityCalculator, StageError};
use crate::config::{DensityConfig, RunConfig};
use crate::detector::DetectorSnapshot;
use crate::hist::RingHistos;
use statrs::statistics::Statistics;
use tracing::debug;

/// Pseudorapidity shift per cm of vertex displacement along the beam axis.
/// A displaced vertex changes the polar angle each strip is seen under.
const ETA_SHIFT_PER_CM: f64 = 0.01;

pub struct DefaultDensityCalculator {
    cfg: DensityConfig,
}

impl DefaultDensityCalculator {
    pub fn new(cfg: &RunConfig) -> Self {
        Self { cfg: cfg.density.clone() }
    }

    /// Poisson occupancy correction: at high flux several particles can pile
    /// into one channel, so the raw estimate undercounts. Identity at low
    /// occupancy.
    fn occupancy_factor(occupancy: f64) -> f64 {
        if occupancy <= 0.0 {
            return 1.0;
        }
        occupancy / (1.0 - (-occupancy).exp())
    }
}

impl DensityCalculator for DefaultDensityCalculator {
    fn calculate(
        &self,
        snapshot: &DetectorSnapshot,
        histos: &mut RingHistos,
        low_flux: bool,
        _centrality: f64,
        ip: [f64; 3],
    ) -> Result<(), StageError> {
        let eta_shift = ip[2] * ETA_SHIFT_PER_CM;

        for grid in snapshot.rings() {
            let ring = grid.ring;
            let factor = if low_flux {
                // Hit counting is already unbiased at low flux.
                1.0
            } else {
                Self::occupancy_factor(grid.occupancy())
            };

            let target = &mut histos.get_mut(ring).hist;
            for (sector, strip, mult) in grid.entries() {
                if !mult.is_finite() {
                    return Err(StageError::InvalidInput(format!(
                        "ring {ring} channel {sector}/{strip} carries multiplicity {mult}"
                    )));
                }
                let eta = ring.strip_eta(strip) - eta_shift;
                let phi = ring.sector_phi(sector);
                target.fill(eta, phi, mult * factor);
            }
        }

        // Outlier scan: a ring whose occupancy sits far from the others for
        // the same event saw a readout problem, not physics.
        let occupancies: Vec<f64> = snapshot.rings().map(|g| g.occupancy()).collect();
        let mean = Statistics::mean(&occupancies);
        let spread = Statistics::std_dev(&occupancies);

        if spread > self.cfg.min_occupancy_spread {
            for (grid, occ) in snapshot.rings().zip(&occupancies) {
                if (occ - mean).abs() > self.cfg.outlier_sigma * spread {
                    histos.get_mut(grid.ring).skip = true;
                    debug!(
                        ring = %grid.ring,
                        occupancy = occ,
                        mean,
                        spread,
                        "Ring flagged as occupancy outlier"
                    );
                }
            }
        }

        Ok(())
    }
}
