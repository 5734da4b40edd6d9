//! Reaction-plane finder: second-harmonic Q-vector estimate.
//!
//! Only invoked for the PbPb regime. The estimate is the standard
//! Ψ = atan2(Q_y, Q_x) / 2 over the working ring histograms, with flagged
//! rings excluded. A full calibration would recenter the Q-vector against
//! run-averaged profiles from the raw event; this estimate works from the
//! event's own histograms alone.

use super::{EventplaneFinder, StageError};
use crate::hist::{Hist2D, RingHistos};
use crate::types::{EventplaneRecord, RawEvent};
use tracing::trace;

#[derive(Default)]
pub struct DefaultEventplaneFinder;

impl DefaultEventplaneFinder {
    pub fn new() -> Self {
        Self
    }
}

impl EventplaneFinder for DefaultEventplaneFinder {
    fn find(
        &self,
        event: &RawEvent,
        _summary: &Hist2D,
        histos: &RingHistos,
    ) -> Result<EventplaneRecord, StageError> {
        let mut qx = 0.0;
        let mut qy = 0.0;
        let mut weight = 0.0;

        for ring in histos.iter().filter(|r| !r.skip) {
            for (_, phi, w) in ring.hist.cells() {
                qx += w * (2.0 * phi).cos();
                qy += w * (2.0 * phi).sin();
                weight += w;
            }
        }

        if weight <= 0.0 {
            return Err(StageError::NoConvergence("no weight in working histograms"));
        }

        let mut psi = 0.5 * qy.atan2(qx);
        if psi < 0.0 {
            psi += std::f64::consts::PI;
        }

        trace!(event = event.event_number, psi, weight, "Reaction plane estimated");
        Ok(EventplaneRecord { psi: Some(psi), q: (qx, qy), weight })
    }
}
