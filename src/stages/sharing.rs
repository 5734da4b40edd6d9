//! Sharing filter: merges adjacent-strip spillover into discrete hits.
//!
//! A particle crossing near a strip boundary deposits energy in two or three
//! neighboring strips. This pass walks each sector's strips in order, folds
//! sub-threshold neighbors into the candidate hit they belong to, and writes
//! the merged result into the controller-owned snapshot.

use super::{SharingFilter, StageError};
use crate::config::{RunConfig, SharingConfig};
use crate::detector::{ChannelHit, DetectorPayload, DetectorSnapshot};
use tracing::trace;

pub struct DefaultSharingFilter {
    cfg: SharingConfig,
}

impl DefaultSharingFilter {
    pub fn new(cfg: &RunConfig) -> Self {
        Self { cfg: cfg.sharing.clone() }
    }

    /// Close out a candidate hit: convert the summed signal to a
    /// multiplicity estimate and store it at the anchor strip.
    fn commit(
        &self,
        out: &mut DetectorSnapshot,
        hit: &ChannelHit,
        summed_signal: f64,
        low_flux: bool,
    ) {
        // Low flux counts merged hits; high flux uses the summed energy in
        // MIP units as the particle estimate.
        let mult = if low_flux { 1.0 } else { summed_signal };
        out.ring_mut(hit.ring).add(hit.sector, hit.strip, mult);
    }
}

impl SharingFilter for DefaultSharingFilter {
    fn filter(
        &self,
        payload: &DetectorPayload,
        low_flux: bool,
        _vertex_z: f64,
        out: &mut DetectorSnapshot,
    ) -> Result<(), StageError> {
        if payload.is_empty() {
            return Err(StageError::NoInput("payload empty after repair"));
        }

        for hit in &payload.hits {
            if !hit.signal.is_finite() || hit.signal < 0.0 {
                return Err(StageError::InvalidInput(format!(
                    "channel {}/{}/{} carries signal {}",
                    hit.ring, hit.sector, hit.strip, hit.signal
                )));
            }
            if hit.sector >= hit.ring.sectors() || hit.strip >= hit.ring.strips() {
                return Err(StageError::InvalidInput(format!(
                    "channel {}/{}/{} outside ring geometry",
                    hit.ring, hit.sector, hit.strip
                )));
            }
        }

        // Readout order is sector-major, strip-minor within a ring, so one
        // ordered walk sees every neighbor pair exactly once.
        let mut hits: Vec<&ChannelHit> = payload.hits.iter().collect();
        hits.sort_by_key(|h| (h.ring.index(), h.sector, h.strip));

        let mut candidate: Option<(&ChannelHit, f64)> = None;
        let mut merged = 0_usize;

        for hit in hits {
            let adjacent = candidate.is_some_and(|(anchor, _)| {
                anchor.ring == hit.ring
                    && anchor.sector == hit.sector
                    && hit.strip > anchor.strip
                    && hit.strip - anchor.strip <= 2
            });

            if hit.signal < self.cfg.low_cut {
                // Below the sharing noise floor; never counted.
                continue;
            }

            if hit.signal < self.cfg.merge_cut {
                // Spillover, not a particle: fold into the adjacent
                // candidate, or drop when there is nothing it belongs to.
                if adjacent {
                    if let Some((_, sum)) = candidate.as_mut() {
                        *sum += hit.signal;
                        merged += 1;
                    }
                }
                continue;
            }

            // A new candidate hit; commit the previous one.
            if let Some((anchor, sum)) = candidate.take() {
                self.commit(out, anchor, sum, low_flux);
            }
            candidate = Some((hit, hit.signal));
        }

        if let Some((anchor, sum)) = candidate.take() {
            self.commit(out, anchor, sum, low_flux);
        }

        trace!(merged, total = out.total(), "Sharing filter complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::RingId;

    fn hit(ring: RingId, sector: u16, strip: u16, signal: f64) -> ChannelHit {
        ChannelHit { ring, sector, strip, signal }
    }

    fn run_filter(hits: Vec<ChannelHit>, low_flux: bool) -> (DetectorSnapshot, Result<(), StageError>) {
        let filter = DefaultSharingFilter::new(&RunConfig::default());
        let mut snap = DetectorSnapshot::new();
        let result = filter.filter(&DetectorPayload { hits }, low_flux, 0.0, &mut snap);
        (snap, result)
    }

    #[test]
    fn empty_payload_is_an_error() {
        let (_, result) = run_filter(Vec::new(), false);
        assert!(matches!(result, Err(StageError::NoInput(_))));
    }

    #[test]
    fn isolated_hit_passes_through() {
        let ring = RingId::ALL[0];
        let (snap, result) = run_filter(vec![hit(ring, 2, 100, 1.2)], false);
        result.unwrap();
        assert!((snap.ring(ring).get(2, 100) - 1.2).abs() < 1e-12);
    }

    #[test]
    fn adjacent_spillover_merges_into_anchor() {
        let ring = RingId::ALL[1];
        // 0.9 MIP hit with 0.3 MIP spillover on the next strip.
        let (snap, result) =
            run_filter(vec![hit(ring, 4, 50, 0.9), hit(ring, 4, 51, 0.3)], false);
        result.unwrap();
        assert!((snap.ring(ring).get(4, 50) - 1.2).abs() < 1e-12);
        assert_eq!(snap.ring(ring).get(4, 51), 0.0);
    }

    #[test]
    fn strong_neighbor_starts_its_own_hit() {
        let ring = RingId::ALL[1];
        let (snap, result) =
            run_filter(vec![hit(ring, 4, 50, 0.9), hit(ring, 4, 51, 0.8)], false);
        result.unwrap();
        assert!((snap.ring(ring).get(4, 50) - 0.9).abs() < 1e-12);
        assert!((snap.ring(ring).get(4, 51) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn sub_noise_orphan_is_dropped() {
        let ring = RingId::ALL[2];
        let (snap, result) = run_filter(vec![hit(ring, 0, 10, 0.05)], false);
        result.unwrap();
        assert_eq!(snap.total(), 0.0);
    }

    #[test]
    fn different_sectors_never_merge() {
        let ring = RingId::ALL[0];
        let (snap, result) =
            run_filter(vec![hit(ring, 1, 50, 0.9), hit(ring, 2, 51, 0.3)], false);
        result.unwrap();
        assert!((snap.ring(ring).get(1, 50) - 0.9).abs() < 1e-12);
        // Orphan spillover in the other sector is dropped.
        assert_eq!(snap.ring(ring).get(2, 51), 0.0);
    }

    #[test]
    fn orphan_spillover_without_an_anchor_is_dropped() {
        let ring = RingId::ALL[1];
        // 0.3 MIP with no candidate within two strips: spillover from a
        // particle this readout never saw, not a hit of its own.
        let (snap, result) =
            run_filter(vec![hit(ring, 4, 50, 0.9), hit(ring, 4, 200, 0.3)], false);
        result.unwrap();
        assert!((snap.ring(ring).get(4, 50) - 0.9).abs() < 1e-12);
        assert_eq!(snap.ring(ring).get(4, 200), 0.0);
        assert!((snap.total() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn low_flux_counts_hits_instead_of_energy() {
        let ring = RingId::ALL[3];
        let (snap, result) =
            run_filter(vec![hit(ring, 7, 30, 1.8), hit(ring, 7, 31, 0.3)], true);
        result.unwrap();
        assert!((snap.ring(ring).get(7, 30) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_geometry_channel_is_invalid() {
        let ring = RingId::ALL[0];
        let (_, result) = run_filter(vec![hit(ring, 25, 10, 1.0)], false);
        assert!(matches!(result, Err(StageError::InvalidInput(_))));
    }

    #[test]
    fn negative_signal_is_invalid() {
        let ring = RingId::ALL[0];
        let (_, result) = run_filter(vec![hit(ring, 1, 10, -0.5)], false);
        assert!(matches!(result, Err(StageError::InvalidInput(_))));
    }
}
