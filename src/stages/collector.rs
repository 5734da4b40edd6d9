//! Histogram collector: folds per-ring results into the run accumulators.
//!
//! Runs only after the quality-skip scan, so every ring it sees is trusted
//! for the event. Each ring histogram is added into its slot of the
//! per-vertex-bin ring sums and into the event's summary histogram.

use super::{HistCollector, StageError};
use crate::config::RunConfig;
use crate::detector::VertexAxis;
use crate::hist::{Hist2D, RingHistos, RingSums};
use tracing::trace;

pub struct DefaultHistCollector {
    vertex_axis: VertexAxis,
}

impl DefaultHistCollector {
    pub fn new(cfg: &RunConfig) -> Self {
        Self { vertex_axis: cfg.inspector.vertex_axis }
    }
}

impl HistCollector for DefaultHistCollector {
    fn collect(
        &self,
        histos: &RingHistos,
        ring_sums: &mut RingSums,
        vertex_bin: u16,
        summary: &mut Hist2D,
        _centrality: f64,
    ) -> Result<(), StageError> {
        if vertex_bin >= self.vertex_axis.bins {
            return Err(StageError::BadVertexBin(vertex_bin));
        }

        for ring_hist in histos.iter() {
            ring_sums.accumulate(vertex_bin, ring_hist.ring, &ring_hist.hist);
            summary.add(&ring_hist.hist);
        }

        trace!(vertex_bin, summary_integral = summary.integral(), "Histograms collected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::RingId;

    fn setup() -> (DefaultHistCollector, RingHistos, RingSums, Hist2D) {
        let cfg = RunConfig::default();
        let collector = DefaultHistCollector::new(&cfg);
        let mut histos = RingHistos::new();
        for ring in RingId::ALL {
            histos.get_mut(ring).hist.fill(ring.strip_eta(100), 1.0, 2.0);
        }
        let sums = RingSums::new(&cfg.inspector.vertex_axis);
        (collector, histos, sums, Hist2D::default())
    }

    #[test]
    fn collect_updates_sums_and_summary() {
        let (collector, histos, mut sums, mut summary) = setup();
        collector.collect(&histos, &mut sums, 4, &mut summary, 30.0).unwrap();

        // Five rings, 2.0 each.
        assert!((summary.integral() - 10.0).abs() < 1e-12);
        assert!((sums.integral() - 10.0).abs() < 1e-12);
        let slot = sums.get(4, RingId::ALL[0]).map(Hist2D::integral).unwrap_or_default();
        assert!((slot - 2.0).abs() < 1e-12);
    }

    #[test]
    fn repeated_collection_accumulates() {
        let (collector, histos, mut sums, mut summary) = setup();
        collector.collect(&histos, &mut sums, 2, &mut summary, 30.0).unwrap();
        collector.collect(&histos, &mut sums, 2, &mut summary, 30.0).unwrap();
        assert!((sums.integral() - 20.0).abs() < 1e-12);
        assert!((summary.integral() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_vertex_bin_is_an_error() {
        let (collector, histos, mut sums, mut summary) = setup();
        let result = collector.collect(&histos, &mut sums, 10, &mut summary, 30.0);
        assert!(matches!(result, Err(StageError::BadVertexBin(10))));
        assert_eq!(sums.integral(), 0.0);
    }
}
