//! Collaborator stages consumed by the pipeline controller.
//!
//! Each stage sits behind a narrow trait so the controller depends only on
//! the contract, and tests can substitute doubles through the same seam. The
//! default implementations here are deliberately simple numeric passes; the
//! real calibrations live outside this crate's scope.
//!
//! A stage failure never escapes the per-event boundary: the controller
//! converts any [`StageError`] into a warning plus an event reject.

mod collector;
mod corrections;
mod density;
mod eventplane;
mod fixer;
mod inspector;
mod sharing;

pub use collector::DefaultHistCollector;
pub use corrections::DefaultCorrectionApplier;
pub use density::DefaultDensityCalculator;
pub use eventplane::DefaultEventplaneFinder;
pub use fixer::AmplitudeFixer;
pub use inspector::DefaultInspector;
pub use sharing::DefaultSharingFilter;

use crate::detector::{DetectorPayload, DetectorSnapshot};
use crate::hist::{Hist2D, RingHistos, RingSums};
use crate::types::{CorrectionSet, EventplaneRecord, Inspection, RawEvent};
use thiserror::Error;

/// Stage-local failure. Fatal to the event, recoverable for the run.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("no data to work on: {0}")]
    NoInput(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("estimate did not converge: {0}")]
    NoConvergence(&'static str),

    #[error("vertex bin {0} outside the accumulator range")]
    BadVertexBin(u16),
}

/// Stage 1: inspect the raw event.
///
/// Never fails; everything it learns, including structural problems, is
/// reported through the returned [`Inspection`].
pub trait EventInspector: Send {
    fn inspect(&self, event: &RawEvent) -> Inspection;
}

/// Stage 3: merge adjacent-channel spillover into discrete hit estimates,
/// writing the result into the controller-owned snapshot.
pub trait SharingFilter: Send {
    fn filter(
        &self,
        payload: &DetectorPayload,
        low_flux: bool,
        vertex_z: f64,
        out: &mut DetectorSnapshot,
    ) -> Result<(), StageError>;
}

/// Stage 4: compute per-ring density histograms from the snapshot.
///
/// Also sets the per-ring skip flags on `histos` as a side effect when a
/// ring's data is an outlier for this event.
pub trait DensityCalculator: Send {
    fn calculate(
        &self,
        snapshot: &DetectorSnapshot,
        histos: &mut RingHistos,
        low_flux: bool,
        centrality: f64,
        ip: [f64; 3],
    ) -> Result<(), StageError>;
}

/// Stage 5 (PbPb only): estimate the reaction-plane angle.
pub trait EventplaneFinder: Send {
    fn find(
        &self,
        event: &RawEvent,
        summary: &Hist2D,
        histos: &RingHistos,
    ) -> Result<EventplaneRecord, StageError>;
}

/// Stage 7: apply the active multiplicative correction maps.
pub trait CorrectionApplier: Send {
    fn correct(
        &self,
        histos: &mut RingHistos,
        vertex_bin: u16,
        enabled: &CorrectionSet,
    ) -> Result<(), StageError>;
}

/// Stage 8: fold the corrected working histograms into the long-lived
/// ring-sum accumulators and the record's summary histogram.
pub trait HistCollector: Send {
    fn collect(
        &self,
        histos: &RingHistos,
        ring_sums: &mut RingSums,
        vertex_bin: u16,
        summary: &mut Hist2D,
        centrality: f64,
    ) -> Result<(), StageError>;
}
