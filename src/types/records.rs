//! Per-event result records owned by the pipeline controller.

use super::event::CollisionSystem;
use super::flags::{ConditionSet, Trigger, TriggerSet};
use crate::hist::Hist2D;
use serde::{Deserialize, Serialize};

// ============================================================================
// Inspection (stage-1 output)
// ============================================================================

/// Everything the event inspector derives from one raw event.
#[derive(Debug, Clone)]
pub struct Inspection {
    /// Structural conditions found; gates the rest of the pipeline.
    pub conditions: ConditionSet,
    /// Trigger classification.
    pub triggers: TriggerSet,
    /// Whether low-flux (hit-counting) reconstruction applies.
    pub low_flux: bool,
    /// Vertex-z bin, when a vertex inside the window exists.
    pub vertex_bin: Option<u16>,
    /// Interaction point (x, y, z) in cm; zeroes when not reconstructed.
    pub ip: [f64; 3],
    /// Centrality percentile; negative when unavailable.
    pub centrality: f64,
    /// Central-detector cluster count.
    pub n_clusters: u16,
    /// Collision system tag, echoed for the output record.
    pub system: CollisionSystem,
    /// Collision energy per nucleon pair (GeV), echoed for the output record.
    pub snn_gev: f64,
}

// ============================================================================
// Processed output record
// ============================================================================

/// The event's reduced result as handed to the surrounding framework.
///
/// Cleared at the start of every event; becomes externally visible once the
/// controller marks the event for storage. Metadata committed before a later
/// gate rejects the event stays in the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub event_number: u64,
    pub triggers: TriggerSet,
    /// Collision energy per nucleon pair (GeV); 0 until inspection passes.
    pub snn_gev: f64,
    pub system: CollisionSystem,
    /// Centrality percentile; negative when unavailable.
    pub centrality: f64,
    pub n_clusters: u16,
    /// Primary-vertex z (cm). Unset until the vertex gates pass.
    pub ip_z: Option<f64>,
    /// Per-event d²N/dηdφ summary histogram.
    pub hist: Hist2D,
}

impl Default for ProcessedRecord {
    fn default() -> Self {
        Self {
            event_number: 0,
            triggers: TriggerSet::empty(),
            snn_gev: 0.0,
            system: CollisionSystem::Unknown,
            centrality: -1.0,
            n_clusters: 0,
            ip_z: None,
            hist: Hist2D::default(),
        }
    }
}

impl ProcessedRecord {
    /// Reset to the empty state; the histogram keeps its allocation.
    pub fn clear(&mut self) {
        self.event_number = 0;
        self.triggers = TriggerSet::empty();
        self.snn_gev = 0.0;
        self.system = CollisionSystem::Unknown;
        self.centrality = -1.0;
        self.n_clusters = 0;
        self.ip_z = None;
        self.hist.reset();
    }

    /// Whether the trigger classification includes the inelastic selection.
    pub fn is_inelastic(&self) -> bool {
        self.triggers.contains(Trigger::Inel)
    }

    /// Whether the event was tagged as pile-up.
    pub fn is_pileup(&self) -> bool {
        self.triggers.contains(Trigger::PileUp)
    }
}

// ============================================================================
// Reaction-plane record
// ============================================================================

/// Estimated reaction-plane angle with its Q-vector, populated only for the
/// PbPb regime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventplaneRecord {
    /// Estimated angle Ψ in [0, π), if the estimate converged.
    pub psi: Option<f64>,
    /// Second-harmonic Q-vector components (x, y).
    pub q: (f64, f64),
    /// Summed weight behind the Q-vector.
    pub weight: f64,
}

impl EventplaneRecord {
    pub fn clear(&mut self) {
        self.psi = None;
        self.q = (0.0, 0.0);
        self.weight = 0.0;
    }

    pub fn is_empty(&self) -> bool {
        self.psi.is_none() && self.weight == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::flags::Trigger;

    #[test]
    fn record_clear_resets_all_fields() {
        let mut rec = ProcessedRecord::default();
        rec.event_number = 42;
        rec.triggers.insert(Trigger::Inel);
        rec.snn_gev = 5020.0;
        rec.system = CollisionSystem::PbPb;
        rec.centrality = 12.5;
        rec.n_clusters = 300;
        rec.ip_z = Some(-3.1);
        rec.hist.fill(2.0, 1.0, 1.0);

        rec.clear();

        assert_eq!(rec.event_number, 0);
        assert!(rec.triggers.is_empty());
        assert_eq!(rec.snn_gev, 0.0);
        assert_eq!(rec.system, CollisionSystem::Unknown);
        assert!(rec.centrality < 0.0);
        assert!(rec.ip_z.is_none());
        assert!(rec.hist.is_empty());
    }

    #[test]
    fn inelastic_and_pileup_classification() {
        let mut rec = ProcessedRecord::default();
        assert!(!rec.is_inelastic());

        rec.triggers.insert(Trigger::Inel);
        assert!(rec.is_inelastic());
        assert!(!rec.is_pileup());

        rec.triggers.insert(Trigger::PileUp);
        assert!(rec.is_pileup());
    }

    #[test]
    fn eventplane_clear_empties_record() {
        let mut ep = EventplaneRecord {
            psi: Some(1.2),
            q: (0.3, -0.4),
            weight: 17.0,
        };
        assert!(!ep.is_empty());
        ep.clear();
        assert!(ep.is_empty());
    }
}
