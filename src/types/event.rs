//! Raw collision-event input record.

use crate::detector::DetectorPayload;
use serde::{Deserialize, Serialize};

/// Collision system of the run, as tagged by reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionSystem {
    #[default]
    Unknown,
    /// Proton–proton.
    PP,
    /// Proton–lead.
    PPb,
    /// Lead–lead. The only regime with reaction-plane estimation.
    PbPb,
}

impl std::fmt::Display for CollisionSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::PP => write!(f, "pp"),
            Self::PPb => write!(f, "pPb"),
            Self::PbPb => write!(f, "PbPb"),
        }
    }
}

/// One recorded collision event as handed to the pipeline.
///
/// A reconstruction pass upstream produces these; the pipeline never writes
/// back to anything except the detector payload (repaired in place by the
/// raw-data fixer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event number within the run.
    pub event_number: u64,

    /// Unix timestamp of the readout, seconds.
    #[serde(default)]
    pub timestamp: u64,

    /// Collision system tag.
    #[serde(default)]
    pub system: CollisionSystem,

    /// Center-of-mass energy per nucleon pair (GeV).
    #[serde(default)]
    pub snn_gev: f64,

    /// Fired trigger class names, e.g. `MB`, `INEL>0`, `NSD`.
    #[serde(default)]
    pub trigger_lines: Vec<String>,

    /// Pile-up tag from the central pile-up finder.
    #[serde(default)]
    pub pileup_tagged: bool,

    /// Whether central cluster data was read out for this event.
    #[serde(default = "default_true")]
    pub has_cluster_data: bool,

    /// Cluster count from the central detector.
    #[serde(default)]
    pub n_clusters: u16,

    /// Reconstructed primary vertex (x, y, z) in cm, if any.
    #[serde(default)]
    pub vertex: Option<[f64; 3]>,

    /// Centrality percentile estimate; negative when not available.
    #[serde(default = "default_centrality")]
    pub centrality: f64,

    /// Forward-detector payload, if read out.
    #[serde(default)]
    pub payload: Option<DetectorPayload>,
}

const fn default_true() -> bool {
    true
}

const fn default_centrality() -> f64 {
    -1.0
}

impl RawEvent {
    /// A minimal well-formed event shell, mostly for tests and the simulator.
    pub fn shell(event_number: u64) -> Self {
        Self {
            event_number,
            timestamp: 0,
            system: CollisionSystem::Unknown,
            snn_gev: 0.0,
            trigger_lines: Vec::new(),
            pileup_tagged: false,
            has_cluster_data: true,
            n_clusters: 0,
            vertex: None,
            centrality: -1.0,
            payload: None,
        }
    }

    /// Vertex z position, if a vertex was reconstructed.
    pub fn vertex_z(&self) -> Option<f64> {
        self.vertex.map(|v| v[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_has_no_payload_and_no_vertex() {
        let ev = RawEvent::shell(7);
        assert_eq!(ev.event_number, 7);
        assert!(ev.payload.is_none());
        assert!(ev.vertex_z().is_none());
        assert!(ev.has_cluster_data);
        assert!(ev.centrality < 0.0);
    }

    #[test]
    fn deserializes_with_defaults() {
        let ev: RawEvent = serde_json::from_str(r#"{"event_number": 3}"#).unwrap();
        assert_eq!(ev.event_number, 3);
        assert_eq!(ev.system, CollisionSystem::Unknown);
        assert!(ev.trigger_lines.is_empty());
        assert!(!ev.pileup_tagged);
        assert!(ev.has_cluster_data);
    }

    #[test]
    fn vertex_z_reads_third_component() {
        let mut ev = RawEvent::shell(1);
        ev.vertex = Some([0.01, -0.02, 4.2]);
        assert!((ev.vertex_z().unwrap() - 4.2).abs() < 1e-12);
    }
}
