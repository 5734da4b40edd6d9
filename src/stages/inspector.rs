//! Default event inspector.
//!
//! Derives the found-condition set, trigger classification, vertex bin, and
//! flux regime from a raw event. Pure inspection — it never touches the
//! payload and never fails.

use super::EventInspector;
use crate::config::defaults::{TRIGGER_LINE_INEL_GT0, TRIGGER_LINE_MB, TRIGGER_LINE_NSD};
use crate::config::{InspectorConfig, RunConfig};
use crate::types::{
    CollisionSystem, ConditionSet, EventCondition, Inspection, RawEvent, Trigger, TriggerSet,
};
use tracing::debug;

pub struct DefaultInspector {
    cfg: InspectorConfig,
}

impl DefaultInspector {
    pub fn new(cfg: &RunConfig) -> Self {
        Self { cfg: cfg.inspector.clone() }
    }

    fn triggers_of(event: &RawEvent) -> TriggerSet {
        let mut triggers = TriggerSet::empty();
        for line in &event.trigger_lines {
            match line.as_str() {
                TRIGGER_LINE_MB => triggers.insert(Trigger::Inel),
                TRIGGER_LINE_INEL_GT0 => {
                    triggers.insert(Trigger::Inel);
                    triggers.insert(Trigger::InelGt0);
                }
                TRIGGER_LINE_NSD => triggers.insert(Trigger::Nsd),
                other => debug!(line = other, "Unrecognized trigger line"),
            }
        }
        if event.pileup_tagged {
            triggers.insert(Trigger::PileUp);
        }
        triggers
    }

    /// An event with no triggers, no payload, no vertex, and no clusters is
    /// an empty readout slot rather than a collision.
    fn is_empty_readout(event: &RawEvent) -> bool {
        event.trigger_lines.is_empty()
            && event.payload.is_none()
            && event.vertex.is_none()
            && event.n_clusters == 0
    }
}

impl EventInspector for DefaultInspector {
    fn inspect(&self, event: &RawEvent) -> Inspection {
        let mut conditions = ConditionSet::empty();
        let triggers = Self::triggers_of(event);

        if Self::is_empty_readout(event) {
            conditions.insert(EventCondition::NoEvent);
        }
        if triggers.is_empty() {
            conditions.insert(EventCondition::NoTriggers);
        }
        if !event.has_cluster_data {
            conditions.insert(EventCondition::NoClusters);
        }
        if event.payload.as_ref().map_or(true, |p| p.is_empty()) {
            conditions.insert(EventCondition::NoPayload);
        }

        let mut vertex_bin = None;
        match event.vertex_z() {
            None => conditions.insert(EventCondition::NoVertex),
            Some(z) => match self.cfg.vertex_axis.bin(z) {
                Some(bin) => vertex_bin = Some(bin),
                None => conditions.insert(EventCondition::BadVertex),
            },
        }

        // Low flux applies to pp events with few central clusters only.
        let low_flux =
            event.system == CollisionSystem::PP && event.n_clusters < self.cfg.low_flux_cluster_cut;

        if !conditions.is_empty() {
            debug!(
                event = event.event_number,
                conditions = %conditions,
                "Inspection found structural conditions"
            );
        }

        Inspection {
            conditions,
            triggers,
            low_flux,
            vertex_bin,
            ip: event.vertex.unwrap_or([0.0, 0.0, 0.0]),
            centrality: event.centrality,
            n_clusters: event.n_clusters,
            system: event.system,
            snn_gev: event.snn_gev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{ChannelHit, DetectorPayload, RingId};

    fn inspector() -> DefaultInspector {
        DefaultInspector::new(&RunConfig::default())
    }

    fn event_with_payload(n: u64) -> RawEvent {
        let mut ev = RawEvent::shell(n);
        ev.trigger_lines = vec!["MB".to_string()];
        ev.vertex = Some([0.0, 0.0, 2.0]);
        ev.n_clusters = 150;
        ev.payload = Some(DetectorPayload {
            hits: vec![ChannelHit { ring: RingId::ALL[0], sector: 1, strip: 10, signal: 1.0 }],
        });
        ev
    }

    #[test]
    fn empty_readout_reports_no_event_and_no_triggers() {
        let insp = inspector().inspect(&RawEvent::shell(1));
        assert!(insp.conditions.contains(EventCondition::NoEvent));
        assert!(insp.conditions.contains(EventCondition::NoTriggers));
        assert!(insp.conditions.contains(EventCondition::NoPayload));
        assert!(insp.conditions.contains(EventCondition::NoVertex));
    }

    #[test]
    fn clean_event_has_no_conditions() {
        let insp = inspector().inspect(&event_with_payload(2));
        assert!(insp.conditions.is_empty(), "got {}", insp.conditions);
        assert!(insp.triggers.contains(Trigger::Inel));
        assert_eq!(insp.vertex_bin, Some(6));
    }

    #[test]
    fn vertex_outside_window_is_bad_not_missing() {
        let mut ev = event_with_payload(3);
        ev.vertex = Some([0.0, 0.0, 14.0]);
        let insp = inspector().inspect(&ev);
        assert!(insp.conditions.contains(EventCondition::BadVertex));
        assert!(!insp.conditions.contains(EventCondition::NoVertex));
        assert_eq!(insp.vertex_bin, None);
    }

    #[test]
    fn pileup_tag_becomes_trigger_bit_not_condition() {
        let mut ev = event_with_payload(4);
        ev.pileup_tagged = true;
        let insp = inspector().inspect(&ev);
        assert!(insp.triggers.contains(Trigger::PileUp));
        assert!(insp.conditions.is_empty());
    }

    #[test]
    fn missing_cluster_data_is_reported_only() {
        let mut ev = event_with_payload(5);
        ev.has_cluster_data = false;
        let insp = inspector().inspect(&ev);
        assert!(insp.conditions.contains(EventCondition::NoClusters));
        // Still a perfectly inspectable event otherwise.
        assert!(insp.triggers.contains(Trigger::Inel));
    }

    #[test]
    fn low_flux_requires_pp_and_few_clusters() {
        let mut ev = event_with_payload(6);
        ev.system = CollisionSystem::PP;
        ev.n_clusters = 10;
        assert!(inspector().inspect(&ev).low_flux);

        ev.n_clusters = 500;
        assert!(!inspector().inspect(&ev).low_flux);

        ev.n_clusters = 10;
        ev.system = CollisionSystem::PbPb;
        assert!(!inspector().inspect(&ev).low_flux);
    }

    #[test]
    fn inel_gt0_line_implies_inel() {
        let mut ev = event_with_payload(7);
        ev.trigger_lines = vec!["INEL>0".to_string()];
        let insp = inspector().inspect(&ev);
        assert!(insp.triggers.contains(Trigger::Inel));
        assert!(insp.triggers.contains(Trigger::InelGt0));
    }
}
