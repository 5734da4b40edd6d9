//! Tagged flag sets used throughout the pipeline.
//!
//! Three independent sets: the conditions found by the event inspector, the
//! trigger classification of an event, and the run-wide mask of corrections
//! still needed. Each is a named-membership set (`contains(NoVertex)`,
//! `contains(PileUp)`) rather than a bag of raw bit positions, so every gate
//! in the controller reads as the condition it tests.

use serde::{Deserialize, Serialize};

// ============================================================================
// Found conditions (event inspector output)
// ============================================================================

/// Structural conditions the event inspector can report for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventCondition {
    /// No usable event at all (empty input record).
    NoEvent,
    /// Event carries no recognized trigger information.
    NoTriggers,
    /// Central cluster data missing. Reported but never gated on: dropping
    /// these events would bias the sample, so they flow through the pipeline.
    NoClusters,
    /// Forward-detector payload missing.
    NoPayload,
    /// No reconstructed primary vertex.
    NoVertex,
    /// Vertex reconstructed outside the accepted z window.
    BadVertex,
}

impl EventCondition {
    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Set of [`EventCondition`] values for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSet(u16);

impl ConditionSet {
    /// The empty set (a fully well-formed event).
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn with(self, c: EventCondition) -> Self {
        Self(self.0 | c.bit())
    }

    pub fn insert(&mut self, c: EventCondition) {
        self.0 |= c.bit();
    }

    pub const fn contains(self, c: EventCondition) -> bool {
        self.0 & c.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for ConditionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use EventCondition::{BadVertex, NoClusters, NoEvent, NoPayload, NoTriggers, NoVertex};
        let mut first = true;
        for c in [NoEvent, NoTriggers, NoClusters, NoPayload, NoVertex, BadVertex] {
            if self.contains(c) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{c:?}")?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

// ============================================================================
// Trigger classification
// ============================================================================

/// Trigger bits carried by an event and copied into the output record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Inelastic minimum-bias trigger.
    Inel,
    /// Inelastic with at least one central tracklet.
    InelGt0,
    /// Non-single-diffractive selection.
    Nsd,
    /// More than one interaction in the readout window. Never a structural
    /// reject: pile-up events are excluded only at min-bias accumulation.
    PileUp,
}

impl Trigger {
    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Set of [`Trigger`] bits for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSet(u16);

impl TriggerSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn with(self, t: Trigger) -> Self {
        Self(self.0 | t.bit())
    }

    pub fn insert(&mut self, t: Trigger) {
        self.0 |= t.bit();
    }

    pub const fn contains(self, t: Trigger) -> bool {
        self.0 & t.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for TriggerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for t in [Trigger::Inel, Trigger::InelGt0, Trigger::Nsd, Trigger::PileUp] {
            if self.contains(t) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{t:?}")?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

// ============================================================================
// Needed corrections (run-wide mask)
// ============================================================================

/// Multiplicative correction maps the run can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Correction {
    /// Secondary-particle contamination map.
    SecondaryMap,
    /// Vertex-position acceptance bias.
    VertexBias,
    /// Hit-merging efficiency.
    MergingEfficiency,
    /// Dead-region acceptance.
    Acceptance,
    /// Noise/gain equalization. May be disabled for the whole run by the
    /// pre-run detector-health probe.
    NoiseGain,
}

impl Correction {
    const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// All corrections, in application order.
    pub const ALL: [Self; 5] = [
        Self::SecondaryMap,
        Self::VertexBias,
        Self::MergingEfficiency,
        Self::Acceptance,
        Self::NoiseGain,
    ];
}

/// Run-wide mask of active corrections.
///
/// Mutated at most once per run (by the pre-run health probe) and read by the
/// correction applier on every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionSet(u16);

impl Default for CorrectionSet {
    fn default() -> Self {
        Self::all()
    }
}

impl CorrectionSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Mask with every correction enabled (the run-start default).
    pub const fn all() -> Self {
        Self(Correction::SecondaryMap.bit()
            | Correction::VertexBias.bit()
            | Correction::MergingEfficiency.bit()
            | Correction::Acceptance.bit()
            | Correction::NoiseGain.bit())
    }

    #[must_use]
    pub const fn with(self, c: Correction) -> Self {
        Self(self.0 | c.bit())
    }

    pub fn insert(&mut self, c: Correction) {
        self.0 |= c.bit();
    }

    pub fn remove(&mut self, c: Correction) {
        self.0 &= !c.bit();
    }

    pub const fn contains(self, c: Correction) -> bool {
        self.0 & c.bit() != 0
    }
}

impl std::fmt::Display for CorrectionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for c in Correction::ALL {
            if self.contains(c) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{c:?}")?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_set_membership() {
        let set = ConditionSet::empty()
            .with(EventCondition::NoVertex)
            .with(EventCondition::NoClusters);

        assert!(set.contains(EventCondition::NoVertex));
        assert!(set.contains(EventCondition::NoClusters));
        assert!(!set.contains(EventCondition::NoEvent));
        assert!(!set.contains(EventCondition::BadVertex));
        assert!(!set.is_empty());
    }

    #[test]
    fn condition_set_display_lists_names() {
        let set = ConditionSet::empty()
            .with(EventCondition::NoPayload)
            .with(EventCondition::BadVertex);
        assert_eq!(set.to_string(), "NoPayload|BadVertex");
        assert_eq!(ConditionSet::empty().to_string(), "none");
    }

    #[test]
    fn trigger_set_insert_and_contains() {
        let mut set = TriggerSet::empty();
        assert!(set.is_empty());

        set.insert(Trigger::Inel);
        set.insert(Trigger::PileUp);
        assert!(set.contains(Trigger::Inel));
        assert!(set.contains(Trigger::PileUp));
        assert!(!set.contains(Trigger::Nsd));
    }

    #[test]
    fn correction_mask_defaults_to_all() {
        let mask = CorrectionSet::default();
        for c in Correction::ALL {
            assert!(mask.contains(c), "{c:?} should be enabled by default");
        }
    }

    #[test]
    fn correction_mask_remove_is_permanent_for_value() {
        let mut mask = CorrectionSet::all();
        mask.remove(Correction::NoiseGain);
        assert!(!mask.contains(Correction::NoiseGain));
        assert!(mask.contains(Correction::SecondaryMap));
        assert!(mask.contains(Correction::Acceptance));
    }

    #[test]
    fn flag_sets_survive_serde_round_trip() {
        let set = TriggerSet::empty().with(Trigger::Inel).with(Trigger::Nsd);
        let json = serde_json::to_string(&set).unwrap();
        let back: TriggerSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
    }
}
