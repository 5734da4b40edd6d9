//! Controller gating tests.
//!
//! Exercises the controller's gate sequence and flag bookkeeping with
//! scripted stage doubles, so each gate can be driven directly: reject
//! points, metadata commit order, the PbPb-only reaction-plane pass, the
//! quality skip, the one-shot health probe, and min-bias accumulation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use forward_mult::config::RunConfig;
use forward_mult::detector::{ChannelHit, DetectorPayload, DetectorSnapshot, RingId};
use forward_mult::hist::{Hist2D, RingHistos, RingSums};
use forward_mult::pipeline::EventPipeline;
use forward_mult::stages::{
    CorrectionApplier, DensityCalculator, EventInspector, EventplaneFinder, HistCollector,
    SharingFilter, StageError,
};
use forward_mult::types::{
    CollisionSystem, ConditionSet, CorrectionSet, EventCondition, EventplaneRecord, Inspection,
    ProcessedRecord, RawEvent, Trigger, TriggerSet,
};

// ============================================================================
// Stage doubles
// ============================================================================

/// Inspector that returns a pre-scripted inspection regardless of input.
struct ScriptedInspector {
    inspection: Inspection,
}

impl EventInspector for ScriptedInspector {
    fn inspect(&self, _event: &RawEvent) -> Inspection {
        self.inspection.clone()
    }
}

/// Sharing filter that records the low-flux flag it was handed.
struct RecordingSharing {
    calls: Arc<AtomicUsize>,
    saw_low_flux: Arc<AtomicBool>,
    fail: bool,
}

impl SharingFilter for RecordingSharing {
    fn filter(
        &self,
        _payload: &DetectorPayload,
        low_flux: bool,
        _vertex_z: f64,
        _out: &mut DetectorSnapshot,
    ) -> Result<(), StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.saw_low_flux.store(low_flux, Ordering::SeqCst);
        if self.fail {
            return Err(StageError::NoInput("scripted failure"));
        }
        Ok(())
    }
}

/// Density pass that fills each ring with one entry and optionally flags one
/// ring as an outlier.
struct ScriptedDensity {
    skip_ring: Option<RingId>,
}

impl DensityCalculator for ScriptedDensity {
    fn calculate(
        &self,
        _snapshot: &DetectorSnapshot,
        histos: &mut RingHistos,
        _low_flux: bool,
        _centrality: f64,
        _ip: [f64; 3],
    ) -> Result<(), StageError> {
        for rh in histos.iter_mut() {
            rh.hist.fill(2.0, 1.0, 1.0);
            if Some(rh.ring) == self.skip_ring {
                rh.skip = true;
            }
        }
        Ok(())
    }
}

struct CountingEventplane {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl EventplaneFinder for CountingEventplane {
    fn find(
        &self,
        _event: &RawEvent,
        _summary: &Hist2D,
        _histos: &RingHistos,
    ) -> Result<EventplaneRecord, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StageError::NoConvergence("scripted failure"));
        }
        Ok(EventplaneRecord {
            psi: Some(0.7),
            q: (1.0, 0.5),
            weight: 4.0,
        })
    }
}

struct CountingCorrections {
    calls: Arc<AtomicUsize>,
}

impl CorrectionApplier for CountingCorrections {
    fn correct(
        &self,
        _histos: &mut RingHistos,
        _vertex_bin: u16,
        _enabled: &CorrectionSet,
    ) -> Result<(), StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct CountingCollector {
    calls: Arc<AtomicUsize>,
}

impl HistCollector for CountingCollector {
    fn collect(
        &self,
        histos: &RingHistos,
        _ring_sums: &mut RingSums,
        _vertex_bin: u16,
        summary: &mut Hist2D,
        _centrality: f64,
    ) -> Result<(), StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for rh in histos.iter() {
            summary.add(&rh.hist);
        }
        Ok(())
    }
}

// ============================================================================
// Builders
// ============================================================================

struct Doubles {
    sharing_calls: Arc<AtomicUsize>,
    sharing_low_flux: Arc<AtomicBool>,
    eventplane_calls: Arc<AtomicUsize>,
    correction_calls: Arc<AtomicUsize>,
    collector_calls: Arc<AtomicUsize>,
}

struct Script {
    inspection: Inspection,
    sharing_fails: bool,
    eventplane_fails: bool,
    skip_ring: Option<RingId>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            inspection: clean_inspection(),
            sharing_fails: false,
            eventplane_fails: false,
            skip_ring: None,
        }
    }
}

fn clean_inspection() -> Inspection {
    Inspection {
        conditions: ConditionSet::empty(),
        triggers: TriggerSet::empty().with(Trigger::Inel),
        low_flux: false,
        vertex_bin: Some(5),
        ip: [0.02, -0.01, 1.3],
        centrality: -1.0,
        n_clusters: 42,
        system: CollisionSystem::PP,
        snn_gev: 13000.0,
    }
}

fn build_pipeline(cfg: &RunConfig, script: Script) -> (EventPipeline, Doubles) {
    let doubles = Doubles {
        sharing_calls: Arc::new(AtomicUsize::new(0)),
        sharing_low_flux: Arc::new(AtomicBool::new(false)),
        eventplane_calls: Arc::new(AtomicUsize::new(0)),
        correction_calls: Arc::new(AtomicUsize::new(0)),
        collector_calls: Arc::new(AtomicUsize::new(0)),
    };
    let pipeline = EventPipeline::with_stages(
        cfg,
        Box::new(ScriptedInspector {
            inspection: script.inspection,
        }),
        Box::new(RecordingSharing {
            calls: doubles.sharing_calls.clone(),
            saw_low_flux: doubles.sharing_low_flux.clone(),
            fail: script.sharing_fails,
        }),
        Box::new(ScriptedDensity {
            skip_ring: script.skip_ring,
        }),
        Box::new(CountingEventplane {
            calls: doubles.eventplane_calls.clone(),
            fail: script.eventplane_fails,
        }),
        Box::new(CountingCorrections {
            calls: doubles.correction_calls.clone(),
        }),
        Box::new(CountingCollector {
            calls: doubles.collector_calls.clone(),
        }),
    );
    (pipeline, doubles)
}

fn event_with_payload(n: u64) -> RawEvent {
    let mut ev = RawEvent::shell(n);
    ev.trigger_lines = vec!["MB".to_string()];
    ev.vertex = Some([0.0, 0.0, 1.3]);
    ev.payload = Some(DetectorPayload {
        hits: vec![ChannelHit {
            ring: RingId::ALL[0],
            sector: 3,
            strip: 100,
            signal: 1.1,
        }],
    });
    ev
}

fn run_one(pipeline: &mut EventPipeline, event: &mut RawEvent) -> bool {
    pipeline.pre_event();
    pipeline.event(event)
}

// ============================================================================
// Structural gates
// ============================================================================

#[test]
fn no_trigger_reject_commits_nothing() {
    let cfg = RunConfig::default();
    let mut script = Script::default();
    script.inspection.conditions = ConditionSet::empty().with(EventCondition::NoTriggers);
    let (mut pipeline, doubles) = build_pipeline(&cfg, script);

    let mut ev = event_with_payload(1);
    assert!(!run_one(&mut pipeline, &mut ev));

    // Nothing committed, nothing marked, no stage ran.
    assert!(!pipeline.store_marked());
    assert_eq!(pipeline.record().event_number, 0);
    assert!(pipeline.record().triggers.is_empty());
    assert_eq!(doubles.sharing_calls.load(Ordering::SeqCst), 0);
    assert_eq!(pipeline.stats().rejected_structural, 1);
}

#[test]
fn metadata_survives_a_missing_payload_reject() {
    let cfg = RunConfig::default();
    let mut script = Script::default();
    script.inspection.conditions = ConditionSet::empty().with(EventCondition::NoPayload);
    script.inspection.vertex_bin = None;
    let (mut pipeline, doubles) = build_pipeline(&cfg, script);

    let mut ev = event_with_payload(9);
    assert!(!run_one(&mut pipeline, &mut ev));

    // Trigger gate passed, so the metadata is committed and the record is
    // marked for storage even though the event was rejected.
    assert!(pipeline.store_marked());
    let rec: &ProcessedRecord = pipeline.record();
    assert_eq!(rec.event_number, 9);
    assert!(rec.is_inelastic());
    assert_eq!(rec.snn_gev, 13000.0);
    assert_eq!(rec.n_clusters, 42);
    // But the vertex gates never passed.
    assert!(rec.ip_z.is_none());
    assert_eq!(doubles.sharing_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn vertex_z_committed_on_window_reject_but_not_on_missing_vertex() {
    let cfg = RunConfig::default();

    // Vertex exists but lies outside the window: ip_z is committed.
    let mut script = Script::default();
    script.inspection.conditions = ConditionSet::empty().with(EventCondition::BadVertex);
    script.inspection.vertex_bin = None;
    script.inspection.ip = [0.0, 0.0, 17.5];
    let (mut pipeline, _) = build_pipeline(&cfg, script);
    let mut ev = event_with_payload(2);
    assert!(!run_one(&mut pipeline, &mut ev));
    assert_eq!(pipeline.record().ip_z, Some(17.5));

    // No vertex at all: ip_z stays unset.
    let mut script = Script::default();
    script.inspection.conditions = ConditionSet::empty().with(EventCondition::NoVertex);
    script.inspection.vertex_bin = None;
    let (mut pipeline, _) = build_pipeline(&cfg, script);
    let mut ev = event_with_payload(3);
    assert!(!run_one(&mut pipeline, &mut ev));
    assert!(pipeline.record().ip_z.is_none());
}

#[test]
fn missing_cluster_data_never_gates() {
    let cfg = RunConfig::default();
    let mut script = Script::default();
    script.inspection.conditions = ConditionSet::empty().with(EventCondition::NoClusters);
    let (mut pipeline, doubles) = build_pipeline(&cfg, script);

    let mut ev = event_with_payload(4);
    assert!(run_one(&mut pipeline, &mut ev));
    assert_eq!(doubles.collector_calls.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.stats().accepted, 1);
}

// ============================================================================
// Stage failures and the quality skip
// ============================================================================

#[test]
fn stage_failure_costs_the_event_not_the_run() {
    let cfg = RunConfig::default();
    let script = Script {
        sharing_fails: true,
        ..Script::default()
    };
    let (mut pipeline, doubles) = build_pipeline(&cfg, script);

    let mut ev = event_with_payload(5);
    assert!(!run_one(&mut pipeline, &mut ev));
    assert_eq!(pipeline.stats().rejected_stage, 1);
    // The record was still marked at the trigger gate.
    assert!(pipeline.store_marked());
    assert_eq!(doubles.collector_calls.load(Ordering::SeqCst), 0);

    // The next clean event processes normally.
    let script = Script::default();
    let (mut pipeline, _) = build_pipeline(&cfg, script);
    let mut ev = event_with_payload(6);
    assert!(run_one(&mut pipeline, &mut ev));
}

#[test]
fn outlier_ring_drops_the_event_before_corrections() {
    let cfg = RunConfig::default();
    let script = Script {
        skip_ring: Some(RingId::ALL[2]),
        ..Script::default()
    };
    let (mut pipeline, doubles) = build_pipeline(&cfg, script);

    let mut ev = event_with_payload(7);
    assert!(!run_one(&mut pipeline, &mut ev));
    assert_eq!(pipeline.stats().rejected_quality, 1);
    assert_eq!(doubles.correction_calls.load(Ordering::SeqCst), 0);
    assert_eq!(doubles.collector_calls.load(Ordering::SeqCst), 0);
    assert_eq!(pipeline.stats().min_bias_events, 0);
}

// ============================================================================
// Reaction plane
// ============================================================================

#[test]
fn eventplane_runs_only_for_pbpb() {
    let cfg = RunConfig::default();

    let (mut pipeline, doubles) = build_pipeline(&cfg, Script::default());
    let mut ev = event_with_payload(10);
    assert!(run_one(&mut pipeline, &mut ev));
    assert_eq!(doubles.eventplane_calls.load(Ordering::SeqCst), 0);
    assert!(pipeline.eventplane_record().is_empty());

    let mut script = Script::default();
    script.inspection.system = CollisionSystem::PbPb;
    script.inspection.centrality = 30.0;
    let (mut pipeline, doubles) = build_pipeline(&cfg, script);
    let mut ev = event_with_payload(11);
    ev.system = CollisionSystem::PbPb;
    assert!(run_one(&mut pipeline, &mut ev));
    assert_eq!(doubles.eventplane_calls.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.eventplane_record().psi, Some(0.7));
}

#[test]
fn eventplane_failure_costs_the_estimate_not_the_event() {
    let cfg = RunConfig::default();
    let mut script = Script {
        eventplane_fails: true,
        ..Script::default()
    };
    script.inspection.system = CollisionSystem::PbPb;
    script.inspection.centrality = 12.0;
    let (mut pipeline, doubles) = build_pipeline(&cfg, script);

    let mut ev = event_with_payload(12);
    ev.system = CollisionSystem::PbPb;
    assert!(run_one(&mut pipeline, &mut ev));
    assert_eq!(doubles.eventplane_calls.load(Ordering::SeqCst), 1);
    assert!(pipeline.eventplane_record().is_empty());
    assert_eq!(doubles.collector_calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Low-flux switch
// ============================================================================

#[test]
fn low_flux_is_forced_off_unless_enabled() {
    let mut script = Script::default();
    script.inspection.low_flux = true;

    let cfg = RunConfig::default();
    assert!(!cfg.run.enable_low_flux);
    let (mut pipeline, doubles) = build_pipeline(&cfg, script);
    let mut ev = event_with_payload(20);
    assert!(run_one(&mut pipeline, &mut ev));
    assert!(!doubles.sharing_low_flux.load(Ordering::SeqCst));

    let mut cfg = RunConfig::default();
    cfg.run.enable_low_flux = true;
    let mut script = Script::default();
    script.inspection.low_flux = true;
    let (mut pipeline, doubles) = build_pipeline(&cfg, script);
    let mut ev = event_with_payload(21);
    assert!(run_one(&mut pipeline, &mut ev));
    assert!(doubles.sharing_low_flux.load(Ordering::SeqCst));
}

// ============================================================================
// Min-bias accumulation
// ============================================================================

#[test]
fn pileup_events_are_accepted_but_not_accumulated() {
    let cfg = RunConfig::default();
    let mut script = Script::default();
    script.inspection.triggers = TriggerSet::empty()
        .with(Trigger::Inel)
        .with(Trigger::PileUp);
    let (mut pipeline, doubles) = build_pipeline(&cfg, script);

    let mut ev = event_with_payload(30);
    assert!(run_one(&mut pipeline, &mut ev));
    assert_eq!(doubles.collector_calls.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.stats().accepted, 1);
    assert_eq!(pipeline.stats().min_bias_events, 0);
    assert!(pipeline.min_bias().is_empty());
}

#[test]
fn non_inelastic_events_are_not_accumulated() {
    let cfg = RunConfig::default();
    let mut script = Script::default();
    script.inspection.triggers = TriggerSet::empty().with(Trigger::Nsd);
    let (mut pipeline, _) = build_pipeline(&cfg, script);

    let mut ev = event_with_payload(31);
    assert!(run_one(&mut pipeline, &mut ev));
    assert_eq!(pipeline.stats().min_bias_events, 0);
}

#[test]
fn clean_inelastic_events_accumulate_min_bias() {
    let cfg = RunConfig::default();
    let (mut pipeline, _) = build_pipeline(&cfg, Script::default());

    for n in 40..43u64 {
        let mut ev = event_with_payload(n);
        assert!(run_one(&mut pipeline, &mut ev));
    }
    assert_eq!(pipeline.stats().min_bias_events, 3);
    assert!(!pipeline.min_bias().is_empty());
}

#[test]
fn min_bias_grows_by_exactly_the_summary_integral() {
    let cfg = RunConfig::default();
    let (mut pipeline, _) = build_pipeline(&cfg, Script::default());

    let mut ev = event_with_payload(50);
    assert!(run_one(&mut pipeline, &mut ev));
    let per_event = pipeline.record().hist.integral();
    assert!(per_event > 0.0);
    assert!((pipeline.min_bias().integral() - per_event).abs() < 1e-12);

    let mut ev = event_with_payload(51);
    assert!(run_one(&mut pipeline, &mut ev));
    // The record is reset per event; the accumulator carries the sum.
    assert!((pipeline.record().hist.integral() - per_event).abs() < 1e-12);
    assert!((pipeline.min_bias().integral() - 2.0 * per_event).abs() < 1e-12);
}

// ============================================================================
// Per-event reset
// ============================================================================

#[test]
fn repeated_pre_event_resets_are_idempotent() {
    let cfg = RunConfig::default();
    let (mut pipeline, _) = build_pipeline(&cfg, Script::default());

    let mut ev = event_with_payload(60);
    assert!(run_one(&mut pipeline, &mut ev));
    assert!(pipeline.store_marked());
    assert!(!pipeline.record().hist.is_empty());

    // One reset clears everything; a second reset is a no-op on the already
    // cleared state.
    for _ in 0..2 {
        pipeline.pre_event();
        assert!(!pipeline.store_marked());
        assert_eq!(pipeline.record().event_number, 0);
        assert!(pipeline.record().triggers.is_empty());
        assert!(pipeline.record().ip_z.is_none());
        assert!(pipeline.record().hist.is_empty());
        assert!(pipeline.eventplane_record().is_empty());
    }

    // Run state survives the resets and the next event processes normally.
    let mut ev = event_with_payload(61);
    assert!(run_one(&mut pipeline, &mut ev));
    assert_eq!(pipeline.stats().accepted, 2);
}

// ============================================================================
// Health probe
// ============================================================================

fn rich_payload_event(spread: f64) -> RawEvent {
    // 60 hits alternating around the MIP peak so the probe has enough data
    // and a controllable spread.
    let mut ev = event_with_payload(1);
    let mut hits = Vec::new();
    for i in 0..60u16 {
        let signal = if i % 2 == 0 { 1.0 - spread } else { 1.0 + spread };
        hits.push(ChannelHit {
            ring: RingId::ALL[(i % 5) as usize],
            sector: i % 20,
            strip: i,
            signal,
        });
    }
    ev.payload = Some(DetectorPayload { hits });
    ev
}

#[test]
fn probe_fallback_disables_noise_gain_for_the_run() {
    let cfg = RunConfig::default();
    let (mut pipeline, _) = build_pipeline(&cfg, Script::default());
    assert!(pipeline
        .needed_corrections()
        .contains(forward_mult::types::Correction::NoiseGain));

    // Too few hits for a usable spread estimate: probe falls back.
    let ev = event_with_payload(1);
    pipeline.pre_run(Some(&ev));

    assert!(pipeline.probe_done());
    assert_eq!(pipeline.reco_noise_factor(), cfg.fixer.fallback_noise_factor);
    assert!(!pipeline
        .needed_corrections()
        .contains(forward_mult::types::Correction::NoiseGain));
}

#[test]
fn probe_adopts_a_usable_target_and_keeps_noise_gain() {
    let cfg = RunConfig::default();
    let (mut pipeline, _) = build_pipeline(&cfg, Script::default());

    // Spread of 0.5 around the peak maps to a target factor of 2.
    let ev = rich_payload_event(0.5);
    pipeline.pre_run(Some(&ev));

    assert!(pipeline.probe_done());
    assert_eq!(pipeline.reco_noise_factor(), 2);
    assert!(pipeline
        .needed_corrections()
        .contains(forward_mult::types::Correction::NoiseGain));
}

#[test]
fn probe_runs_at_most_once() {
    let cfg = RunConfig::default();
    let (mut pipeline, _) = build_pipeline(&cfg, Script::default());

    // A call without an event does not consume the one shot.
    pipeline.pre_run(None);
    assert!(!pipeline.probe_done());

    let ev = rich_payload_event(0.5);
    pipeline.pre_run(Some(&ev));
    assert_eq!(pipeline.reco_noise_factor(), 2);

    // A second call with a different spread changes nothing.
    let ev = rich_payload_event(1.0);
    pipeline.pre_run(Some(&ev));
    assert_eq!(pipeline.reco_noise_factor(), 2);
}
