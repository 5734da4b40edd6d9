//! Per-event pipeline controller.
//!
//! Owns the stage collaborators and the per-event working state, and runs
//! each raw event through the gated stage sequence: inspect, gate on
//! structural conditions, fix amplitudes, share, compute densities, estimate
//! the reaction plane (PbPb only), check data quality, correct, and collect.
//! Rejected events leave whatever metadata was already committed to the
//! output record; only events that survived the trigger gate are marked for
//! storage at all.
//!
//! Stage failures are contained: a failing stage costs the event, never the
//! run.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::detector::DetectorSnapshot;
use crate::hist::{Hist2D, RingHistos, RingSums, ETA_BINS, ETA_MAX, ETA_MIN, PHI_BINS};
use crate::stages::{
    AmplitudeFixer, CorrectionApplier, DefaultCorrectionApplier, DefaultDensityCalculator,
    DefaultEventplaneFinder, DefaultHistCollector, DefaultInspector, DefaultSharingFilter,
    DensityCalculator, EventInspector, EventplaneFinder, HistCollector, SharingFilter,
};
use crate::types::{
    CollisionSystem, Correction, CorrectionSet, EventCondition, EventplaneRecord, ProcessedRecord,
    RawEvent,
};

use super::timing::{Stage, StageTimings, TimingSummary};

// ============================================================================
// Run counters
// ============================================================================

/// Run-level bookkeeping, reported at the end of the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Events handed to the controller.
    pub events_seen: u64,
    /// Events that made it through every gate.
    pub accepted: u64,
    /// Rejects before the payload stages (no event, no triggers, no payload,
    /// no vertex, vertex out of range).
    pub rejected_structural: u64,
    /// Rejects caused by a stage failure.
    pub rejected_stage: u64,
    /// Rejects caused by the per-event data-quality check (outlier rings).
    pub rejected_quality: u64,
    /// Events folded into the min-bias accumulator.
    pub min_bias_events: u64,
    /// Events marked for storage (passed the trigger gate).
    pub stored: u64,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "seen={} accepted={} structural={} stage={} quality={} min_bias={} stored={}",
            self.events_seen,
            self.accepted,
            self.rejected_structural,
            self.rejected_stage,
            self.rejected_quality,
            self.min_bias_events,
            self.stored
        )
    }
}

// ============================================================================
// Controller
// ============================================================================

/// The event-reduction pipeline.
pub struct EventPipeline {
    inspector: Box<dyn EventInspector>,
    fixer: AmplitudeFixer,
    sharing: Box<dyn SharingFilter>,
    density: Box<dyn DensityCalculator>,
    eventplane: Box<dyn EventplaneFinder>,
    corrections: Box<dyn CorrectionApplier>,
    collector: Box<dyn HistCollector>,

    // Per-event working state, cleared by `pre_event`.
    snapshot: DetectorSnapshot,
    histos: RingHistos,
    record: ProcessedRecord,
    eventplane_record: EventplaneRecord,
    store_marked: bool,

    // Run-wide state.
    needed_corrections: CorrectionSet,
    fallback_noise_factor: i32,
    enable_low_flux: bool,
    probe_done: bool,
    ring_sums: RingSums,
    min_bias: Hist2D,
    timings: StageTimings,
    stats: PipelineStats,
}

impl EventPipeline {
    /// Builds the pipeline with the default stage implementations.
    pub fn new(cfg: &RunConfig) -> Self {
        Self::with_stages(
            cfg,
            Box::new(DefaultInspector::new(cfg)),
            Box::new(DefaultSharingFilter::new(cfg)),
            Box::new(DefaultDensityCalculator::new(cfg)),
            Box::new(DefaultEventplaneFinder::new()),
            Box::new(DefaultCorrectionApplier::new(cfg)),
            Box::new(DefaultHistCollector::new(cfg)),
        )
    }

    /// Builds the pipeline from caller-supplied stages. The seam the tests
    /// use to substitute doubles.
    pub fn with_stages(
        cfg: &RunConfig,
        inspector: Box<dyn EventInspector>,
        sharing: Box<dyn SharingFilter>,
        density: Box<dyn DensityCalculator>,
        eventplane: Box<dyn EventplaneFinder>,
        corrections: Box<dyn CorrectionApplier>,
        collector: Box<dyn HistCollector>,
    ) -> Self {
        Self {
            inspector,
            fixer: AmplitudeFixer::new(cfg),
            sharing,
            density,
            eventplane,
            corrections,
            collector,
            snapshot: DetectorSnapshot::new(),
            histos: RingHistos::new(),
            record: ProcessedRecord::default(),
            eventplane_record: EventplaneRecord::default(),
            store_marked: false,
            needed_corrections: cfg.corrections.initial_mask(),
            fallback_noise_factor: cfg.fixer.fallback_noise_factor,
            enable_low_flux: cfg.run.enable_low_flux,
            probe_done: false,
            ring_sums: RingSums::new(&cfg.inspector.vertex_axis),
            min_bias: Hist2D::new(ETA_BINS, ETA_MIN, ETA_MAX, PHI_BINS),
            timings: StageTimings::new(cfg.timing.enabled),
            stats: PipelineStats::default(),
        }
    }

    // ------------------------------------------------------------------
    // Pre-run detector-health probe
    // ------------------------------------------------------------------

    /// One-shot probe of the detector noise configuration, run against the
    /// first event of the run before normal processing.
    ///
    /// When the probe cannot derive a target noise factor the fixer falls
    /// back to the nominal factor and the noise/gain correction is dropped
    /// for the whole run. Without an event or a payload the hook does
    /// nothing, and a later call may still consume the one shot.
    pub fn pre_run(&mut self, first: Option<&RawEvent>) {
        if self.probe_done {
            debug!("detector-health probe already ran, skipping");
            return;
        }
        let Some(event) = first else {
            return;
        };
        let Some(payload) = event.payload.as_ref() else {
            return;
        };
        self.probe_done = true;

        let target = self.fixer.find_target_noise_factor(payload, false);
        if target <= 0 {
            warn!(
                fallback = self.fallback_noise_factor,
                "noise probe found no usable target factor, disabling noise/gain correction"
            );
            self.fixer.set_reco_noise_factor(self.fallback_noise_factor);
            self.needed_corrections.remove(Correction::NoiseGain);
        } else {
            warn!(target, "noise corrector enabled for this run");
        }
    }

    /// Whether the one-shot health probe has run.
    pub fn probe_done(&self) -> bool {
        self.probe_done
    }

    // ------------------------------------------------------------------
    // Per-event entry points
    // ------------------------------------------------------------------

    /// Resets the per-event working state. Must run before every `event`.
    pub fn pre_event(&mut self) {
        self.snapshot.clear();
        self.histos.clear();
        self.record.clear();
        self.eventplane_record.clear();
        self.store_marked = false;
    }

    /// Runs one event through the gated stage sequence.
    ///
    /// Returns `true` when the event survived every gate and its result was
    /// folded into the run accumulators.
    pub fn event(&mut self, event: &mut RawEvent) -> bool {
        self.stats.events_seen += 1;
        let sw_total = self.timings.start();

        let sw = self.timings.start();
        let insp = self.inspector.inspect(event);
        self.timings.record(Stage::Inspect, sw);

        // Gate 1: no event or no trigger information. Nothing is committed
        // to the record and the event is not marked for storage.
        if insp.conditions.contains(EventCondition::NoEvent)
            || insp.conditions.contains(EventCondition::NoTriggers)
        {
            debug!(
                event = event.event_number,
                conditions = %insp.conditions,
                "rejected before trigger commit"
            );
            self.stats.rejected_structural += 1;
            return false;
        }

        // Trigger information is good: commit the metadata and make the
        // record externally visible. Everything committed here survives any
        // later reject.
        self.record.event_number = event.event_number;
        self.record.triggers = insp.triggers;
        self.record.snn_gev = insp.snn_gev;
        self.record.system = insp.system;
        self.record.centrality = insp.centrality;
        self.record.n_clusters = insp.n_clusters;
        self.store_marked = true;
        self.stats.stored += 1;

        // Missing cluster data is reported but never gated on; rejecting
        // those events would bias the trigger sample.
        if insp.conditions.contains(EventCondition::NoClusters) {
            debug!(event = event.event_number, "no central cluster data");
        }

        // Gate 2: forward payload and vertex must exist.
        if insp.conditions.contains(EventCondition::NoPayload)
            || insp.conditions.contains(EventCondition::NoVertex)
        {
            debug!(
                event = event.event_number,
                conditions = %insp.conditions,
                "rejected: missing payload or vertex"
            );
            self.stats.rejected_structural += 1;
            return false;
        }

        // A vertex exists; its z is committed even if the window gate below
        // rejects the event.
        self.record.ip_z = Some(insp.ip[2]);

        // Gate 3: vertex inside the accepted z window.
        if insp.conditions.contains(EventCondition::BadVertex) {
            debug!(
                event = event.event_number,
                ip_z = insp.ip[2],
                "rejected: vertex outside window"
            );
            self.stats.rejected_structural += 1;
            return false;
        }

        let low_flux = self.enable_low_flux && insp.low_flux;

        // Passed every structural gate. The payload and vertex bin are
        // guaranteed present from here on; the guards below only satisfy
        // the no-panic rule.
        let Some(payload) = event.payload.as_mut() else {
            self.stats.rejected_structural += 1;
            return false;
        };
        let Some(vertex_bin) = insp.vertex_bin else {
            self.stats.rejected_structural += 1;
            return false;
        };

        // Stage 2: in-place amplitude conditioning. Infallible.
        self.fixer.fix(payload, insp.ip[2]);

        // Stage 3: merge shared signals into the snapshot.
        let sw = self.timings.start();
        let shared = self
            .sharing
            .filter(payload, low_flux, insp.ip[2], &mut self.snapshot);
        self.timings.record(Stage::Sharing, sw);
        if let Err(err) = shared {
            warn!(event = event.event_number, error = %err, "sharing filter failed");
            self.stats.rejected_stage += 1;
            return false;
        }

        // Stage 4: per-ring inclusive densities; also flags outlier rings.
        let sw = self.timings.start();
        let densities = self.density.calculate(
            &self.snapshot,
            &mut self.histos,
            low_flux,
            insp.centrality,
            insp.ip,
        );
        self.timings.record(Stage::Density, sw);
        if let Err(err) = densities {
            warn!(event = event.event_number, error = %err, "density calculator failed");
            self.stats.rejected_stage += 1;
            return false;
        }

        // Stage 5, PbPb only: reaction-plane estimate. A failure here costs
        // the estimate, not the event.
        if insp.system == CollisionSystem::PbPb {
            let sw = self.timings.start();
            match self.eventplane.find(event, &self.record.hist, &self.histos) {
                Ok(ep) => self.eventplane_record = ep,
                Err(err) => {
                    warn!(event = event.event_number, error = %err, "reaction-plane estimate failed");
                }
            }
            self.timings.record(Stage::Eventplane, sw);
        }

        // Gate 4: per-event data quality. Any ring flagged as an outlier
        // drops the whole event.
        let skipped = self.histos.skipped();
        if skipped > 0 {
            debug!(
                event = event.event_number,
                skipped, "rejected: outlier rings in this event"
            );
            self.stats.rejected_quality += 1;
            return false;
        }

        // Stage 7: multiplicative corrections per ring and vertex bin.
        let sw = self.timings.start();
        let corrected =
            self.corrections
                .correct(&mut self.histos, vertex_bin, &self.needed_corrections);
        self.timings.record(Stage::Corrections, sw);
        if let Err(err) = corrected {
            warn!(event = event.event_number, error = %err, "correction applier failed");
            self.stats.rejected_stage += 1;
            return false;
        }

        // Stage 8: fold into the run accumulators and the record summary.
        let sw = self.timings.start();
        let collected = self.collector.collect(
            &self.histos,
            &mut self.ring_sums,
            vertex_bin,
            &mut self.record.hist,
            insp.centrality,
        );
        self.timings.record(Stage::Collect, sw);
        if let Err(err) = collected {
            warn!(event = event.event_number, error = %err, "histogram collector failed");
            self.stats.rejected_stage += 1;
            return false;
        }

        // Stage 9: min-bias accumulation. Inelastic, not pile-up, and fully
        // clean events only.
        if self.record.is_inelastic() && !self.record.is_pileup() {
            self.min_bias.add(&self.record.hist);
            self.stats.min_bias_events += 1;
        }

        self.timings.record(Stage::Total, sw_total);
        self.stats.accepted += 1;
        true
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The current event's output record.
    pub fn record(&self) -> &ProcessedRecord {
        &self.record
    }

    /// The current event's reaction-plane record (empty outside PbPb).
    pub fn eventplane_record(&self) -> &EventplaneRecord {
        &self.eventplane_record
    }

    /// Whether the current event's record should be persisted.
    pub fn store_marked(&self) -> bool {
        self.store_marked
    }

    /// The run-wide correction mask after any probe adjustment.
    pub fn needed_corrections(&self) -> CorrectionSet {
        self.needed_corrections
    }

    /// Per-vertex-bin per-ring sum accumulators.
    pub fn ring_sums(&self) -> &RingSums {
        &self.ring_sums
    }

    /// The min-bias d²N/dηdφ accumulator.
    pub fn min_bias(&self) -> &Hist2D {
        &self.min_bias
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Timing totals, when timing was enabled for the run.
    pub fn timing_summary(&self) -> Option<TimingSummary> {
        self.timings.summary()
    }

    /// The nominal-or-probed noise factor currently in force.
    pub fn reco_noise_factor(&self) -> i32 {
        self.fixer.reco_noise_factor()
    }
}
