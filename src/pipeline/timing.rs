//! Optional per-stage wall-clock accounting.
//!
//! Disabled by default; when the `[timing]` section enables it, the
//! controller records elapsed time for each stage of every event and
//! the run summary carries the totals. When disabled every call here
//! is a no-op so the hot path pays nothing beyond a branch.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Pipeline phases that are timed individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Total,
    Inspect,
    Sharing,
    Density,
    Eventplane,
    Corrections,
    Collect,
}

const STAGE_COUNT: usize = 7;

impl Stage {
    fn index(self) -> usize {
        match self {
            Stage::Total => 0,
            Stage::Inspect => 1,
            Stage::Sharing => 2,
            Stage::Density => 3,
            Stage::Eventplane => 4,
            Stage::Corrections => 5,
            Stage::Collect => 6,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Stage::Total => "total",
            Stage::Inspect => "inspect",
            Stage::Sharing => "sharing",
            Stage::Density => "density",
            Stage::Eventplane => "eventplane",
            Stage::Corrections => "corrections",
            Stage::Collect => "collect",
        }
    }
}

/// Accumulated stage timings for a run.
#[derive(Debug)]
pub struct StageTimings {
    enabled: bool,
    totals: [Duration; STAGE_COUNT],
    events: u64,
}

impl StageTimings {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            totals: [Duration::ZERO; STAGE_COUNT],
            events: 0,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Starts a stopwatch, or returns `None` when timing is off.
    pub fn start(&self) -> Option<Instant> {
        self.enabled.then(Instant::now)
    }

    /// Folds an elapsed interval into the per-stage total.
    pub fn record(&mut self, stage: Stage, started: Option<Instant>) {
        if let Some(t0) = started {
            self.totals[stage.index()] += t0.elapsed();
            if stage == Stage::Total {
                self.events += 1;
            }
        }
    }

    /// Snapshot for the run summary; `None` when timing was disabled.
    pub fn summary(&self) -> Option<TimingSummary> {
        if !self.enabled {
            return None;
        }
        let stages = [
            Stage::Total,
            Stage::Inspect,
            Stage::Sharing,
            Stage::Density,
            Stage::Eventplane,
            Stage::Corrections,
            Stage::Collect,
        ]
        .iter()
        .map(|s| StageTime {
            stage: s.name().to_string(),
            total_us: self.totals[s.index()].as_micros() as u64,
        })
        .collect();
        Some(TimingSummary {
            events_timed: self.events,
            stages,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTime {
    pub stage: String,
    pub total_us: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSummary {
    pub events_timed: u64,
    pub stages: Vec<StageTime>,
}

// ============================================================
// Tests
// ============================================================
