//! Run-level output: the end-of-run summary artifact.
//!
//! Built once from the pipeline after the source is exhausted and written as
//! a single JSON document. Carries the min-bias accumulator, the per-vertex
//! ring sums, the run counters, and the correction mask actually in force
//! after the health probe.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hist::{Hist2D, RingSums};
use crate::pipeline::{EventPipeline, PipelineStats, TimingSummary};
use crate::types::CorrectionSet;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("summary write error: {0}")]
    Io(#[from] std::io::Error),

    #[error("summary encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Everything the run produced besides the per-event record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub finished_at: DateTime<Utc>,
    pub stats: PipelineStats,
    /// Corrections applied on every event, after any probe adjustment.
    pub corrections: CorrectionSet,
    /// Noise factor the amplitude fixer ran with.
    pub reco_noise_factor: i32,
    /// Min-bias d²N/dηdφ accumulator.
    pub min_bias: Hist2D,
    /// Per-vertex-bin per-ring sums.
    pub ring_sums: RingSums,
    /// Per-stage wall-clock totals, when timing was enabled.
    pub timing: Option<TimingSummary>,
}

impl RunSummary {
    pub fn from_pipeline(pipeline: &EventPipeline) -> Self {
        Self {
            finished_at: Utc::now(),
            stats: pipeline.stats().clone(),
            corrections: pipeline.needed_corrections(),
            reco_noise_factor: pipeline.reco_noise_factor(),
            min_bias: pipeline.min_bias().clone(),
            ring_sums: pipeline.ring_sums().clone(),
            timing: pipeline.timing_summary(),
        }
    }

    /// Writes the summary as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), OutputError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

// ============================================================
// Tests
// ============================================================
