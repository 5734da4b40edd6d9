//! forward-mult: per-event forward-multiplicity reduction
//!
//! Reduces raw forward-detector readout into per-event d²N/dηdφ histograms
//! through a gated stage sequence, with run-level min-bias and per-vertex
//! accumulators.
//!
//! ## Architecture
//!
//! - **Pipeline controller**: the gated per-event stage sequence and its
//!   state/flag bookkeeping
//! - **Stages**: inspector, amplitude fixer, sharing filter, density
//!   calculator, reaction-plane finder, correction applier, collector
//! - **Sources**: JSONL file, stdin, and in-memory replay event feeds
//! - **Store**: persistent record store for every event marked for storage

pub mod config;
pub mod detector;
pub mod hist;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod stages;
pub mod store;
pub mod types;

// Re-export configuration
pub use config::RunConfig;

// Re-export commonly used types
pub use types::{
    CollisionSystem, ConditionSet, Correction, CorrectionSet, EventCondition, EventplaneRecord,
    Inspection, ProcessedRecord, RawEvent, Trigger, TriggerSet,
};

// Re-export the pipeline surface
pub use pipeline::{EventPipeline, PipelineStats, RunLoop};

// Re-export sources and storage
pub use source::{EventSource, JsonlSource, ReplaySource, SourceEvent, StdinSource};
pub use store::{RecordStore, StoreError};

// Re-export the run summary
pub use output::RunSummary;
