//! Shared data types for the reduction pipeline
//!
//! - Stage 1 input: RawEvent (reconstructed collision event)
//! - Flag sets: found conditions, trigger classification, correction mask
//! - Stage outputs: Inspection, ProcessedRecord, EventplaneRecord

mod event;
mod flags;
mod records;

pub use event::{CollisionSystem, RawEvent};
pub use flags::{ConditionSet, Correction, CorrectionSet, EventCondition, Trigger, TriggerSet};
pub use records::{EventplaneRecord, Inspection, ProcessedRecord};
