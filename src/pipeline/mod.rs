//! Event-reduction pipeline: controller, run loop, and stage timing.

mod controller;
mod run_loop;
mod timing;

pub use controller::{EventPipeline, PipelineStats};
pub use run_loop::RunLoop;
pub use timing::{Stage, StageTime, StageTimings, TimingSummary};
