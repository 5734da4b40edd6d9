//! System-wide default constants.
//!
//! Centralises magic numbers used across the reduction. Grouped by subsystem
//! for easy discovery.

// ============================================================================
// Pipeline
// ============================================================================

/// How often the processing loop logs a progress line (events).
pub const PROGRESS_LOG_INTERVAL: u64 = 10_000;

// ============================================================================
// Health probe
// ============================================================================

/// Minimum payload hits for the noise probe to produce a meaningful factor.
pub const NOISE_PROBE_MIN_HITS: usize = 50;

/// Signal spread (MIPs) mapped to one unit of noise factor by the probe.
pub const NOISE_PROBE_SPREAD_PER_UNIT: f64 = 0.25;

// ============================================================================
// Trigger lines
// ============================================================================

/// Trigger class name for the minimum-bias / inelastic selection.
pub const TRIGGER_LINE_MB: &str = "MB";

/// Trigger class name for the INEL>0 selection.
pub const TRIGGER_LINE_INEL_GT0: &str = "INEL>0";

/// Trigger class name for the non-single-diffractive selection.
pub const TRIGGER_LINE_NSD: &str = "NSD";
