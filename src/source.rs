//! Event source abstraction for raw-event ingestion.
//!
//! Provides a unified trait for reading raw events from different sources:
//! JSONL files (replay), stdin (JSON, one event per line), and pre-loaded
//! vectors (tests and synthetic runs).

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::RawEvent;

/// Events produced by a source.
pub enum SourceEvent {
    /// A valid raw event was read.
    Event(RawEvent),
    /// Source reached end of data.
    Eof,
}

/// Trait abstracting where raw events come from.
///
/// Implementations handle format parsing internally; malformed inputs are
/// skipped with a warning, never surfaced as run errors.
#[async_trait]
pub trait EventSource: Send + 'static {
    /// Read the next event from the source.
    ///
    /// Returns `SourceEvent::Eof` when no more data is available and `Err`
    /// only on unrecoverable I/O failures.
    async fn next_event(&mut self) -> Result<SourceEvent>;

    /// Human-readable name for logging (e.g. "JSONL", "stdin").
    fn source_name(&self) -> &str;

    /// Malformed lines skipped so far.
    fn skipped(&self) -> u64 {
        0
    }
}

// ============================================================================
// Replay source (pre-loaded events)
// ============================================================================

/// Replays pre-loaded events, mainly for tests and synthetic runs.
pub struct ReplaySource {
    events: std::vec::IntoIter<RawEvent>,
}

impl ReplaySource {
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self {
            events: events.into_iter(),
        }
    }
}

#[async_trait]
impl EventSource for ReplaySource {
    async fn next_event(&mut self) -> Result<SourceEvent> {
        match self.events.next() {
            Some(ev) => Ok(SourceEvent::Event(ev)),
            None => Ok(SourceEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// JSONL file source
// ============================================================================

/// Reads JSON-encoded events from a file, one per line.
pub struct JsonlSource {
    reader: tokio::io::BufReader<tokio::fs::File>,
    line_buffer: String,
    skipped: u64,
}

impl JsonlSource {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self {
            reader: tokio::io::BufReader::new(file),
            line_buffer: String::with_capacity(4096),
            skipped: 0,
        })
    }
}

#[async_trait]
impl EventSource for JsonlSource {
    async fn next_event(&mut self) -> Result<SourceEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(SourceEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEvent>(line) {
                Ok(ev) => return Ok(SourceEvent::Event(ev)),
                Err(e) => {
                    self.skipped += 1;
                    tracing::warn!(error = %e, "skipping malformed event line");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "JSONL"
    }

    fn skipped(&self) -> u64 {
        self.skipped
    }
}

// ============================================================================
// Stdin source
// ============================================================================

/// Reads JSON-encoded events from stdin, one per line.
///
/// Used with the simulation binary:
/// `forward-mult-sim --events 10000 | forward-mult --stdin`
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
    skipped: u64,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(4096),
            skipped: 0,
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for StdinSource {
    async fn next_event(&mut self) -> Result<SourceEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(SourceEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEvent>(line) {
                Ok(ev) => return Ok(SourceEvent::Event(ev)),
                Err(e) => {
                    self.skipped += 1;
                    tracing::warn!(error = %e, "skipping malformed event line");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }

    fn skipped(&self) -> u64 {
        self.skipped
    }
}

// ============================================================
// Tests
// ============================================================
