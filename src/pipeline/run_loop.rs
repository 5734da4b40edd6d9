//! Unified event loop shared across all input modes.
//!
//! Pulls raw events from an [`EventSource`], runs the one-shot pre-run
//! detector-health probe against the first event, then drives each event
//! through the controller and persists the record of every event marked for
//! storage.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::defaults::PROGRESS_LOG_INTERVAL;
use crate::source::{EventSource, SourceEvent};
use crate::store::RecordStore;

use super::controller::{EventPipeline, PipelineStats};

/// Owns the pipeline and the optional record store for one run.
pub struct RunLoop {
    pipeline: EventPipeline,
    store: Option<RecordStore>,
    cancel_token: CancellationToken,
}

impl RunLoop {
    pub fn new(pipeline: EventPipeline, cancel_token: CancellationToken) -> Self {
        Self {
            pipeline,
            store: None,
            cancel_token,
        }
    }

    /// Attach a record store; marked events get persisted to it.
    pub fn with_store(mut self, store: RecordStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Run until the source is exhausted or cancellation.
    ///
    /// Returns the pipeline with its accumulators intact, so the caller can
    /// build the run summary from it.
    pub async fn run<S: EventSource>(mut self, source: &mut S) -> EventPipeline {
        info!(source = source.source_name(), "processing events");

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("shutdown signal received");
                    break;
                }
                result = source.next_event() => {
                    match result {
                        Ok(ev) => ev,
                        Err(e) => {
                            warn!(error = %e, "event source error");
                            break;
                        }
                    }
                }
            };

            let mut event = match event {
                SourceEvent::Event(ev) => ev,
                SourceEvent::Eof => {
                    info!(
                        events = self.pipeline.stats().events_seen,
                        "source reached end"
                    );
                    break;
                }
            };

            // The health probe runs against the first event, before that
            // event is itself processed.
            if !self.pipeline.probe_done() {
                self.pipeline.pre_run(Some(&event));
            }

            self.pipeline.pre_event();
            self.pipeline.event(&mut event);

            if self.pipeline.store_marked() {
                if let Some(store) = &self.store {
                    if let Err(e) = store.put(self.pipeline.record()) {
                        warn!(
                            event = event.event_number,
                            error = %e,
                            "failed to persist event record"
                        );
                    }
                }
            }

            let seen = self.pipeline.stats().events_seen;
            if seen % PROGRESS_LOG_INTERVAL == 0 {
                info!(stats = %self.pipeline.stats(), "progress");
            }
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.flush() {
                warn!(error = %e, "record store flush failed");
            }
        }
        let skipped = source.skipped();
        if skipped > 0 {
            warn!(skipped, "malformed input lines were skipped");
        }
        info!(stats = %self.pipeline.stats(), "run complete");

        self.pipeline
    }

    pub fn stats(&self) -> &PipelineStats {
        self.pipeline.stats()
    }
}
