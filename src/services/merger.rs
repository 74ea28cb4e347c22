//! Fan-in of all language channels of one request.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::services::{ChannelEvent, ChannelFailure, PipelineMetrics};
use crate::types::EnrichedRepository;

/// What the merger hands downstream
#[derive(Debug, Clone, PartialEq)]
pub enum MergedEvent {
    Repository(EnrichedRepository),
    Error(ChannelFailure),
}

/// Creates the shared event sender for `expected` channels and the merger reading it.
pub fn fan_in(
    expected: usize,
    buffer: usize,
    metrics: Arc<PipelineMetrics>,
) -> (mpsc::Sender<ChannelEvent>, Merger) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (tx, Merger::new(rx, expected, metrics))
}

pub struct Merger {
    events: mpsc::Receiver<ChannelEvent>,
    expected: usize,
    completed: usize,
    error_forwarded: bool,
    finished: bool,
    metrics: Arc<PipelineMetrics>,
}

impl Merger {
    pub fn new(
        events: mpsc::Receiver<ChannelEvent>,
        expected: usize,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            events,
            expected,
            completed: 0,
            error_forwarded: false,
            finished: expected == 0,
            metrics,
        }
    }

    /// Number of channels that have reported completion so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Next event to forward, or `None` once every channel has completed.
    ///
    /// Repositories are forwarded in arrival order. Only the first channel failure is
    /// forwarded; later ones are logged and counted.
    pub async fn next(&mut self) -> Option<MergedEvent> {
        while !self.finished {
            let Some(event) = self.events.recv().await else {
                warn!(
                    "All channels closed with {}/{} completions reported",
                    self.completed, self.expected
                );
                self.finished = true;
                break;
            };

            match event {
                ChannelEvent::Repository(enriched) => {
                    return Some(MergedEvent::Repository(enriched));
                }
                ChannelEvent::Failed(failure) => {
                    if self.error_forwarded {
                        debug!("Suppressing additional channel failure: {}", failure);
                        self.metrics.record_suppressed_channel_error();
                        continue;
                    }
                    self.error_forwarded = true;
                    return Some(MergedEvent::Error(failure));
                }
                ChannelEvent::Completed(language) => {
                    self.completed += 1;
                    debug!(
                        "Channel {} completed ({}/{})",
                        language, self.completed, self.expected
                    );
                    if self.completed >= self.expected {
                        self.finished = true;
                    }
                }
            }
        }

        None
    }
}
