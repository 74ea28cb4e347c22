//! Response body assembly and the request-level done flag.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::formatter::{NO_REPOSITORIES_FOUND, channel_error_line, repository_line};
use crate::services::MergedEvent;

/// Final (or, after a timeout, partial) outcome of one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineResult {
    pub body: String,
    /// Number of repository lines in `body`
    pub repositories: usize,
    /// Text of the forwarded channel failure, if any
    pub error: Option<String>,
    pub timed_out: bool,
}

#[derive(Default)]
struct Buffer {
    body: String,
    repositories: usize,
    error: Option<String>,
    appended: bool,
}

/// Single writer that turns merged events into the response body.
pub struct ResponseAccumulator {
    buffer: Arc<Mutex<Buffer>>,
    done: watch::Sender<bool>,
}

impl Default for ResponseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self {
            buffer: Arc::new(Mutex::new(Buffer::default())),
            done,
        }
    }

    /// Reader side of the done flag and of the body snapshot
    pub fn done_signal(&self) -> DoneSignal {
        DoneSignal {
            buffer: Arc::clone(&self.buffer),
            done: self.done.subscribe(),
        }
    }

    pub fn apply(&mut self, event: MergedEvent) {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        match event {
            MergedEvent::Repository(repository) => {
                buffer.body.push_str(&repository_line(&repository));
                buffer.repositories += 1;
            }
            MergedEvent::Error(failure) => {
                buffer.body.push_str(&channel_error_line(&failure));
                buffer.error = Some(failure.to_string());
            }
        }
        buffer.appended = true;
    }

    /// Marks the body final and flips the done flag.
    pub fn complete(self) -> PipelineResult {
        let result = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            if !buffer.appended {
                buffer.body.push_str(NO_REPOSITORIES_FOUND);
            }
            snapshot_of(&buffer)
        };
        self.done.send_replace(true);
        result
    }
}

/// Waits for a [`ResponseAccumulator`] to complete.
#[derive(Clone)]
pub struct DoneSignal {
    buffer: Arc<Mutex<Buffer>>,
    done: watch::Receiver<bool>,
}

impl DoneSignal {
    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    /// Resolves once the accumulator completed. An accumulator dropped without
    /// completing also counts as done.
    pub async fn wait(&mut self) {
        let _ = self.done.wait_for(|done| *done).await;
    }

    /// Copy of whatever has been appended so far.
    pub fn snapshot(&self) -> PipelineResult {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        snapshot_of(&buffer)
    }
}

fn snapshot_of(buffer: &Buffer) -> PipelineResult {
    PipelineResult {
        body: buffer.body.clone(),
        repositories: buffer.repositories,
        error: buffer.error.clone(),
        timed_out: false,
    }
}
