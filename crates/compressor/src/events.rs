//! Event surface for observers of a batch
//!
//! Every lifecycle change of a batch or of one of its jobs is published as a
//! [`BatchEvent`]. The queue never waits on an observer; delivery is
//! fire-and-forget over whatever channel implements [`EventSink`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};

/// Terminal result of one encode job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EncodeOutcome {
    Success,
    Failure { message: String },
}

impl EncodeOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        EncodeOutcome::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EncodeOutcome::Success)
    }

    /// Diagnostic text, empty on success
    pub fn message(&self) -> &str {
        match self {
            EncodeOutcome::Success => "",
            EncodeOutcome::Failure { message } => message,
        }
    }
}

/// Notifications published while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    /// A batch was accepted and is about to process `total` files
    BatchStarted { total: usize },
    /// A job was popped from the queue
    JobStarted {
        job_id: String,
        source: PathBuf,
        destination: PathBuf,
    },
    /// One line of encoder diagnostics, trailing whitespace removed
    Line { job_id: String, text: String },
    /// Percent complete of the running job; may repeat or regress
    Progress { job_id: String, percent: u8 },
    /// A job reached its terminal state
    JobFinished {
        job_id: String,
        outcome: EncodeOutcome,
    },
    /// A job failed; the batch carries on with the next file
    JobFailed {
        job_id: String,
        source: PathBuf,
        message: String,
    },
    /// The queue drained. Carries the outcome of the last job only.
    BatchFinished { outcome: EncodeOutcome },
    /// A submission was rejected without starting anything
    NothingToDo { reason: String },
}

impl BatchEvent {
    /// Render as a single JSON line
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Receiver side of the event surface.
///
/// Implementations must not block: events are emitted from the worker task
/// while the encoder is running.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: BatchEvent);
}

impl EventSink for mpsc::UnboundedSender<BatchEvent> {
    fn emit(&self, event: BatchEvent) {
        // Receiver gone means nobody is watching; the batch keeps going
        let _ = self.send(event);
    }
}

impl EventSink for broadcast::Sender<BatchEvent> {
    fn emit(&self, event: BatchEvent) {
        let _ = self.send(event);
    }
}
