//! Sequential batch queue
//!
//! Accepts a list of source files, turns each into an [`EncodeRequest`] and
//! drains them one at a time on a single background task. A failed job is
//! reported and skipped; the batch always runs to the end of its queue.

use crate::config::{
    Config, EncoderPreset, QualityTier, ToolsConfig, VideoCodec,
};
use crate::events::{BatchEvent, EncodeOutcome, EventSink};
use crate::job::EncodeJobRunner;
use crate::naming::resolve_output_path;
use crate::request::{EncodeRequest, Watermark};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Error type for batch submission
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    /// A previous batch has not finished yet
    #[error("a batch is already running")]
    AlreadyRunning,

    /// The submitted file list was empty
    #[error("no files to compress")]
    NothingToDo,
}

/// Settings shared by every file of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    pub tier: QualityTier,
    pub crf: u8,
    pub codec: VideoCodec,
    pub preset: EncoderPreset,
    pub watermark: Option<Watermark>,
}

impl BatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tier: config.encode.quality_tier,
            crf: config.encode.effective_crf(),
            codec: config.encode.codec,
            preset: config.encode.preset,
            watermark: config.watermark.as_ref().map(Watermark::from),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Mutable state of the batch being processed
#[derive(Debug, Default)]
struct BatchState {
    /// Requests not yet started, consumed front to back
    queue: VecDeque<EncodeRequest>,
    /// The request whose job is running
    current: Option<EncodeRequest>,
    /// Set from submission until the queue drains
    active: bool,
    completed_jobs: u64,
    failed_jobs: u64,
}

/// Point-in-time view of the queue for observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSnapshot {
    pub running: bool,
    pub queue_len: usize,
    pub current_source: Option<PathBuf>,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
}

/// Build one request per path.
///
/// Destinations are resolved against the filesystem and against the names
/// already picked for earlier paths of the same batch. A watermark whose image
/// does not exist is dropped.
pub fn plan_requests(paths: &[PathBuf], settings: &BatchSettings) -> Vec<EncodeRequest> {
    let watermark = match &settings.watermark {
        Some(wm) if wm.path.is_file() => Some(wm.clone()),
        Some(wm) => {
            warn!(path = %wm.path.display(), "watermark image not found, encoding without overlay");
            None
        }
        None => None,
    };

    let mut reserved = HashSet::new();
    paths
        .iter()
        .map(|source| {
            let destination = resolve_output_path(source, settings.tier, &reserved);
            reserved.insert(destination.clone());

            let request = EncodeRequest::new(
                source.clone(),
                destination,
                settings.crf,
                settings.codec,
                settings.preset,
            );
            match &watermark {
                Some(wm) => request.with_watermark(wm.clone()),
                None => request,
            }
        })
        .collect()
}

/// Queue that runs encode jobs strictly one after another.
pub struct BatchQueue {
    tools: ToolsConfig,
    sink: Arc<dyn EventSink>,
    state: Arc<RwLock<BatchState>>,
}

impl BatchQueue {
    pub fn new(tools: ToolsConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            tools,
            sink,
            state: Arc::new(RwLock::new(BatchState::default())),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.active
    }

    pub async fn snapshot(&self) -> BatchSnapshot {
        let state = self.state.read().await;
        BatchSnapshot {
            running: state.active,
            queue_len: state.queue.len(),
            current_source: state.current.as_ref().map(|r| r.source().to_path_buf()),
            completed_jobs: state.completed_jobs,
            failed_jobs: state.failed_jobs,
        }
    }

    /// Start a batch over `paths`.
    ///
    /// Rejected, with a `NothingToDo` event and no other, when a batch is
    /// already running or `paths` is empty. Otherwise emits `BatchStarted` and
    /// spawns the worker; the returned handle resolves to the outcome of the
    /// last job once `BatchFinished` has been emitted.
    pub async fn submit(
        &self,
        paths: Vec<PathBuf>,
        settings: &BatchSettings,
    ) -> Result<JoinHandle<EncodeOutcome>, BatchError> {
        let total = {
            let mut state = self.state.write().await;
            if state.active {
                return Err(self.reject(BatchError::AlreadyRunning));
            }
            if paths.is_empty() {
                return Err(self.reject(BatchError::NothingToDo));
            }

            let requests = plan_requests(&paths, settings);
            let total = requests.len();
            *state = BatchState {
                queue: requests.into(),
                active: true,
                ..BatchState::default()
            };
            total
        };

        info!(total, tier = %settings.tier, crf = settings.crf, "batch started");
        self.sink.emit(BatchEvent::BatchStarted { total });

        let worker = Worker {
            tools: self.tools.clone(),
            sink: self.sink.clone(),
            state: self.state.clone(),
        };
        Ok(tokio::spawn(worker.drain()))
    }

    fn reject(&self, err: BatchError) -> BatchError {
        warn!(reason = %err, "batch submission rejected");
        self.sink.emit(BatchEvent::NothingToDo {
            reason: err.to_string(),
        });
        err
    }
}

/// The single background task of a batch
struct Worker {
    tools: ToolsConfig,
    sink: Arc<dyn EventSink>,
    state: Arc<RwLock<BatchState>>,
}

impl Worker {
    async fn drain(self) -> EncodeOutcome {
        let mut last_outcome = EncodeOutcome::Success;

        loop {
            let request = {
                let mut state = self.state.write().await;
                match state.queue.pop_front() {
                    Some(request) => {
                        state.current = Some(request.clone());
                        request
                    }
                    None => {
                        // Reset and announce under the same guard so a new
                        // submission cannot start before `BatchFinished`
                        *state = BatchState::default();
                        self.finish(&last_outcome);
                        break;
                    }
                }
            };

            let mut runner = EncodeJobRunner::new(request, self.tools.clone());
            self.sink.emit(BatchEvent::JobStarted {
                job_id: runner.id().to_string(),
                source: runner.request().source().to_path_buf(),
                destination: runner.request().destination().to_path_buf(),
            });

            let outcome = runner.run(self.sink.as_ref()).await;

            {
                let mut state = self.state.write().await;
                state.current = None;
                if outcome.is_success() {
                    state.completed_jobs += 1;
                } else {
                    state.failed_jobs += 1;
                }
            }

            if let EncodeOutcome::Failure { message } = &outcome {
                self.sink.emit(BatchEvent::JobFailed {
                    job_id: runner.id().to_string(),
                    source: runner.request().source().to_path_buf(),
                    message: message.clone(),
                });
            }

            last_outcome = outcome;
        }

        last_outcome
    }

    /// Only the last job's outcome is reported for the whole batch
    fn finish(&self, last_outcome: &EncodeOutcome) {
        info!(success = last_outcome.is_success(), "batch finished");
        self.sink.emit(BatchEvent::BatchFinished {
            outcome: last_outcome.clone(),
        });
    }
}
