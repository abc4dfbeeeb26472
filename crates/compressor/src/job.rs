//! Encode job runner
//!
//! Runs one [`EncodeRequest`] through probe and ffmpeg, streaming diagnostics
//! and progress to an [`EventSink`]. Every failure is converted into an
//! [`EncodeOutcome::Failure`]; nothing escapes to the caller.

use crate::config::ToolsConfig;
use crate::encode::{build_encode_command, parse_frame, progress_percent, StatusLines};
use crate::events::{BatchEvent, EncodeOutcome, EventSink};
use crate::probe::{detect_audio_presence, probe_frame_count};
use crate::request::EncodeRequest;
use std::collections::VecDeque;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::process::Command;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

/// Number of trailing stderr lines quoted in a failure message
const ERROR_TAIL_LINES: usize = 20;

/// Error type for job execution
#[derive(Debug, Error)]
pub enum JobError {
    /// ffmpeg could not be started (missing tool, missing source)
    #[error("failed to launch encoder: {0}")]
    Launch(String),

    /// ffmpeg exited with a non-zero status
    #[error("{tool} exited with code {code}{}", format_tail(.tail))]
    Runtime {
        tool: String,
        code: i32,
        tail: Vec<String>,
    },

    /// ffmpeg was killed by a signal
    #[error("{tool} terminated by signal{}", format_tail(.tail))]
    Terminated { tool: String, tail: Vec<String> },

    /// Anything else that went wrong while the job was running
    #[error("unexpected error during encode: {0}")]
    Unexpected(String),
}

fn format_tail(tail: &[String]) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(":\n{}", tail.join("\n"))
    }
}

/// Job state representing the current stage of a runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Created, not started
    Idle,
    /// Querying frame count and audio streams
    Probing,
    /// ffmpeg is running
    Running,
    /// ffmpeg exited successfully
    Succeeded,
    /// Job failed
    Failed(String),
}

impl JobState {
    /// Convert state to string for logs
    pub fn as_str(&self) -> &str {
        match self {
            JobState::Idle => "idle",
            JobState::Probing => "probing",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed(_))
    }
}

/// Drives a single ffmpeg invocation for one request.
pub struct EncodeJobRunner {
    id: String,
    request: EncodeRequest,
    tools: ToolsConfig,
    state: JobState,
    total_frames: Option<u64>,
}

impl EncodeJobRunner {
    pub fn new(request: EncodeRequest, tools: ToolsConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request,
            tools,
            state: JobState::Idle,
            total_frames: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn request(&self) -> &EncodeRequest {
        &self.request
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Frame count found while probing; `None` before probing or when unknown
    pub fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn set_state(&mut self, state: JobState) {
        debug!(job_id = %self.id, from = self.state.as_str(), to = state.as_str(), "job state change");
        self.state = state;
    }

    /// Run the job to completion.
    ///
    /// Emits `Line` and `Progress` events while ffmpeg runs and exactly one
    /// `JobFinished` event at the end. The returned outcome is the one carried
    /// by that event.
    pub async fn run(&mut self, sink: &dyn EventSink) -> EncodeOutcome {
        info!(
            job_id = %self.id,
            source = %self.request.source().display(),
            destination = %self.request.destination().display(),
            "starting encode"
        );

        // Probing never fails the job; unknown frame count only disables progress
        self.set_state(JobState::Probing);
        let ffprobe = self.tools.ffprobe.clone();
        self.total_frames = probe_frame_count(&ffprobe, self.request.source()).await;
        let has_audio = detect_audio_presence(&ffprobe, self.request.source()).await;

        self.set_state(JobState::Running);
        let outcome = match self.encode(has_audio, sink).await {
            Ok(()) => {
                info!(job_id = %self.id, "encode finished");
                self.set_state(JobState::Succeeded);
                EncodeOutcome::Success
            }
            Err(e) => {
                let message = e.to_string();
                error!(job_id = %self.id, error = %message, "encode failed");
                sink.emit(BatchEvent::Line {
                    job_id: self.id.clone(),
                    text: format!("Error: {}", message),
                });
                self.set_state(JobState::Failed(message.clone()));
                EncodeOutcome::failure(message)
            }
        };

        sink.emit(BatchEvent::JobFinished {
            job_id: self.id.clone(),
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn encode(&self, has_audio: bool, sink: &dyn EventSink) -> Result<(), JobError> {
        let source = self.request.source();
        if !source.is_file() {
            return Err(JobError::Launch(format!(
                "source file not found: {}",
                source.display()
            )));
        }

        let std_cmd = build_encode_command(&self.tools.ffmpeg, &self.request, has_audio);
        debug!(job_id = %self.id, command = ?std_cmd, "spawning encoder");

        let mut cmd = Command::from(std_cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let tool = self.tools.ffmpeg.display().to_string();
        let mut child = cmd
            .spawn()
            .map_err(|e| JobError::Launch(format!("{}: {}", tool, e)))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| JobError::Unexpected("encoder stderr was not captured".to_string()))?;

        let mut lines = StatusLines::new(BufReader::new(stderr));
        let mut tail: VecDeque<String> = VecDeque::with_capacity(ERROR_TAIL_LINES);
        let total = self.total_frames.unwrap_or(0);

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    let _ = child.kill().await;
                    return Err(JobError::Unexpected(format!(
                        "failed to read encoder output: {}",
                        e
                    )));
                }
            };
            trace!(job_id = %self.id, line = %line, "encoder output");

            let percent = parse_frame(&line).and_then(|frame| progress_percent(frame, total));

            if tail.len() == ERROR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.clone());

            sink.emit(BatchEvent::Line {
                job_id: self.id.clone(),
                text: line,
            });
            if let Some(percent) = percent {
                sink.emit(BatchEvent::Progress {
                    job_id: self.id.clone(),
                    percent,
                });
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| JobError::Unexpected(format!("failed to wait for encoder: {}", e)))?;

        if status.success() {
            return Ok(());
        }

        let tail = tail.into_iter().collect();
        match status.code() {
            Some(code) => Err(JobError::Runtime { tool, code, tail }),
            None => Err(JobError::Terminated { tool, tail }),
        }
    }
}
