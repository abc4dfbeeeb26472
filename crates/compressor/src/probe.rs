//! Read-only ffprobe queries run before an encode.
//!
//! Both probes degrade instead of failing: an unknown frame count only
//! disables progress reporting, and a failed audio probe means "no audio".

use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Error type for probe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// ffprobe could not be started.
    #[error("failed to run ffprobe: {0}")]
    Io(#[from] std::io::Error),

    /// ffprobe ran but reported an error.
    #[error("ffprobe exited with status {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// ffprobe output was not a frame count.
    #[error("unexpected ffprobe output '{0}'")]
    Parse(String),
}

/// Parses the single-value output of the frame count query.
pub fn parse_frame_count(output: &str) -> Result<u64, ProbeError> {
    let trimmed = output.trim();
    trimmed
        .parse::<u64>()
        .map_err(|_| ProbeError::Parse(trimmed.to_string()))
}

async fn run_ffprobe(ffprobe: &Path, args: &[&str], source: &Path) -> Result<String, ProbeError> {
    let output = Command::new(ffprobe)
        .args(args)
        .arg(source)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::Failed {
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Counts the frames of the first video stream.
///
/// Runs `ffprobe -v error -select_streams v:0 -show_entries stream=nb_frames
/// -of default=nokey=1:noprint_wrappers=1 <source>`.
pub async fn try_probe_frame_count(ffprobe: &Path, source: &Path) -> Result<u64, ProbeError> {
    let stdout = run_ffprobe(
        ffprobe,
        &[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=nb_frames",
            "-of",
            "default=nokey=1:noprint_wrappers=1",
        ],
        source,
    )
    .await?;
    parse_frame_count(&stdout)
}

/// Frame count of the first video stream, `None` when it cannot be determined.
pub async fn probe_frame_count(ffprobe: &Path, source: &Path) -> Option<u64> {
    match try_probe_frame_count(ffprobe, source).await {
        Ok(frames) => {
            debug!(source = %source.display(), frames, "probed frame count");
            Some(frames)
        }
        Err(e) => {
            warn!(
                source = %source.display(),
                error = %e,
                "frame count unavailable, progress will not be reported"
            );
            None
        }
    }
}

/// Whether `source` has at least one audio stream.
///
/// Runs `ffprobe -v error -select_streams a -show_entries stream=index
/// -of compact=p=0:nk=1 <source>` and looks for any printed stream index.
pub async fn detect_audio_presence(ffprobe: &Path, source: &Path) -> bool {
    let result = run_ffprobe(
        ffprobe,
        &[
            "-v",
            "error",
            "-select_streams",
            "a",
            "-show_entries",
            "stream=index",
            "-of",
            "compact=p=0:nk=1",
        ],
        source,
    )
    .await;

    match result {
        Ok(stdout) => {
            let has_audio = stdout.lines().any(|line| !line.trim().is_empty());
            debug!(source = %source.display(), has_audio, "probed audio streams");
            has_audio
        }
        Err(e) => {
            debug!(source = %source.display(), error = %e, "audio probe failed, assuming no audio");
            false
        }
    }
}
