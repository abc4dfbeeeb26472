//! Startup checks
//!
//! Verifies that the configured ffmpeg and ffprobe binaries can be executed
//! before any batch is submitted.

use crate::config::ToolsConfig;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::info;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("tool not available: {0}")]
    ToolUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse the version token out of `-version` output
///
/// Works for both ffmpeg and ffprobe banners:
/// - Standard: "ffmpeg version 7.1 ..." -> "7.1"
/// - N-prefixed: "ffprobe version n6.1-3-gabc ..." -> "6.1-3-gabc"
pub fn parse_ffmpeg_version(version_output: &str) -> Option<String> {
    let version_line = version_output
        .lines()
        .find(|line| line.to_lowercase().contains(" version "))?;

    let lower = version_line.to_lowercase();
    let token = lower.split(" version ").nth(1)?.split_whitespace().next()?;

    // Release builds from git tags carry an `n` prefix
    let token = match token.strip_prefix('n') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => token,
    };

    Some(token.to_string())
}

/// Run `<path> -version` and return the reported version
///
/// An unparseable banner is not an error; the version is then `"unknown"`.
pub fn check_tool_available(tool: &str, path: &Path) -> Result<String, StartupError> {
    let output = Command::new(path).arg("-version").output().map_err(|e| {
        StartupError::ToolUnavailable(format!(
            "{} -version failed; is {} installed and in PATH? Error: {}",
            path.display(),
            tool,
            e
        ))
    })?;

    if !output.status.success() {
        return Err(StartupError::ToolUnavailable(format!(
            "{} -version exited with {}",
            path.display(),
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_ffmpeg_version(&stdout).unwrap_or_else(|| "unknown".to_string()))
}

/// Run all startup checks
///
/// Checks, in order:
/// 1. ffmpeg
/// 2. ffprobe
pub fn run_startup_checks(tools: &ToolsConfig) -> Result<(), StartupError> {
    let ffmpeg_version = check_tool_available("ffmpeg", &tools.ffmpeg)?;
    info!(path = %tools.ffmpeg.display(), version = %ffmpeg_version, "ffmpeg available");

    let ffprobe_version = check_tool_available("ffprobe", &tools.ffprobe)?;
    info!(path = %tools.ffprobe.display(), version = %ffprobe_version, "ffprobe available");

    Ok(())
}
