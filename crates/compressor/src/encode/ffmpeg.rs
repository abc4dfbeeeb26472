//! ffmpeg encoder module
//!
//! Builds the ffmpeg command line for one [`EncodeRequest`] and extracts
//! progress from ffmpeg's status output.

use crate::request::EncodeRequest;
use regex::Regex;
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

/// Audio bitrate used when the source has an audio stream
pub const AUDIO_BITRATE: &str = "128k";

/// Edge length, in pixels, the watermark image is scaled to
pub const WATERMARK_SIZE: u32 = 45;

static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"frame=\s*(\d+)").expect("frame pattern is valid"));

/// Build the ffmpeg command for a request
///
/// Creates a Command configured with:
/// - The source as the first input
/// - When a watermark is set, the image as second input, scaled to 45x45 and
///   overlaid at the request's offset through a filter graph
/// - Video codec, preset and CRF from the request
/// - AAC audio at a fixed bitrate when `has_audio`, otherwise audio stripped
/// - The destination as the final argument
pub fn build_encode_command(ffmpeg: &Path, request: &EncodeRequest, has_audio: bool) -> Command {
    let mut cmd = Command::new(ffmpeg);

    cmd.arg("-i").arg(request.source());

    if let Some(wm) = request.watermark() {
        cmd.arg("-i").arg(&wm.path);
        cmd.arg("-filter_complex").arg(format!(
            "[1:v]scale={size}:{size}[wm];[0:v][wm]overlay={x}:{y}[out]",
            size = WATERMARK_SIZE,
            x = wm.x,
            y = wm.y,
        ));
        cmd.arg("-map").arg("[out]");
    }

    cmd.arg("-c:v").arg(request.codec().encoder_name());
    cmd.arg("-preset").arg(request.preset().as_str());
    cmd.arg("-crf").arg(request.crf().to_string());

    if has_audio {
        cmd.arg("-c:a").arg("aac");
        cmd.arg("-b:a").arg(AUDIO_BITRATE);
    } else {
        cmd.arg("-an");
    }

    cmd.arg(request.destination());

    cmd
}

/// Extract the frame counter from a status line such as
/// `frame=  120 fps= 30 q=28.0 size=  1024kB time=00:00:04.00`.
pub fn parse_frame(line: &str) -> Option<u64> {
    FRAME_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Percent complete for `frame` out of `total`, floored and clamped to 100.
///
/// Returns `None` when the total is unknown (zero).
pub fn progress_percent(frame: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = (frame as u128 * 100) / total as u128;
    Some(percent.min(100) as u8)
}
