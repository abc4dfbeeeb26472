//! Encoder invocation: command construction and output parsing

pub mod ffmpeg;
pub mod status_lines;

pub use ffmpeg::{
    build_encode_command, parse_frame, progress_percent, AUDIO_BITRATE, WATERMARK_SIZE,
};
pub use status_lines::StatusLines;
