//! vidpress
//!
//! Batch video compressor driving ffmpeg: probes each source, encodes it at the
//! chosen quality tier with an optional watermark, and reports progress as a
//! stream of events.

pub mod batch;
pub mod encode;
pub mod events;
pub mod inputs;
pub mod job;
pub mod naming;
pub mod probe;
pub mod request;
pub mod startup;

#[cfg(all(test, unix))]
mod test_support;

pub use vidpress_config as config;
pub use vidpress_config::Config;
pub use batch::{plan_requests, BatchError, BatchQueue, BatchSettings, BatchSnapshot};
pub use encode::{build_encode_command, parse_frame, progress_percent, StatusLines};
pub use events::{BatchEvent, EncodeOutcome, EventSink};
pub use inputs::{collect_inputs, is_video_file};
pub use job::{EncodeJobRunner, JobError, JobState};
pub use naming::{output_file_name, resolve_output_path};
pub use probe::{detect_audio_presence, probe_frame_count, try_probe_frame_count, ProbeError};
pub use request::{EncodeRequest, Watermark};
pub use startup::{check_tool_available, parse_ffmpeg_version, run_startup_checks, StartupError};
