//! Per-file encode request

use crate::config::{EncoderPreset, VideoCodec, WatermarkConfig};
use std::path::{Path, PathBuf};

/// Image overlaid on the output, positioned in destination pixel space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub path: PathBuf,
    pub x: i32,
    pub y: i32,
}

impl Watermark {
    pub fn new(path: impl Into<PathBuf>, x: i32, y: i32) -> Self {
        Self {
            path: path.into(),
            x,
            y,
        }
    }

    /// Map a position picked on a scaled-down preview onto the video frame.
    ///
    /// `preview_pos` is relative to a preview of `preview_size`; the result is
    /// in pixels of a `video_size` frame, truncated toward zero. A preview with
    /// a zero dimension leaves that coordinate unscaled.
    pub fn from_preview(
        path: impl Into<PathBuf>,
        preview_pos: (i32, i32),
        preview_size: (u32, u32),
        video_size: (u32, u32),
    ) -> Self {
        let scale = |pos: i32, preview: u32, video: u32| -> i32 {
            if preview == 0 {
                return pos;
            }
            (pos as f64 * (video as f64 / preview as f64)) as i32
        };

        Self {
            path: path.into(),
            x: scale(preview_pos.0, preview_size.0, video_size.0),
            y: scale(preview_pos.1, preview_size.1, video_size.1),
        }
    }
}

impl From<&WatermarkConfig> for Watermark {
    fn from(cfg: &WatermarkConfig) -> Self {
        Watermark::new(cfg.path.clone(), cfg.x, cfg.y)
    }
}

/// Everything needed to encode one file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    source: PathBuf,
    destination: PathBuf,
    crf: u8,
    codec: VideoCodec,
    preset: EncoderPreset,
    watermark: Option<Watermark>,
}

impl EncodeRequest {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        crf: u8,
        codec: VideoCodec,
        preset: EncoderPreset,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            crf,
            codec,
            preset,
            watermark: None,
        }
    }

    pub fn with_watermark(mut self, watermark: Watermark) -> Self {
        self.watermark = Some(watermark);
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn crf(&self) -> u8 {
        self.crf
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    pub fn preset(&self) -> EncoderPreset {
        self.preset
    }

    pub fn watermark(&self) -> Option<&Watermark> {
        self.watermark.as_ref()
    }
}
