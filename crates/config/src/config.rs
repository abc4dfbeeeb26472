//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Values parsed but are inconsistent with each other
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Compression level chosen by the user.
///
/// The label is embedded verbatim in output filenames
/// (`clip_Medium_compressed.mp4`), so the variant names are part of the
/// on-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [QualityTier::Low, QualityTier::Medium, QualityTier::High];

    /// Label used in output filenames
    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Low => "Low",
            QualityTier::Medium => "Medium",
            QualityTier::High => "High",
        }
    }

    /// CRF values offered for this tier
    pub fn crf_values(&self) -> RangeInclusive<u8> {
        match self {
            QualityTier::Low => 18..=22,
            QualityTier::Medium => 23..=26,
            QualityTier::High => 27..=31,
        }
    }

    /// CRF used when none is picked explicitly (lowest of the tier)
    pub fn default_crf(&self) -> u8 {
        *self.crf_values().start()
    }

    pub fn accepts_crf(&self, crf: u8) -> bool {
        self.crf_values().contains(&crf)
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(QualityTier::Low),
            "medium" => Ok(QualityTier::Medium),
            "high" => Ok(QualityTier::High),
            other => Err(format!(
                "unknown quality tier '{}', expected Low, Medium or High",
                other
            )),
        }
    }
}

/// Video encoder passed to `-c:v`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VideoCodec {
    #[default]
    #[serde(rename = "libx264", alias = "h264")]
    Libx264,
    #[serde(rename = "libx265", alias = "h265", alias = "hevc")]
    Libx265,
}

impl VideoCodec {
    /// Encoder name as understood by ffmpeg
    pub fn encoder_name(&self) -> &'static str {
        match self {
            VideoCodec::Libx264 => "libx264",
            VideoCodec::Libx265 => "libx265",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoder_name())
    }
}

impl FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "libx264" | "h264" | "x264" | "264" => Ok(VideoCodec::Libx264),
            "libx265" | "h265" | "hevc" | "x265" | "265" => Ok(VideoCodec::Libx265),
            other => Err(format!(
                "unknown codec '{}', expected libx264 or libx265",
                other
            )),
        }
    }
}

/// Encoder speed/quality tradeoff passed to `-preset`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EncoderPreset {
    Ultrafast,
    Superfast,
    Fast,
    #[default]
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl EncoderPreset {
    pub const ALL: [EncoderPreset; 7] = [
        EncoderPreset::Ultrafast,
        EncoderPreset::Superfast,
        EncoderPreset::Fast,
        EncoderPreset::Medium,
        EncoderPreset::Slow,
        EncoderPreset::Slower,
        EncoderPreset::Veryslow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderPreset::Ultrafast => "ultrafast",
            EncoderPreset::Superfast => "superfast",
            EncoderPreset::Fast => "fast",
            EncoderPreset::Medium => "medium",
            EncoderPreset::Slow => "slow",
            EncoderPreset::Slower => "slower",
            EncoderPreset::Veryslow => "veryslow",
        }
    }
}

impl fmt::Display for EncoderPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncoderPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        EncoderPreset::ALL
            .iter()
            .find(|p| p.as_str() == lower)
            .copied()
            .ok_or_else(|| format!("unknown preset '{}'", s))
    }
}

/// Paths of the external tools
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// Encoder binary (default "ffmpeg", resolved through PATH)
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    /// Probe binary (default "ffprobe", resolved through PATH)
    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

/// Encoding settings shared by every file of a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EncodeConfig {
    #[serde(default)]
    pub quality_tier: QualityTier,
    /// Explicit CRF; must lie within the tier's range (tier default if None)
    #[serde(default)]
    pub crf: Option<u8>,
    #[serde(default)]
    pub codec: VideoCodec,
    #[serde(default)]
    pub preset: EncoderPreset,
}

impl EncodeConfig {
    pub fn effective_crf(&self) -> u8 {
        self.crf.unwrap_or_else(|| self.quality_tier.default_crf())
    }
}

/// Watermark image overlaid on every output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatermarkConfig {
    pub path: PathBuf,
    /// Horizontal offset in output pixels
    #[serde(default = "default_watermark_offset")]
    pub x: i32,
    /// Vertical offset in output pixels
    #[serde(default = "default_watermark_offset")]
    pub y: i32,
}

fn default_watermark_offset() -> i32 {
    10
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub encode: EncodeConfig,
    #[serde(default)]
    pub watermark: Option<WatermarkConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - VIDPRESS_FFMPEG -> tools.ffmpeg
    /// - VIDPRESS_FFPROBE -> tools.ffprobe
    /// - VIDPRESS_QUALITY_TIER -> encode.quality_tier
    /// - VIDPRESS_CRF -> encode.crf
    /// - VIDPRESS_CODEC -> encode.codec
    /// - VIDPRESS_PRESET -> encode.preset
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("VIDPRESS_FFMPEG") {
            if !val.is_empty() {
                self.tools.ffmpeg = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("VIDPRESS_FFPROBE") {
            if !val.is_empty() {
                self.tools.ffprobe = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("VIDPRESS_QUALITY_TIER") {
            if let Ok(tier) = val.parse::<QualityTier>() {
                self.encode.quality_tier = tier;
            }
        }

        if let Ok(val) = env::var("VIDPRESS_CRF") {
            if let Ok(crf) = val.parse::<u8>() {
                self.encode.crf = Some(crf);
            }
        }

        if let Ok(val) = env::var("VIDPRESS_CODEC") {
            if let Ok(codec) = val.parse::<VideoCodec>() {
                self.encode.codec = codec;
            }
        }

        if let Ok(val) = env::var("VIDPRESS_PRESET") {
            if let Ok(preset) = val.parse::<EncoderPreset>() {
                self.encode.preset = preset;
            }
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(crf) = self.encode.crf {
            let tier = self.encode.quality_tier;
            if !tier.accepts_crf(crf) {
                let range = tier.crf_values();
                return Err(ConfigError::Invalid(format!(
                    "crf {} is outside the {} tier ({}-{})",
                    crf,
                    tier,
                    range.start(),
                    range.end()
                )));
            }
        }
        Ok(())
    }

    /// Load configuration from file, apply environment overrides and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't interfere with each other
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to clear all config-related env vars
    fn clear_env_vars() {
        env::remove_var("VIDPRESS_FFMPEG");
        env::remove_var("VIDPRESS_FFPROBE");
        env::remove_var("VIDPRESS_QUALITY_TIER");
        env::remove_var("VIDPRESS_CRF");
        env::remove_var("VIDPRESS_CODEC");
        env::remove_var("VIDPRESS_PRESET");
    }

    fn tier_strategy() -> impl Strategy<Value = QualityTier> {
        prop::sample::select(QualityTier::ALL.to_vec())
    }

    fn preset_strategy() -> impl Strategy<Value = EncoderPreset> {
        prop::sample::select(EncoderPreset::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_config_parses_all_sections(
            tier in tier_strategy(),
            crf in proptest::option::of(0u8..52),
            x265 in proptest::bool::ANY,
            preset in preset_strategy(),
            wm_x in 0i32..4000,
            wm_y in 0i32..4000,
        ) {
            let codec = if x265 { "libx265" } else { "libx264" };
            let toml_str = format!(
                r#"
[tools]
ffmpeg = "/opt/ffmpeg/bin/ffmpeg"

[encode]
quality_tier = "{}"
{}
codec = "{}"
preset = "{}"

[watermark]
path = "logo.png"
x = {}
y = {}
"#,
                tier.label(),
                crf.map(|c| format!("crf = {}", c)).unwrap_or_default(),
                codec,
                preset.as_str(),
                wm_x,
                wm_y,
            );

            let config = Config::parse_toml(&toml_str).expect("Valid TOML should parse");

            prop_assert_eq!(config.tools.ffmpeg, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
            prop_assert_eq!(config.tools.ffprobe, PathBuf::from("ffprobe"));
            prop_assert_eq!(config.encode.quality_tier, tier);
            prop_assert_eq!(config.encode.crf, crf);
            prop_assert_eq!(config.encode.codec.encoder_name(), codec);
            prop_assert_eq!(config.encode.preset, preset);
            let wm = config.watermark.expect("watermark section");
            prop_assert_eq!(wm.path, PathBuf::from("logo.png"));
            prop_assert_eq!((wm.x, wm.y), (wm_x, wm_y));
        }

        #[test]
        fn prop_tier_default_crf_is_accepted(tier in tier_strategy()) {
            prop_assert!(tier.accepts_crf(tier.default_crf()));
        }

        #[test]
        fn prop_validate_matches_tier_range(tier in tier_strategy(), crf in 0u8..52) {
            let config = Config {
                encode: EncodeConfig {
                    quality_tier: tier,
                    crf: Some(crf),
                    ..EncodeConfig::default()
                },
                ..Config::default()
            };
            prop_assert_eq!(config.validate().is_ok(), tier.crf_values().contains(&crf));
        }

        #[test]
        fn prop_env_overrides_crf(
            initial in proptest::option::of(18u8..32),
            override_crf in 0u8..52,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!(
                "[encode]\n{}\n",
                initial.map(|c| format!("crf = {}", c)).unwrap_or_default()
            );
            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("VIDPRESS_CRF", override_crf.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.encode.crf, Some(override_crf));
        }

        #[test]
        fn prop_env_overrides_preset(preset in preset_strategy()) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let mut config = Config::default();
            env::set_var("VIDPRESS_PRESET", preset.as_str().to_uppercase());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.encode.preset, preset);
        }
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse_toml("").expect("Empty TOML should parse");

        assert_eq!(config.tools.ffmpeg, PathBuf::from("ffmpeg"));
        assert_eq!(config.tools.ffprobe, PathBuf::from("ffprobe"));
        assert_eq!(config.encode.quality_tier, QualityTier::Medium);
        assert_eq!(config.encode.crf, None);
        assert_eq!(config.encode.effective_crf(), 23);
        assert_eq!(config.encode.codec, VideoCodec::Libx264);
        assert_eq!(config.encode.preset, EncoderPreset::Medium);
        assert!(config.watermark.is_none());
    }

    #[test]
    fn test_watermark_offsets_default() {
        let config = Config::parse_toml("[watermark]\npath = \"wm.png\"\n").expect("Valid TOML");
        let wm = config.watermark.expect("watermark");
        assert_eq!((wm.x, wm.y), (10, 10));
    }

    #[test]
    fn test_tier_ranges() {
        assert_eq!(QualityTier::Low.crf_values(), 18..=22);
        assert_eq!(QualityTier::Medium.crf_values(), 23..=26);
        assert_eq!(QualityTier::High.crf_values(), 27..=31);
        assert_eq!(QualityTier::High.default_crf(), 27);
    }

    #[test]
    fn test_codec_aliases() {
        assert_eq!("h265".parse::<VideoCodec>(), Ok(VideoCodec::Libx265));
        assert_eq!("HEVC".parse::<VideoCodec>(), Ok(VideoCodec::Libx265));
        assert_eq!("264".parse::<VideoCodec>(), Ok(VideoCodec::Libx264));
        assert!("vp9".parse::<VideoCodec>().is_err());

        let config = Config::parse_toml("[encode]\ncodec = \"hevc\"\n").expect("alias parses");
        assert_eq!(config.encode.codec, VideoCodec::Libx265);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut config = Config::default();
        env::set_var("VIDPRESS_QUALITY_TIER", "extreme");
        env::set_var("VIDPRESS_CRF", "twenty");
        env::set_var("VIDPRESS_CODEC", "vp9");
        config.apply_env_overrides();
        clear_env_vars();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides_tool_paths() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut config = Config::default();
        env::set_var("VIDPRESS_FFMPEG", "/usr/local/bin/ffmpeg");
        env::set_var("VIDPRESS_FFPROBE", "/usr/local/bin/ffprobe");
        env::set_var("VIDPRESS_QUALITY_TIER", "high");
        config.apply_env_overrides();
        clear_env_vars();

        assert_eq!(config.tools.ffmpeg, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(config.tools.ffprobe, PathBuf::from("/usr/local/bin/ffprobe"));
        assert_eq!(config.encode.quality_tier, QualityTier::High);
    }

    #[test]
    fn test_validate_rejects_crf_outside_tier() {
        let config = Config::parse_toml("[encode]\nquality_tier = \"Low\"\ncrf = 30\n")
            .expect("Valid TOML");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("outside the Low tier (18-22)"));
    }

    #[test]
    fn test_load_from_missing_file_is_io_error() {
        let result = Config::load("/nonexistent/vidpress.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
