//! CLI entry point for vidpress
//!
//! Collects the input files, builds the batch settings from the config file,
//! environment and flags, runs the batch and renders its events.

use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vidpress::config::{
    ConfigError, EncoderPreset, QualityTier, VideoCodec, WatermarkConfig,
};
use vidpress::{
    collect_inputs, run_startup_checks, BatchEvent, BatchQueue, BatchSettings, Config,
    EncodeOutcome,
};

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "vidpress.toml";

/// vidpress - batch video compression with ffmpeg
#[derive(Parser, Debug)]
#[command(name = "vidpress")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video files or directories to compress
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Quality tier: Low, Medium or High
    #[arg(long)]
    tier: Option<QualityTier>,

    /// Constant rate factor, must lie within the tier's range
    #[arg(long)]
    crf: Option<u8>,

    /// Video codec: libx264 or libx265
    #[arg(long)]
    codec: Option<VideoCodec>,

    /// Encoder preset, ultrafast through veryslow
    #[arg(long)]
    preset: Option<EncoderPreset>,

    /// Image overlaid on every output
    #[arg(long)]
    watermark: Option<PathBuf>,

    /// Horizontal watermark offset in pixels
    #[arg(long)]
    watermark_x: Option<i32>,

    /// Vertical watermark offset in pixels
    #[arg(long)]
    watermark_y: Option<i32>,

    /// Print events as JSON lines on stdout
    #[arg(long, default_value = "false")]
    json: bool,

    /// Skip the ffmpeg/ffprobe availability checks
    #[arg(long, default_value = "false")]
    skip_checks: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    // The binary and the library share the `vidpress` target
    let default_filter = if verbose { "vidpress=debug" } else { "vidpress=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve config: explicit file, else `vidpress.toml` if present, else defaults.
/// Environment overrides apply in every case; flags are applied afterwards.
fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match explicit {
        Some(path) => Config::load_from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            Config::load_from_file(DEFAULT_CONFIG_FILE)?
        }
        None => Config::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

fn apply_args(config: &mut Config, args: &Args) {
    if let Some(tier) = args.tier {
        config.encode.quality_tier = tier;
        // A CRF picked for another tier would no longer validate
        if args.crf.is_none() {
            config.encode.crf = None;
        }
    }
    if let Some(crf) = args.crf {
        config.encode.crf = Some(crf);
    }
    if let Some(codec) = args.codec {
        config.encode.codec = codec;
    }
    if let Some(preset) = args.preset {
        config.encode.preset = preset;
    }
    if let Some(path) = &args.watermark {
        config.watermark = Some(WatermarkConfig {
            path: path.clone(),
            x: 10,
            y: 10,
        });
    }
    if let Some(wm) = config.watermark.as_mut() {
        if let Some(x) = args.watermark_x {
            wm.x = x;
        }
        if let Some(y) = args.watermark_y {
            wm.y = y;
        }
    } else if args.watermark_x.is_some() || args.watermark_y.is_some() {
        warn!("watermark offsets given without a watermark image, ignoring");
    }
}

/// Expand the command-line paths; finding no video at all is an error
fn gather_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let inputs = collect_inputs(paths);
    if inputs.is_empty() {
        return Err(format!(
            "no video files found in {} given path(s)",
            paths.len()
        ));
    }
    Ok(inputs)
}

/// Terminal rendering of batch events
#[derive(Default)]
struct Renderer {
    json: bool,
    verbose: bool,
    total: usize,
    started: usize,
    failed: usize,
}

impl Renderer {
    /// Render one event; returns true once the batch is over
    fn render(&mut self, event: &BatchEvent) -> bool {
        if let BatchEvent::JobFailed { .. } = event {
            self.failed += 1;
        }

        if self.json {
            match event.to_json() {
                Ok(line) => println!("{}", line),
                Err(e) => error!(error = %e, "failed to serialize event"),
            }
        } else {
            self.render_text(event);
        }

        matches!(
            event,
            BatchEvent::BatchFinished { .. } | BatchEvent::NothingToDo { .. }
        )
    }

    fn render_text(&mut self, event: &BatchEvent) {
        let mut err = std::io::stderr();
        match event {
            BatchEvent::BatchStarted { total } => {
                self.total = *total;
            }
            BatchEvent::JobStarted {
                source,
                destination,
                ..
            } => {
                self.started += 1;
                let _ = writeln!(
                    err,
                    "[{}/{}] {} -> {}",
                    self.started,
                    self.total,
                    source.display(),
                    destination.display()
                );
            }
            BatchEvent::Progress { percent, .. } => {
                let _ = write!(err, "\r  {:>3}%", percent);
                let _ = err.flush();
            }
            BatchEvent::Line { text, .. } => {
                if self.verbose {
                    let _ = writeln!(err, "\r  {}", text);
                }
            }
            BatchEvent::JobFinished { outcome, .. } => match outcome {
                EncodeOutcome::Success => {
                    let _ = writeln!(err, "\r  done");
                }
                EncodeOutcome::Failure { message } => {
                    let _ = writeln!(err, "\r  failed: {}", message);
                }
            },
            BatchEvent::JobFailed { .. } => {}
            BatchEvent::BatchFinished { .. } => {
                let _ = writeln!(
                    err,
                    "{} of {} files compressed",
                    self.total.saturating_sub(self.failed),
                    self.total
                );
            }
            BatchEvent::NothingToDo { reason } => {
                let _ = writeln!(err, "Nothing to do: {}", reason);
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    apply_args(&mut config, &args);
    if let Err(e) = config.validate() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    if args.skip_checks {
        warn!("skipping startup checks (--skip-checks enabled)");
    } else if let Err(e) = run_startup_checks(&config.tools) {
        error!("startup check failed: {}", e);
        return ExitCode::FAILURE;
    }

    let inputs = match gather_inputs(&args.inputs) {
        Ok(inputs) => inputs,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let settings = BatchSettings::from_config(&config);
    info!(
        files = inputs.len(),
        tier = %settings.tier,
        crf = settings.crf,
        codec = settings.codec.encoder_name(),
        preset = settings.preset.as_str(),
        "starting batch"
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let queue = BatchQueue::new(config.tools.clone(), Arc::new(tx));
    let mut renderer = Renderer {
        json: args.json,
        verbose: args.verbose,
        ..Renderer::default()
    };

    let handle = match queue.submit(inputs, &settings).await {
        Ok(handle) => handle,
        Err(_) => {
            // The rejection was emitted as an event
            while let Ok(event) = rx.try_recv() {
                renderer.render(&event);
            }
            return ExitCode::FAILURE;
        }
    };

    while let Some(event) = rx.recv().await {
        if renderer.render(&event) {
            break;
        }
    }

    if let Err(e) = handle.await {
        error!(error = %e, "batch worker panicked");
        return ExitCode::FAILURE;
    }

    if renderer.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
