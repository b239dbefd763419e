use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clipveil::{
    blur::{FaceDetector, NoFaceDetector, NormalizedRect, StaticRegionDetector},
    config::Config,
    ffmpeg,
    filters::FilterSpec,
    preview::{timeline_thumbnails, PreviewCompositor},
    transcode::{ExportOptions, JobStatus, TranscodeEngine},
    trim::TrimPlanner,
    video::{frame_at, AutoDecoder, FfmpegDecoder, FrameRate, MediaAsset, MediaTime, Size},
};

#[derive(Parser)]
#[command(
    name = "clipveil",
    version,
    about = "Preview color filters, trim, and export face-blurred video",
    long_about = "clipveil applies non-destructive color filters to video frames, trims clips and exports copies with every face blurred."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use a generated test pattern of this many seconds instead of an input file
    #[arg(long, global = true, value_name = "SECS")]
    synthetic: Option<f64>,
}

#[derive(Subcommand)]
enum Command {
    /// Print what ffprobe reports about a video
    Probe {
        input: Option<PathBuf>,
    },

    /// Render one filtered frame to a PNG
    Still {
        input: Option<PathBuf>,

        /// Position in seconds
        #[arg(long, default_value = "0")]
        at: f64,

        #[command(flatten)]
        filter: FilterArgs,

        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Write the filter strip thumbnails, one PNG per preset
    Thumbs {
        input: Option<PathBuf>,

        /// Position in seconds of the base frame
        #[arg(long, default_value = "0")]
        at: f64,

        /// Write the trim timeline strip (evenly spaced frames) instead
        #[arg(long)]
        timeline: bool,

        /// Output directory
        #[arg(long)]
        out_dir: PathBuf,
    },

    /// Export a trimmed copy, optionally face-blurred and filtered
    Export {
        input: Option<PathBuf>,

        /// Trim start in seconds
        #[arg(long, default_value = "0")]
        start: f64,

        /// Trim end in seconds (defaults to the end of the video)
        #[arg(long)]
        end: Option<f64>,

        /// Blur faces
        #[arg(long)]
        blur: bool,

        /// Fixed face region as normalized x,y,w,h (repeatable)
        #[arg(long = "mask", value_name = "X,Y,W,H")]
        masks: Vec<NormalizedRect>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Filter preset (Original, Noir, Chrome, Fade, Instant, Mono, Process, Tonal, Transfer)
    #[arg(short, long)]
    filter: Option<String>,

    /// Brightness offset, -1 to 1
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    brightness: f32,

    /// Contrast, 0 to 2
    #[arg(long, default_value = "1")]
    contrast: f32,

    /// Saturation, 0 to 2
    #[arg(long, default_value = "1")]
    saturation: f32,
}

impl FilterArgs {
    fn spec(&self) -> FilterSpec {
        FilterSpec::new(self.filter.clone(), self.brightness, self.contrast, self.saturation)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_directive = if cli.verbose { "clipveil=debug" } else { "clipveil=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)))
        .init();

    info!("Starting clipveil v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.preview.threads)
        .build_global()
    {
        warn!("Could not size the pixel thread pool: {}", e);
    }

    match &cli.command {
        Command::Probe { input } => {
            let asset = open_asset(&cli, &config, input.as_deref())?;
            print_asset(&asset);
            Ok(())
        }
        Command::Still { input, at, filter, out } => {
            let asset = open_asset(&cli, &config, input.as_deref())?;
            cmd_still(&config, &asset, *at, filter.spec(), out)
        }
        Command::Thumbs {
            input,
            at,
            timeline,
            out_dir,
        } => {
            let asset = open_asset(&cli, &config, input.as_deref())?;
            if *timeline {
                cmd_timeline(&config, &asset, out_dir)
            } else {
                cmd_thumbs(&config, &asset, *at, out_dir)
            }
        }
        Command::Export {
            input,
            start,
            end,
            blur,
            masks,
            filter,
            out,
        } => {
            let asset = open_asset(&cli, &config, input.as_deref())?;
            let end = end.unwrap_or_else(|| asset.duration.as_secs());
            let options = ExportOptions::trim_only(out)
                .with_blur(*blur)
                .with_filter(Some(filter.spec()));
            cmd_export(&config, &asset, *start, end, masks, options).await
        }
    }
}

fn open_asset(cli: &Cli, config: &Config, input: Option<&Path>) -> Result<MediaAsset> {
    if let Some(secs) = cli.synthetic {
        info!("Using a {:.1}s synthetic test pattern", secs);
        return Ok(MediaAsset::synthetic(
            Size::new(1280, 720),
            FrameRate::FPS_30,
            MediaTime::from_secs(secs),
        ));
    }

    let Some(input) = input else {
        bail!("an input file is required unless --synthetic is given");
    };
    if !ffmpeg::is_available(&config.ffmpeg.ffprobe_bin) {
        bail!("'{}' was not found; install ffmpeg or set ffmpeg.ffprobe_bin", config.ffmpeg.ffprobe_bin);
    }

    let asset = MediaAsset::probe(input, &config.ffmpeg.ffprobe_bin)
        .with_context(|| format!("failed to open {}", input.display()))?;
    info!(
        "Opened {}: {} @ {} fps, {}",
        asset.label(),
        asset.natural_size,
        asset.frame_rate,
        asset.duration
    );
    Ok(asset)
}

fn print_asset(asset: &MediaAsset) {
    println!("Source:       {}", asset.label());
    println!("Duration:     {}", asset.duration);
    println!("Natural size: {}", asset.natural_size);
    println!("Display size: {} (rotation {}°)", asset.display_size(), asset.rotation);
    println!("Frame rate:   {} ({:.3} fps)", asset.frame_rate, asset.frame_rate.as_f64());
    println!("Video codec:  {}", asset.video_codec.as_deref().unwrap_or("unknown"));
    println!("Audio:        {}", if asset.has_audio { "yes" } else { "no" });
    if let Some(bitrate) = asset.bitrate {
        println!("Bitrate:      {} bit/s", bitrate);
    }
}

fn decoder(config: &Config) -> AutoDecoder {
    AutoDecoder::new(FfmpegDecoder::new(config.ffmpeg.ffmpeg_bin.clone()))
}

fn cmd_still(config: &Config, asset: &MediaAsset, at: f64, spec: FilterSpec, out: &Path) -> Result<()> {
    let mut compositor = PreviewCompositor::default();
    compositor.set_filter(spec)?;

    let frame = frame_at(&decoder(config), asset, MediaTime::from_secs(at))?;
    let frame = compositor.composite_frame(frame);
    frame
        .save_png(out)
        .with_context(|| format!("failed to write {}", out.display()))?;

    info!("Saved frame at {} to {}", frame.pts(), out.display());
    Ok(())
}

fn cmd_thumbs(config: &Config, asset: &MediaAsset, at: f64, out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;

    let base = frame_at(&decoder(config), asset, MediaTime::from_secs(at))?;
    let thumbnails = PreviewCompositor::default().filter_thumbnails(&base, config.preview.thumbnail_edge)?;

    for thumbnail in &thumbnails {
        let path = out_dir.join(format!("{}.png", thumbnail.preset.to_lowercase()));
        thumbnail
            .frame
            .save_png(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("{:<10} {}", thumbnail.preset, path.display());
    }

    info!("Wrote {} thumbnails to {}", thumbnails.len(), out_dir.display());
    Ok(())
}

fn cmd_timeline(config: &Config, asset: &MediaAsset, out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;

    let frames = timeline_thumbnails(
        &decoder(config),
        asset,
        config.preview.timeline_count,
        config.preview.thumbnail_edge,
    )?;
    for (i, frame) in frames.iter().enumerate() {
        let path = out_dir.join(format!("timeline_{:02}.png", i));
        frame
            .save_png(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("{:<10} {}", frame.pts().to_string(), path.display());
    }

    info!("Wrote {} timeline thumbnails to {}", frames.len(), out_dir.display());
    Ok(())
}

async fn cmd_export(
    config: &Config,
    asset: &MediaAsset,
    start: f64,
    end: f64,
    masks: &[NormalizedRect],
    options: ExportOptions,
) -> Result<()> {
    if !ffmpeg::is_available(&config.ffmpeg.ffmpeg_bin) {
        bail!("'{}' was not found; install ffmpeg or set ffmpeg.ffmpeg_bin", config.ffmpeg.ffmpeg_bin);
    }

    let detector: Arc<dyn FaceDetector> = if masks.is_empty() {
        if options.blur_faces {
            warn!("No face regions given with --mask; the export will not blur anything");
        }
        Arc::new(NoFaceDetector)
    } else {
        Arc::new(StaticRegionDetector::new(masks.iter().copied()))
    };

    let range = TrimPlanner::from_config(&config.trim).propose(asset.duration, start, end)?;
    let engine = TranscodeEngine::from_config(config, detector);
    let job = engine.start(asset, range, options)?;

    let mut progress = job.subscribe_progress();
    let mut status = job.subscribe_status();
    let mut reported = 0;
    loop {
        tokio::select! {
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                let percent = (*progress.borrow_and_update() * 100.0) as u32;
                if percent >= reported + 10 {
                    info!("{}: {}% ({} frames)", job.id(), percent, job.frames_written());
                    reported = percent;
                }
            }
            _ = status.wait_for(JobStatus::is_terminal) => break,
        }
    }

    match job.wait().await {
        JobStatus::Completed(output) => {
            println!(
                "Exported {} frames ({}) to {}",
                output.frame_count,
                output.duration,
                output.path.display()
            );
            Ok(())
        }
        JobStatus::Failed(reason) => bail!("export failed: {}", reason),
        JobStatus::Cancelled => bail!("export was cancelled"),
        JobStatus::Running => bail!("export ended without a result"),
    }
}
