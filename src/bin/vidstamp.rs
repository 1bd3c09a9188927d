use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::prelude::*;
use vidstamp::{
    FrameTransform as _, Job, ProgressMode, StampConfig, Stamper,
    config::available_cores,
    media::{decode::decode_frame_at, probe::ensure_ffmpeg_tools},
};

#[derive(Parser, Debug)]
#[command(name = "vidstamp", version, about = "Burn recording timestamps into video files")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stamp every video under a directory tree (requires `ffmpeg` and `ffprobe` on PATH).
    Run(RunArgs),
    /// Stamp a single video.
    Stamp(StampArgs),
    /// Stamp one decoded frame and save it as a PNG.
    Preview(PreviewArgs),
    /// Print the default configuration as JSON.
    Config,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON configuration file; omitted fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Font file (or system font file name) overriding the configured one.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Directory tree to scan for videos.
    #[arg(long)]
    input: PathBuf,

    /// Directory the stamped copies are written under, mirroring the input layout.
    #[arg(long)]
    output: PathBuf,

    #[command(flatten)]
    common: ConfigArgs,

    /// Number of videos processed concurrently (default: derived from available cores).
    #[arg(long)]
    workers: Option<usize>,

    /// Threads given to each encoder.
    #[arg(long)]
    encoder_threads: Option<usize>,

    #[arg(long, value_enum, default_value_t = ProgressMode::Auto)]
    progress: ProgressMode,
}

#[derive(Parser, Debug)]
struct StampArgs {
    #[arg(long)]
    video: PathBuf,

    /// Metadata XML sidecar holding the recording start time.
    #[arg(long)]
    metadata: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    common: ConfigArgs,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    #[arg(long)]
    video: PathBuf,

    #[arg(long)]
    metadata: PathBuf,

    /// Seconds from the start of the video.
    #[arg(long, default_value_t = 0.0)]
    time: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    common: ConfigArgs,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,vidstamp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(vidstamp::progress::LogWriter))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Stamp(args) => cmd_stamp(args).map(|()| ExitCode::SUCCESS),
        Command::Preview(args) => cmd_preview(args).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            let json = serde_json::to_string_pretty(&StampConfig::default())
                .context("serialize default config")?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<StampConfig> {
    let mut cfg = match &args.config {
        Some(path) => StampConfig::from_path(path)?,
        None => StampConfig::default(),
    };
    if let Some(font) = &args.font {
        cfg.font_path = font.to_string_lossy().into_owned();
    }
    cfg.validate()?;
    Ok(cfg)
}

fn load_font(cfg: &StampConfig) -> anyhow::Result<Arc<vidstamp::FontHandle>> {
    let font = vidstamp::FontHandle::load(Path::new(&cfg.font_path), cfg.font_size)?;
    tracing::info!(font = %font.source(), size = font.size(), "font loaded");
    Ok(Arc::new(font))
}

fn cmd_run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let mut cfg = load_config(&args.common)?;
    if args.workers.is_some() {
        cfg.workers = args.workers;
    }
    if let Some(n) = args.encoder_threads {
        cfg.encoder_threads = n;
    }

    let summary = vidstamp::run_batch(&args.input, &args.output, &cfg, args.progress)?;
    println!("{summary}");
    Ok(ExitCode::from(summary.exit_code()))
}

fn cmd_stamp(args: StampArgs) -> anyhow::Result<()> {
    let cfg = load_config(&args.common)?;
    ensure_ffmpeg_tools()?;
    let font = load_font(&cfg)?;

    let job = Job {
        video_path: args.video,
        metadata_path: args.metadata,
        output_path: args.out,
    };
    let threads = cfg.encoder_threads.min(available_cores());
    let report = vidstamp::stamp_video(&job, &cfg, font, threads)?;

    eprintln!(
        "wrote {} ({} frames, {:.2}s)",
        job.output_path.display(),
        report.frames,
        report.duration_sec()
    );
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let cfg = load_config(&args.common)?;
    ensure_ffmpeg_tools()?;

    let creation = vidstamp::parse_metadata_file(&args.metadata)?;
    let info = vidstamp::probe_video(&args.video)?;
    let mut frame = decode_frame_at(&info, args.time)?;

    let stamper = Stamper::new(creation, load_font(&cfg)?, &cfg);
    stamper.apply(&mut frame, args.time)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    frame
        .save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {} ({})", args.out.display(), stamper.text_at(args.time)?);
    Ok(())
}
