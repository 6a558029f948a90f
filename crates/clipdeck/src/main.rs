use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clipcore::{
    estimate_download_size, CodecTarget, DownloadRequestBuilder, MediaSelection, PipelineError,
    ProgressEvent, ToolOverrides,
};
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Parser)]
#[command(name = "clipdeck", version, about = "Fetch, trim and transcode media for editing workflows")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose diagnostics (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a clip and run any requested conversion
    Get(GetArgs),
    /// Report the estimated download size without fetching media
    Estimate(EstimateArgs),
}

#[derive(Args)]
struct GetArgs {
    /// Source URL
    url: String,

    /// Streams to fetch: both, video or audio
    #[arg(long, default_value = "both")]
    media: String,

    /// Target codec for video: h264 or prores
    #[arg(long, default_value = "h264")]
    codec: String,

    /// Quality ceiling: 144, 360, 480, 720, 1080, 4k or max
    #[arg(long, default_value = "max")]
    quality: String,

    /// Container for audio-only runs: mp3 or wav
    #[arg(long, default_value = "wav")]
    audio_format: String,

    /// Destination directory (defaults to the configured download dir)
    #[arg(long)]
    dest: Option<String>,

    /// Clip start in whole seconds
    #[arg(long)]
    start: Option<u64>,

    /// Clip end in whole seconds
    #[arg(long)]
    end: Option<u64>,

    /// Browser to read cookies from
    #[arg(long)]
    browser: Option<String>,

    #[command(flatten)]
    tools: ToolArgs,
}

#[derive(Args)]
struct EstimateArgs {
    /// Source URL
    url: String,

    /// Streams to fetch: both, video or audio
    #[arg(long, default_value = "both")]
    media: String,

    /// Quality ceiling: 144, 360, 480, 720, 1080, 4k or max
    #[arg(long, default_value = "max")]
    quality: String,

    /// Clip start in whole seconds
    #[arg(long)]
    start: Option<u64>,

    /// Clip end in whole seconds
    #[arg(long)]
    end: Option<u64>,

    /// Browser to read cookies from
    #[arg(long)]
    browser: Option<String>,

    #[command(flatten)]
    tools: ToolArgs,
}

#[derive(Args)]
struct ToolArgs {
    /// Explicit yt-dlp path
    #[arg(long)]
    ytdlp: Option<String>,

    /// Explicit ffmpeg path
    #[arg(long)]
    ffmpeg: Option<String>,

    /// Explicit deno path (its directory joins the tool search path)
    #[arg(long)]
    deno: Option<String>,
}

impl ToolArgs {
    fn into_overrides(self) -> ToolOverrides {
        ToolOverrides {
            ytdlp: self.ytdlp,
            ffmpeg: self.ffmpeg,
            deno: self.deno,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Get(args) => run_get(args).await,
        Commands::Estimate(args) => run_estimate(args).await,
    }
}

fn init_logging(verbose: u8) -> Result<()> {
    let default_filter = match verbose {
        0 => "warn,clipcore=info",
        1 => "info,clipcore=debug",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_log::LogTracer::init()?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run_get(args: GetArgs) -> Result<()> {
    let url = Url::parse(&args.url)?;

    let mut builder = DownloadRequestBuilder::new(url)
        .selection(parse_selection(&args.media)?)
        .codec(parse_codec(&args.codec)?)
        .quality_label(&args.quality)
        .audio_container_label(&args.audio_format)
        .tool_overrides(args.tools.into_overrides());
    if let Some(dest) = args.dest {
        builder = builder.destination(dest);
    }
    if let Some(browser) = &args.browser {
        builder = builder.cookie_browser(browser);
    }
    builder = apply_range(builder, args.start, args.end)?;
    let request = builder.build()?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_progress(rx));

    let result = clipcore::run(&request, tx, cancel).await;
    let _ = printer.await;

    match result {
        Ok(outcome) => {
            match outcome.file {
                Some(file) => println!("Saved: {}", file.display()),
                None => println!("Run finished but produced no file"),
            }
            Ok(())
        }
        Err(PipelineError::Cancelled) => {
            eprintln!("Cancelled");
            std::process::exit(130);
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_estimate(args: EstimateArgs) -> Result<()> {
    let url = Url::parse(&args.url)?;

    let mut builder = DownloadRequestBuilder::new(url)
        .selection(parse_selection(&args.media)?)
        .quality_label(&args.quality)
        .tool_overrides(args.tools.into_overrides());
    if let Some(browser) = &args.browser {
        builder = builder.cookie_browser(browser);
    }
    builder = apply_range(builder, args.start, args.end)?;
    let request = builder.build()?;

    let estimate = estimate_download_size(&request).await?;
    match estimate.bytes {
        Some(bytes) => println!("Estimated size: {}", format_bytes(bytes)),
        None => println!("Estimated size: unknown"),
    }
    if let Some(duration) = estimate.duration_secs {
        println!("Source duration: {duration:.0}s");
    }
    Ok(())
}

fn parse_selection(label: &str) -> Result<MediaSelection> {
    MediaSelection::from_str(label)
        .map_err(|_| anyhow::anyhow!("unknown media selection '{label}', use both, video or audio"))
}

fn parse_codec(label: &str) -> Result<CodecTarget> {
    CodecTarget::from_str(label)
        .map_err(|_| anyhow::anyhow!("unknown codec '{label}', use h264 or prores"))
}

fn apply_range(
    builder: DownloadRequestBuilder,
    start: Option<u64>,
    end: Option<u64>,
) -> Result<DownloadRequestBuilder> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(builder.time_range(start, end)),
        (None, None) => Ok(builder),
        _ => Err(anyhow::anyhow!("--start and --end must be given together")),
    }
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping download");
            cancel.cancel();
        }
    });
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) {
    use std::io::Write;
    let mut last_whole = -1i64;
    while let Some(event) = rx.recv().await {
        let whole = event.percent as i64;
        if whole != last_whole {
            last_whole = whole;
            print!("\r[{:>3}%] {}        ", whole, event.phase);
            let _ = std::io::stdout().flush();
        }
    }
    println!();
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
