//! podthumb command-line entry point.

use std::path::PathBuf;

use anyhow::{anyhow, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use podthumb_gemini::{GeminiClient, VideoSource};
use podthumb_models::RunSummary;
use podthumb_pipeline::{
    identify_prompt, CallCounter, Collaborators, ComposeRequest, ConfigOverrides,
    HeadshotRequest, ImageStage, PipelineConfig, PipelineOrchestrator, RunFailure, Template,
};

#[derive(Parser)]
#[command(
    name = "podthumb",
    version,
    about = "Generate podcast thumbnails from an episode video",
    after_help = "EXAMPLES:\n  \
                  podthumb run --video episode.mp4 --title \"Why sleep matters\"\n  \
                  podthumb sample --url https://youtu.be/abc --dry-run\n  \
                  podthumb headshots --frames a.png b.png --outdir out/\n  \
                  podthumb compose --headshots host.png guest.png --title \"Ep 12\""
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: identify, extract/crop, headshots, compose
    Run(RunArgs),

    /// Identify speakers and extract their frames, printing the manifest
    Sample(SampleArgs),

    /// Generate headshots from explicit reference frames
    Headshots(HeadshotArgs),

    /// Compose a thumbnail from explicit headshots and a title
    Compose(ComposeArgs),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// Local video file
    #[arg(long)]
    video: Option<PathBuf>,

    /// Public video URL
    #[arg(long)]
    url: Option<String>,
}

impl SourceArgs {
    fn into_source(self) -> Result<VideoSource> {
        match (self.video, self.url) {
            (Some(path), None) => Ok(VideoSource::Local(path)),
            (None, Some(url)) => Ok(VideoSource::Url(url)),
            _ => Err(anyhow!("exactly one of --video or --url is required")),
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Literal title text rendered on the thumbnail
    #[arg(long)]
    title: String,

    /// Root directory for manifests and artifacts
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long)]
    timestamps_per_speaker: Option<usize>,

    #[arg(long)]
    template: Option<Template>,

    #[arg(long)]
    identify_model: Option<String>,

    #[arg(long)]
    headshot_model: Option<String>,

    #[arg(long)]
    compose_model: Option<String>,

    /// Ignore cached artifacts and regenerate
    #[arg(long)]
    no_cache: bool,

    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args, Debug)]
struct SampleArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Identification model
    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    timestamps_per_speaker: Option<usize>,

    #[arg(long)]
    out_manifest: Option<PathBuf>,

    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Root directory for manifests and artifacts
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print the identification prompt and exit
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args, Debug)]
struct HeadshotArgs {
    /// Reference frames, best first
    #[arg(long, num_args = 1.., required = true)]
    frames: Vec<PathBuf>,

    #[arg(long, default_value = "artifacts/headshots")]
    outdir: PathBuf,

    #[arg(long)]
    prompt: Option<String>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long, default_value = "1:1")]
    aspect_ratio: String,

    #[arg(long, default_value = "1K", value_parser = ["1K", "2K", "4K"])]
    image_size: String,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=8))]
    num_images: u32,

    /// Fixed output stem instead of one derived from the first frame
    #[arg(long)]
    output_name: Option<String>,

    /// Send references as-is instead of square-cropping them
    #[arg(long)]
    no_crop: bool,

    #[arg(long)]
    no_cache: bool,

    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args, Debug)]
struct ComposeArgs {
    #[arg(long, num_args = 2.., required = true)]
    headshots: Vec<PathBuf>,

    #[arg(long)]
    title: String,

    /// Background image to build the scene on
    #[arg(long)]
    background: Option<PathBuf>,

    /// Existing thumbnail whose look should be matched
    #[arg(long)]
    style_reference: Option<PathBuf>,

    #[arg(long)]
    template: Option<Template>,

    #[arg(long, default_value = "artifacts/thumbnails/thumb.png")]
    output: PathBuf,

    #[arg(long)]
    model: Option<String>,

    #[arg(long, default_value = "16:9")]
    aspect_ratio: String,

    #[arg(long)]
    no_cache: bool,

    #[arg(long)]
    api_key: Option<String>,
}

fn init_tracing() -> Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("podthumb=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

fn report_failure(failure: RunFailure) -> anyhow::Error {
    error!(outcome = ?failure.summary.outcome, "Run failed");
    if let Ok(json) = serde_json::to_string_pretty(&failure.summary) {
        eprintln!("{}", json);
    }
    failure.error.into()
}

async fn run(args: RunArgs) -> Result<()> {
    let config = PipelineConfig::resolve(ConfigOverrides {
        api_key: args.api_key,
        identify_model: args.identify_model,
        headshot_model: args.headshot_model,
        compose_model: args.compose_model,
        output_root: args.out,
        timestamps_per_speaker: args.timestamps_per_speaker,
        template: args.template,
        use_cache: Some(!args.no_cache),
        ..Default::default()
    })?;
    let source = args.source.into_source()?;

    let collaborators = Collaborators::production(&config)?;
    let orchestrator = PipelineOrchestrator::new(config, collaborators);

    let summary = orchestrator
        .run(source, &args.title)
        .await
        .map_err(report_failure)?;
    print_summary(&summary)
}

async fn sample(args: SampleArgs) -> Result<()> {
    let config = PipelineConfig::resolve(ConfigOverrides {
        api_key: args.api_key,
        identify_model: args.model,
        output_root: args.out,
        manifest_path: args.out_manifest,
        frames_dir: args.frames_dir,
        timestamps_per_speaker: args.timestamps_per_speaker,
        ..Default::default()
    })?;

    if args.dry_run {
        println!("{}", identify_prompt(config.timestamps_per_speaker));
        return Ok(());
    }

    let source = args.source.into_source()?;
    let collaborators = Collaborators::production(&config)?;
    let orchestrator = PipelineOrchestrator::new(config, collaborators);

    let (manifest, summary) = orchestrator.sample(source).await.map_err(report_failure)?;
    info!(
        speakers = manifest.speakers.len(),
        warnings = summary.warnings.len(),
        "Sample finished"
    );
    println!("{}", manifest.to_pretty_json()?);
    Ok(())
}

async fn headshots(args: HeadshotArgs) -> Result<()> {
    let config = PipelineConfig::resolve(ConfigOverrides {
        api_key: args.api_key,
        headshot_model: args.model,
        use_cache: Some(!args.no_cache),
        ..Default::default()
    })?;
    let client = GeminiClient::new(config.gemini_config()?)?;
    let retry = config.retry_policy("headshot");
    let calls = CallCounter::new();
    let stage = ImageStage::new(&client, &retry, &calls);

    let mut request = HeadshotRequest::new(args.frames, args.outdir, &config.headshot_model);
    if let Some(prompt) = args.prompt {
        request.prompt = prompt;
    }
    request.aspect_ratio = args.aspect_ratio;
    request.image_size = args.image_size;
    request.count = args.num_images;
    request.output_name = args.output_name;
    request.crop_square = !args.no_crop;
    request.use_cache = config.use_cache;

    let output = stage.headshots(&request).await?;
    info!(
        outputs = output.paths.len(),
        cache_hit = output.cache_hit,
        remote_calls = calls.get(),
        "Headshots ready"
    );
    for path in &output.paths {
        println!("{}", path.display());
    }
    Ok(())
}

async fn compose(args: ComposeArgs) -> Result<()> {
    let config = PipelineConfig::resolve(ConfigOverrides {
        api_key: args.api_key,
        compose_model: args.model,
        template: args.template,
        use_cache: Some(!args.no_cache),
        ..Default::default()
    })?;
    let client = GeminiClient::new(config.gemini_config()?)?;
    let retry = config.retry_policy("compose");
    let calls = CallCounter::new();
    let stage = ImageStage::new(&client, &retry, &calls);

    let mut request = ComposeRequest::new(args.headshots, args.title, &config.compose_model);
    request.background = args.background;
    request.style_reference = args.style_reference;
    request.template = config.template;
    request.aspect_ratio = args.aspect_ratio;
    request.output = args.output;
    request.use_cache = config.use_cache;

    let output = stage.thumbnail(&request).await?;
    info!(
        cache_hit = output.cache_hit,
        remote_calls = calls.get(),
        "Thumbnail ready"
    );
    for path in &output.paths {
        println!("{}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let cli = Cli::parse();
    init_tracing().context("failed to initialize logging")?;

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Sample(args) => sample(args).await,
        Commands::Headshots(args) => headshots(args).await,
        Commands::Compose(args) => compose(args).await,
    }
}
