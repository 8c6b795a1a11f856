//! Reel client (reel-client) - Main entry point
//!
//! Command-line driver for the submission flow: request a timeline from a
//! prompt and photos, approve it, render, and print live progress.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use reel_common::config::{load_or_default, resolve_config_path};
use reel_common::events::{ChannelErrorData, EventKind, ProgressEvent, VideoErrorData, VideoProgressData};
use reel_common::TimelineComposition;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reel_client::{
    validator, ClientConfig, ImageFile, LiveEventChannel, MediaStore, Pipeline,
    SubmissionOrchestrator, VideoResult,
};

const CONFIG_FILE_NAME: &str = "reel-client.toml";
const CONFIG_ENV_VAR: &str = "REEL_CONFIG";
const DEFAULT_LOG_FILTER: &str = "reel_client=info,reel_common=info";

/// Command-line arguments for reel-client
#[derive(Parser, Debug)]
#[command(name = "reel-client")]
#[command(about = "Property video submission client")]
#[command(version)]
struct Args {
    /// Backend origin (overrides the config file)
    #[arg(long, env = "REEL_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Config file path (falls back to REEL_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Request a timeline and print it as JSON
    Timeline {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Render a timeline JSON file
    Render {
        #[command(flatten)]
        input: InputArgs,

        /// Timeline JSON, as printed by `timeline`
        #[arg(long)]
        timeline: PathBuf,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Full flow: timeline, approval, render
    Run {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        render: RenderArgs,

        /// Replace a caption before rendering, as POSITION=TEXT (repeatable)
        #[arg(long = "caption", value_name = "POSITION=TEXT")]
        captions: Vec<String>,

        /// Approve the proposed timeline without asking
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(ClapArgs, Debug)]
struct InputArgs {
    /// Text prompt describing the video
    #[arg(short, long)]
    prompt: String,

    /// Source images, in visual order
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct RenderArgs {
    /// Render pipeline: free (local ffmpeg) or pro (cloud)
    #[arg(long, default_value = "free")]
    pipeline: Pipeline,

    /// Where to write a video returned as a binary body
    #[arg(short, long, default_value = "reel.mp4")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR, CONFIG_FILE_NAME);
    let toml_config = load_or_default(config_path.as_deref()).context("Failed to load config")?;

    // RUST_LOG wins over the config file
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        toml_config
            .logging
            .level
            .as_deref()
            .unwrap_or(DEFAULT_LOG_FILTER)
            .into()
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }
    let config = ClientConfig::from_toml(&toml_config, args.base_url.clone());
    info!("Backend: {}", config.base_url);

    match args.command {
        Command::Timeline { input } => run_timeline(config, input).await,
        Command::Render {
            input,
            timeline,
            render,
        } => run_render(config, input, &timeline, render).await,
        Command::Run {
            input,
            render,
            captions,
            yes,
        } => run_full(config, input, render, &captions, yes).await,
    }
}

async fn load_images(paths: &[PathBuf]) -> Result<Vec<ImageFile>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let image = ImageFile::from_path(path)
            .await
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        images.push(image);
    }
    Ok(images)
}

async fn run_timeline(config: ClientConfig, input: InputArgs) -> Result<()> {
    let images = load_images(&input.images).await?;
    let orchestrator = SubmissionOrchestrator::new(config).context("Failed to create client")?;

    let timeline = orchestrator
        .submit_timeline(&input.prompt, &images)
        .await
        .context("Timeline request failed")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&timeline).context("Failed to serialize timeline")?
    );
    Ok(())
}

/// Render a saved timeline
async fn run_render(
    config: ClientConfig,
    input: InputArgs,
    timeline_path: &Path,
    render: RenderArgs,
) -> Result<()> {
    let images = load_images(&input.images).await?;
    let raw = tokio::fs::read_to_string(timeline_path)
        .await
        .with_context(|| format!("Failed to read {}", timeline_path.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not JSON", timeline_path.display()))?;
    let timeline = validator::validate_timeline(&payload)
        .with_context(|| format!("{} is not a valid timeline", timeline_path.display()))?;

    let orchestrator = SubmissionOrchestrator::new(config).context("Failed to create client")?;
    orchestrator
        .load_timeline(timeline)
        .await
        .context("Saved timeline rejected")?;

    render_held(&orchestrator, &input, &images, &render).await
}

async fn run_full(
    config: ClientConfig,
    input: InputArgs,
    render: RenderArgs,
    captions: &[String],
    yes: bool,
) -> Result<()> {
    let images = load_images(&input.images).await?;
    let orchestrator = SubmissionOrchestrator::new(config).context("Failed to create client")?;

    let mut timeline = orchestrator
        .submit_timeline(&input.prompt, &images)
        .await
        .context("Timeline request failed")?;

    if !captions.is_empty() {
        for edit in captions {
            let (position, text) = parse_caption(edit)?;
            timeline
                .set_caption(position, text)
                .with_context(|| format!("Cannot apply caption '{}'", edit))?;
        }
        orchestrator
            .replace_timeline(timeline.clone())
            .await
            .context("Edited timeline rejected")?;
    }

    print_timeline(&timeline);

    if !yes && !confirm("Approve and render?").await? {
        info!("Timeline not approved, nothing rendered");
        return Ok(());
    }

    render_held(&orchestrator, &input, &images, &render).await
}

/// Render the held timeline with live progress; Ctrl-C cancels the request
async fn render_held(
    orchestrator: &SubmissionOrchestrator,
    input: &InputArgs,
    images: &[ImageFile],
    render: &RenderArgs,
) -> Result<()> {
    let printer = spawn_progress_printer(orchestrator.channel());
    let result = tokio::select! {
        result = orchestrator.approve(render.pipeline, &input.prompt, images) => {
            result.context("Render failed")
        }
        _ = tokio::signal::ctrl_c() => Err(anyhow!("Render cancelled")),
    };
    printer.abort();

    let outcome = match result {
        Ok(video) => deliver_video(orchestrator.media(), &video, &render.output).await,
        Err(e) => Err(e),
    };
    orchestrator.shutdown().await;
    outcome
}

fn parse_caption(edit: &str) -> Result<(usize, &str)> {
    let Some((position, text)) = edit.split_once('=') else {
        bail!("Caption '{}' must look like POSITION=TEXT", edit);
    };
    let position = position
        .trim()
        .parse()
        .with_context(|| format!("Caption position '{}' is not a number", position))?;
    Ok((position, text))
}

fn print_timeline(timeline: &TimelineComposition) {
    let meta = &timeline.metadata;
    println!(
        "Timeline: {:.1}s, {} @ {} fps, {}x{}, {} / {}",
        meta.total_duration,
        meta.aspect_ratio,
        meta.fps,
        meta.resolution[0],
        meta.resolution[1],
        timeline.theme.style,
        timeline.theme.grading,
    );
    for (position, (image, caption)) in timeline.caption_pairs().into_iter().enumerate() {
        let caption = caption.map(|c| c.text.as_str()).unwrap_or("(no caption)");
        println!(
            "  [{}] image {} at {:.1}s for {:.1}s: {}",
            position, image.ordering, image.start_time, image.duration, caption
        );
    }
    if timeline.music.enabled {
        println!("  music: {}", timeline.music.genre);
    }
}

async fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush().context("Failed to flush stdout")?;

    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .context("Input task failed")?
    .context("Failed to read answer")?;

    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn spawn_progress_printer(channel: &LiveEventChannel) -> tokio::task::JoinHandle<()> {
    let mut rx = channel.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} progress events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_event(event: &ProgressEvent) {
    match event.kind {
        EventKind::VideoProgress => {
            if let Some(p) = event.payload::<VideoProgressData>() {
                println!("[{:>5.1}%] {}: {}", p.progress, p.stage, p.message);
            }
        }
        EventKind::VideoError => {
            if let Some(e) = event.payload::<VideoErrorData>() {
                println!("[error] {} ({})", e.error, e.stage);
            }
        }
        EventKind::ChannelError => {
            if let Some(e) = event.payload::<ChannelErrorData>() {
                println!("[channel] {}", e.error);
            }
        }
        EventKind::Connected => println!("[channel] connected"),
        EventKind::Heartbeat => {}
        EventKind::TimelineUpdate | EventKind::Notification => {
            println!("[{}] {}", event.kind, event.data);
        }
    }
}

async fn deliver_video(media: &MediaStore, video: &VideoResult, output: &Path) -> Result<()> {
    if !video.is_transient() {
        println!("Video: {}", video.video_url);
        return Ok(());
    }

    let Some(stored) = media.get(&video.video_url) else {
        bail!("Video {} was already released", video.video_url);
    };
    tokio::fs::write(output, stored.bytes.as_slice())
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Video written to {} ({} bytes, {})",
        output.display(),
        stored.bytes.len(),
        stored.content_type
    );
    Ok(())
}
