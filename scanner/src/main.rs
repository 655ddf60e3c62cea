use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use comment_scanner::{
    app_config::AppConfig,
    pipeline::{BatchRunner, PipelineController, ProgressHandle},
    prompt::{GroqClient, InsightSummarizer, LlmClassifier},
    rate_limiters::RateLimiters,
    report::RunReport,
    youtube::{parse_video_id, YoutubeClient},
};
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Classify a video's comments and summarize what viewers are confused about.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Video id or any YouTube watch / share / shorts URL
    video: String,

    /// Maximum number of comments to read
    #[arg(short, long)]
    limit: Option<usize>,

    /// Comments per classification request
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Path to the config file (defaults to config/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the full report as JSON to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the insight summary call
    #[arg(long)]
    no_insights: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let args = Args::parse();

    let mut cfg = AppConfig::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(limit) = args.limit {
        cfg.pipeline.max_comments = limit;
    }
    if let Some(batch_size) = args.batch_size {
        cfg.pipeline.batch_size = batch_size;
    }
    if args.no_insights {
        cfg.insights.enabled = false;
    }
    cfg.validate()?;
    tracing::debug!("{}", cfg);

    let video_id = parse_video_id(&args.video)
        .with_context(|| format!("Not a YouTube video id or URL: {}", args.video))?;
    let youtube_key = cfg
        .youtube
        .api_key
        .clone()
        .context("YOUTUBE_API_KEY is not set")?;
    let model_key = cfg
        .model
        .api_key
        .clone()
        .context("GROQ_API_KEY is not set")?;

    let http_client = reqwest::ClientBuilder::new().use_rustls_tls().build()?;
    let rate_limiters = RateLimiters::from_config(&cfg.rate_limits);

    let youtube = YoutubeClient::new(http_client.clone(), &cfg.youtube.api_base, &youtube_key);
    let groq = GroqClient::new(http_client, rate_limiters.clone(), &cfg.model, &model_key);

    let runner = BatchRunner::new(LlmClassifier::new(groq.clone()), cfg.retry_policy());
    let controller = PipelineController::new(
        youtube.comment_source(&video_id),
        runner,
        cfg.pipeline_settings(),
    );

    let watcher = tokio::spawn(log_progress(controller.subscribe(), rate_limiters));

    tracing::info!("Scanning comments of video {}", video_id);
    let outcome = controller.run().await?;
    if let Err(e) = watcher.await {
        tracing::warn!("Progress watcher stopped: {}", e);
    }

    let insights = if cfg.insights.enabled {
        InsightSummarizer::new(groq, cfg.insights.max_doubts, cfg.insights.max_faqs)
            .summarize(&outcome.comments)
            .await
    } else {
        None
    };
    let video = youtube.get_video_meta(&video_id).await;

    let report = RunReport::build(
        &video_id,
        video,
        outcome.comments,
        insights,
        outcome.failure.as_ref(),
    );

    println!("{}", report.summary_table());
    if let Some(insights) = &report.insights {
        if let Some(topic) = &insights.lead_topic_suggestion {
            println!("Next video: {}", topic);
        }
        if let Some(rationale) = &insights.rationale {
            println!("Why: {}", rationale);
        }
    }
    let markdown = report.description_markdown();
    if !markdown.is_empty() {
        println!("\n{}", markdown);
    }

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    match outcome.failure {
        Some(failure) if failure.is_fatal() => {
            Err(anyhow::Error::new(failure).context("Scan stopped before the limit"))
        }
        _ => Ok(()),
    }
}

async fn log_progress(mut progress: ProgressHandle, rate_limiters: RateLimiters) {
    while let Some(snapshot) = progress.changed().await {
        tracing::info!("{} ({:.0}%)", snapshot, snapshot.ratio() * 100.0);
        tracing::debug!("Rate limiter {}", rate_limiters.get_status());
        if snapshot.phase.is_terminal() {
            break;
        }
    }
}
