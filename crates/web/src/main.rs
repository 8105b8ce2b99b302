//! Web front end for narrating PowerPoint presentations.

mod render;
mod routes;

use anyhow::{Context, Result};
use clap::Parser;
use narrator_core::config::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use narrator_core::{NarratorConfig, Pipeline};
use narrator_pptx::PptxParser;
use narrator_remote::{anthropic, google_tts, AnthropicConnector, GoogleTts};
use routes::AppState;
use std::path::PathBuf;
use std::sync::Arc;

/// Serve the narration assistant in the browser.
#[derive(Parser, Debug)]
#[command(name = "narrate-web")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "NARRATOR_BIND", default_value = "127.0.0.1:8501")]
    bind: String,

    /// Model used to write the scripts
    #[arg(short, long, env = "NARRATOR_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Maximum tokens per generated script
    #[arg(long, env = "NARRATOR_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Directory for temporary files (default: system temp directory)
    #[arg(long, env = "NARRATOR_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Anthropic API base URL
    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = anthropic::DEFAULT_BASE_URL)]
    anthropic_url: String,

    /// Text-to-speech base URL
    #[arg(long, env = "NARRATOR_TTS_URL", default_value = google_tts::DEFAULT_BASE_URL)]
    tts_url: String,

    /// Largest accepted upload, in megabytes
    #[arg(long, default_value_t = 200)]
    max_upload_mb: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;

    let mut config = NarratorConfig::new()
        .with_model(args.model.as_str())
        .with_max_tokens(args.max_tokens);
    if let Some(dir) = &args.temp_dir {
        config = config.with_temp_dir(dir);
    }

    // The blocking reqwest client must not be built inside the async runtime.
    let tts_url = args.tts_url.clone();
    let tts = tokio::task::spawn_blocking(move || GoogleTts::new().map(|t| t.with_base_url(tts_url)))
        .await?
        .context("Failed to set up the text-to-speech client")?;

    let pipeline = Pipeline::new(
        PptxParser::new(),
        AnthropicConnector::new(args.anthropic_url.as_str()),
        tts,
        config,
    );
    let pipeline: Arc<routes::NarrationPipeline> = Arc::new(pipeline);
    let state = AppState {
        pipeline: Arc::clone(&pipeline),
    };
    let app = routes::router(state, args.max_upload_mb.saturating_mul(1024 * 1024));

    log::info!("Listening on http://{}", args.bind);

    let served = axum::serve(listener, app).await;
    release(pipeline).await;
    served.context("Server error")?;
    Ok(())
}

/// Drop `shared` on a blocking thread.
///
/// The pipeline's HTTP clients join their own runtime thread when dropped,
/// which must not happen on an async worker.
async fn release<T: Send + Sync + 'static>(shared: Arc<T>) {
    if let Err(e) = tokio::task::spawn_blocking(move || drop(shared)).await {
        log::warn!("Failed to release the pipeline: {}", e);
    }
}
