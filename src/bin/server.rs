//! Avatar backend server binary.
//!
//! Resolves credentials once at startup, wires the pipeline services
//! together, and serves the HTTP API until Ctrl-C.

use clap::Parser;
use mitra::cache::ResponseCache;
use mitra::credentials::GoogleCredentials;
use mitra::dialogue::DialogueGenerator;
use mitra::lipsync::LipSyncExtractor;
use mitra::server::{AppState, router};
use mitra::stt::SpeechRecognizer;
use mitra::sync::ResponseSynchronizer;
use mitra::tts::TtsRouter;
use mitra::MitraConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Mitra: conversational digital-human backend.
#[derive(Parser)]
#[command(name = "mitra-server", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Suppress noisy dependency logs by default; RUST_LOG overrides.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mitra=info,hyper=warn,reqwest=warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        MitraConfig::load(path)?
    } else {
        MitraConfig::default()
    };

    let gemini_key = config
        .dialogue
        .api_key
        .resolve()?
        .ok_or_else(|| anyhow::anyhow!("no Gemini API key configured (set GEMINI_API_KEY)"))?;
    let pexels_key = config.dialogue.pexels_api_key.resolve()?;
    let google = GoogleCredentials::from_env(&config.google_token)?;

    let dialogue = Arc::new(DialogueGenerator::new(
        &config.dialogue,
        gemini_key,
        pexels_key,
    ));
    let stt = Arc::new(SpeechRecognizer::new(&config.stt, google.clone()));
    let tts = TtsRouter::new(config.tts.clone(), google);
    let lipsync = LipSyncExtractor::new(&config.lipsync);
    let synchronizer = Arc::new(ResponseSynchronizer::new(tts, lipsync));
    let cache = ResponseCache::new(&config.cache);

    let cancel = CancellationToken::new();
    let sweeper = tokio::spawn(cache.clone().run_sweeper(cancel.clone()));

    let state = AppState {
        dialogue,
        stt,
        synchronizer,
        cache,
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("avatar backend listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    cancel.cancel();
    let _ = sweeper.await;
    Ok(())
}
