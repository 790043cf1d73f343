//! Topic-to-video pipeline binary.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vforge_media::FfmpegAssembler;
use vforge_pipeline::{Collaborators, PipelineConfig, PipelineOrchestrator, SpeechSynthesizer};
use vforge_services::{
    ElevenLabsSynthesizer, GeminiClient, GeminiScriptGenerator, GettyFootageFinder,
    GttsSynthesizer, ManimAnimationRenderer,
};

/// Generate a narrated, illustrated video for a topic.
#[derive(Debug, Parser)]
#[command(name = "videoforge", version, about)]
struct Cli {
    /// Topic to generate a video about.
    topic: String,

    /// Output filename (under the configured output directory).
    #[arg(short, long)]
    output: Option<String>,

    /// Write the run report (transitions, warnings, timings) as JSON.
    #[arg(long, value_name = "PATH")]
    report: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vforge=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let cli = Cli::parse();
    info!(topic = %cli.topic, "Starting videoforge");

    let config = PipelineConfig::from_env();

    let gemini = match GeminiClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            error!("Gemini configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // ElevenLabs narration when a key is configured, otherwise free TTS.
    let (speech, speech_fallback): (
        Arc<dyn SpeechSynthesizer>,
        Option<Arc<dyn SpeechSynthesizer>>,
    ) = match ElevenLabsSynthesizer::from_env() {
        Ok(eleven) => (
            Arc::new(eleven),
            Some(Arc::new(GttsSynthesizer::new()) as Arc<dyn SpeechSynthesizer>),
        ),
        Err(e) => {
            warn!("ElevenLabs unavailable ({}), narrating with gTTS", e);
            (Arc::new(GttsSynthesizer::new()), None)
        }
    };

    let collaborators = Collaborators {
        script: Arc::new(GeminiScriptGenerator::new(gemini.clone())),
        speech,
        speech_fallback,
        footage: Arc::new(GettyFootageFinder::new(gemini.clone())),
        animation: Arc::new(ManimAnimationRenderer::new(gemini)),
        assembler: Arc::new(FfmpegAssembler::new()),
    };

    let orchestrator = PipelineOrchestrator::new(config, collaborators);

    // Log state changes as the run advances.
    let mut status = orchestrator.subscribe();
    let watcher = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let snapshot = status.borrow().clone();
            info!(run_id = %snapshot.run_id, state = %snapshot.state, "Run state");
        }
    });

    let result = orchestrator.run(&cli.topic, cli.output).await;
    watcher.abort();

    match result {
        Ok(artifact) => {
            info!(
                output = %artifact.output.display(),
                scenes = artifact.total_scenes,
                duration_secs = artifact.total_duration_secs,
                warnings = artifact.warnings.len(),
                "Video generated"
            );
            for warning in &artifact.warnings {
                warn!(
                    scene = warning.scene_index,
                    stage = %warning.stage,
                    "Degraded: {}",
                    warning.message
                );
            }

            if let Some(report_path) = cli.report {
                match serde_json::to_string_pretty(&artifact) {
                    Ok(json) => {
                        if let Err(e) = tokio::fs::write(&report_path, json).await {
                            error!("Failed to write report {}: {}", report_path.display(), e);
                        } else {
                            info!(report = %report_path.display(), "Run report written");
                        }
                    }
                    Err(e) => error!("Failed to serialize report: {}", e),
                }
            }

            println!("{}", artifact.output.display());
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            std::process::exit(1);
        }
    }
}
