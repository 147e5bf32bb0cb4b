use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shortsgen::args::Args;
use shortsgen::assets::PexelsProvider;
use shortsgen::compose::Ffmpeg;
use shortsgen::config::{Config, NarrationConfig, PublishConfig};
use shortsgen::content::OpenAiGenerator;
use shortsgen::pipeline::{Orchestrator, PipelineSettings};
use shortsgen::publish::{LocalPublisher, Publisher, YouTubePublisher};
use shortsgen::tts::{ElevenLabsSynthesizer, NarrationSynthesizer, PiperSynthesizer};

fn build_orchestrator(config: Config) -> Orchestrator {
    let narrator: Box<dyn NarrationSynthesizer> = match config.narration {
        NarrationConfig::ElevenLabs { api_key, voice_id } => {
            Box::new(ElevenLabsSynthesizer::new(api_key, voice_id))
        }
        NarrationConfig::Piper { model } => Box::new(PiperSynthesizer::new(model)),
    };
    let publisher: Box<dyn Publisher> = match config.publish {
        PublishConfig::YouTube { access_token } => Box::new(YouTubePublisher::new(access_token)),
        PublishConfig::DryRun => Box::new(LocalPublisher),
    };
    let settings = PipelineSettings {
        workdir: config.workdir,
        max_assets: config.max_assets,
        fallback_duration: config.fallback_duration,
        privacy: config.privacy,
        category: config.category,
        text_direction: config.text_direction,
    };
    Orchestrator::new(
        settings,
        Box::new(OpenAiGenerator::new(
            config.openai_api_key,
            config.text_model,
            config.topic,
        )),
        narrator,
        Box::new(PexelsProvider::new(config.pexels_api_key)),
        Box::new(Ffmpeg::new(config.ffmpeg)),
        publisher,
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting short video generation pipeline");

    let args = Args::parse();
    let config = match Config::from_args(args) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    let workdir = config.workdir.clone();

    let result = build_orchestrator(config).run().await;

    if workdir.is_dir() {
        let result_path = workdir.join("result.json");
        std::fs::write(&result_path, serde_json::to_string_pretty(&result)?)?;
        info!("Run summary written to {}", result_path.display());
    }

    if result.success {
        if let Some(publication) = &result.publication {
            info!("Process complete: {}", publication.url);
        }
        Ok(())
    } else {
        error!(
            "Process failed: {}",
            result.failure_reason.as_deref().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }
}
