use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TtsEngine {
    #[default]
    Elevenlabs,
    Piper,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PrivacyArg {
    Public,
    Unlisted,
    #[default]
    Private,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    #[default]
    Ltr,
    Rtl,
}

#[derive(Parser, Debug)]
#[clap(about = "Generate, assemble and publish a short narrated video")]
pub struct Args {
    /// Subject for the script; the generator picks one when omitted.
    #[clap(long)]
    pub topic: Option<String>,

    #[clap(long, default_value = "./output")]
    pub workdir: PathBuf,

    #[clap(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub max_assets: u8,

    /// Used when the narration length cannot be measured.
    #[clap(long, default_value_t = 35.0)]
    pub fallback_duration: f64,

    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[clap(long, default_value = "gpt-4o-mini")]
    pub text_model: String,

    #[clap(long, value_enum, default_value_t = TtsEngine::Elevenlabs)]
    pub tts_engine: TtsEngine,

    #[clap(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    pub elevenlabs_api_key: Option<String>,

    #[clap(long, env = "ELEVENLABS_VOICE_ID")]
    pub voice_id: Option<String>,

    #[clap(long, default_value = "./tts/en_US-hfc_male-medium.onnx")]
    pub piper_model: String,

    #[clap(long, env = "PEXELS_API_KEY", hide_env_values = true)]
    pub pexels_api_key: Option<String>,

    #[clap(long, env = "YOUTUBE_ACCESS_TOKEN", hide_env_values = true)]
    pub youtube_access_token: Option<String>,

    #[clap(long, value_enum, default_value_t = PrivacyArg::Private)]
    pub privacy: PrivacyArg,

    /// YouTube category id.
    #[clap(long, default_value = "22")]
    pub category: String,

    #[clap(long, value_enum, default_value_t = DirectionArg::Ltr)]
    pub text_direction: DirectionArg,

    #[clap(long, default_value = "ffmpeg")]
    pub ffmpeg: String,

    /// Write publish metadata locally instead of uploading.
    #[clap(long)]
    pub dry_run: bool,
}
