use std::path::PathBuf;

use crate::args::{Args, DirectionArg, PrivacyArg, TtsEngine};
use crate::error::{PipelineError, Result};
use crate::publish::Privacy;
use crate::subtitle::TextDirection;

#[derive(Debug, Clone, PartialEq)]
pub enum NarrationConfig {
    ElevenLabs { api_key: String, voice_id: String },
    Piper { model: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishConfig {
    YouTube { access_token: String },
    DryRun,
}

/// Everything a run needs, checked once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub topic: Option<String>,
    pub workdir: PathBuf,
    pub max_assets: usize,
    pub fallback_duration: f64,
    pub openai_api_key: String,
    pub text_model: String,
    pub narration: NarrationConfig,
    pub pexels_api_key: String,
    pub publish: PublishConfig,
    pub privacy: Privacy,
    pub category: String,
    pub text_direction: TextDirection,
    pub ffmpeg: String,
}

impl From<PrivacyArg> for Privacy {
    fn from(arg: PrivacyArg) -> Self {
        match arg {
            PrivacyArg::Public => Privacy::Public,
            PrivacyArg::Unlisted => Privacy::Unlisted,
            PrivacyArg::Private => Privacy::Private,
        }
    }
}

impl From<DirectionArg> for TextDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Ltr => TextDirection::Ltr,
            DirectionArg::Rtl => TextDirection::Rtl,
        }
    }
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PipelineError::Config(format!("{} is required", what)))
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self> {
        if !args.fallback_duration.is_finite() || args.fallback_duration <= 0.0 {
            return Err(PipelineError::Config(format!(
                "--fallback-duration must be positive, got {}",
                args.fallback_duration
            )));
        }

        let openai_api_key = required(args.openai_api_key, "OPENAI_API_KEY (--openai-api-key)")?;
        let pexels_api_key = required(args.pexels_api_key, "PEXELS_API_KEY (--pexels-api-key)")?;

        let narration = match args.tts_engine {
            TtsEngine::Elevenlabs => NarrationConfig::ElevenLabs {
                api_key: required(
                    args.elevenlabs_api_key,
                    "ELEVENLABS_API_KEY (--elevenlabs-api-key)",
                )?,
                voice_id: required(args.voice_id, "ELEVENLABS_VOICE_ID (--voice-id)")?,
            },
            TtsEngine::Piper => NarrationConfig::Piper {
                model: required(Some(args.piper_model), "--piper-model")?,
            },
        };

        let publish = if args.dry_run {
            PublishConfig::DryRun
        } else {
            PublishConfig::YouTube {
                access_token: required(
                    args.youtube_access_token,
                    "YOUTUBE_ACCESS_TOKEN (--youtube-access-token, or pass --dry-run)",
                )?,
            }
        };

        Ok(Self {
            topic: args.topic.filter(|t| !t.trim().is_empty()),
            workdir: args.workdir,
            max_assets: args.max_assets as usize,
            fallback_duration: args.fallback_duration,
            openai_api_key,
            text_model: args.text_model,
            narration,
            pexels_api_key,
            publish,
            privacy: args.privacy.into(),
            category: args.category,
            text_direction: args.text_direction.into(),
            ffmpeg: args.ffmpeg,
        })
    }
}
