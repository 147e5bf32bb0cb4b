use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

const ELEVENLABS_TTS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const ELEVENLABS_MODEL: &str = "eleven_multilingual_v2";

/// Turns narration text into an audio file.
#[async_trait]
pub trait NarrationSynthesizer: Send + Sync {
    /// Where this voice writes its narration inside `dest_dir`.
    fn output_path(&self, dest_dir: &Path) -> PathBuf;

    async fn synthesize(&self, text: &str, out_path: &Path) -> anyhow::Result<()>;
}

pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    api_key: String,
    voice_id: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(api_key: String, voice_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            voice_id,
        }
    }
}

#[async_trait]
impl NarrationSynthesizer for ElevenLabsSynthesizer {
    fn output_path(&self, dest_dir: &Path) -> PathBuf {
        dest_dir.join("narration.mp3")
    }

    async fn synthesize(&self, text: &str, out_path: &Path) -> anyhow::Result<()> {
        info!("Requesting ElevenLabs narration ({} chars)", text.chars().count());
        let bytes = self
            .client
            .post(format!("{}/{}", ELEVENLABS_TTS_URL, self.voice_id))
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&json!({ "text": text, "model_id": ELEVENLABS_MODEL }))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        if bytes.is_empty() {
            anyhow::bail!("ElevenLabs returned an empty audio body");
        }
        tokio::fs::write(out_path, &bytes)
            .await
            .with_context(|| format!("writing {}", out_path.display()))?;
        info!("Narration written to {}", out_path.display());
        Ok(())
    }
}

/// Local Piper voice; the voice identity is the `.onnx` model path.
pub struct PiperSynthesizer {
    model: String,
}

impl PiperSynthesizer {
    pub fn new(model: String) -> Self {
        Self { model }
    }
}

#[async_trait]
impl NarrationSynthesizer for PiperSynthesizer {
    fn output_path(&self, dest_dir: &Path) -> PathBuf {
        dest_dir.join("narration.wav")
    }

    async fn synthesize(&self, text: &str, out_path: &Path) -> anyhow::Result<()> {
        info!("Calling Piper TTS for output file {}", out_path.display());

        let mut child = Command::new("piper")
            .args(["--model", self.model.as_str(), "--output_file"])
            .arg(out_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn piper process")?;

        {
            let stdin = child.stdin.as_mut().context("failed to open piper stdin")?;
            stdin.write_all(text.as_bytes())?;
        }

        let status = child.wait()?;
        if !status.success() {
            error!("Piper TTS command failed for {}", out_path.display());
            anyhow::bail!("piper exited with {}", status);
        }
        Ok(())
    }
}
