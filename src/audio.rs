use std::path::Path;
use std::process::Command;

use anyhow::Context;
use hound::WavReader;
use tracing::debug;

pub fn wav_duration_seconds(path: &Path) -> anyhow::Result<f64> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader.len();
    let frames = samples as f64 / spec.channels as f64;
    let duration = frames / spec.sample_rate as f64;
    Ok(duration)
}

/// Length of a narration file in seconds. WAV headers are read directly,
/// anything else goes through `ffprobe`.
pub fn narration_duration(path: &Path) -> anyhow::Result<f64> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        return wav_duration_seconds(path);
    }

    debug!("Probing duration of {} with ffprobe", path.display());
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .context("failed to spawn ffprobe")?;
    if !output.status.success() {
        anyhow::bail!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let text = String::from_utf8_lossy(&output.stdout);
    text.trim()
        .parse::<f64>()
        .with_context(|| format!("unexpected ffprobe output: {}", text.trim()))
}
