use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use tracing::{debug, error, info};

use crate::assets::{AssetRef, FRAME_HEIGHT, FRAME_WIDTH};
use crate::error::{PipelineError, Result};
use crate::timing::allocate;
use crate::utils::remove_stale;

pub const FRAME_RATE: u32 = 30;

#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    pub success: bool,
    pub diagnostics: String,
}

/// The external audio/video engine, invoked with a full argument list.
pub trait Transcoder: Send + Sync {
    fn run(&self, args: &[String]) -> anyhow::Result<TranscodeOutput>;
}

pub struct Ffmpeg {
    binary: String,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Transcoder for Ffmpeg {
    fn run(&self, args: &[String]) -> anyhow::Result<TranscodeOutput> {
        debug!("{} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .with_context(|| format!("failed to spawn {}", self.binary))?;
        Ok(TranscodeOutput {
            success: output.status.success(),
            diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Writes a concat-demuxer list giving each asset its display duration.
///
/// The demuxer ignores the duration of the final entry unless the file is
/// listed once more, so the last asset is repeated.
pub fn write_display_list(
    assets: &[AssetRef],
    total: f64,
    list_path: &Path,
) -> Result<Vec<(PathBuf, f64)>> {
    let slices = allocate(total, assets.len())?;
    let mut entries = Vec::with_capacity(assets.len());
    let mut body = String::new();
    for (asset, slice) in assets.iter().zip(&slices) {
        let path = absolute(&asset.path)?;
        body.push_str(&format!("file '{}'\n", escape_concat_path(&path)));
        body.push_str(&format!("duration {:.3}\n", slice.duration()));
        entries.push((path, slice.duration()));
    }
    if let Some((last, _)) = entries.last() {
        body.push_str(&format!("file '{}'\n", escape_concat_path(last)));
    }
    fs::write(list_path, body)?;
    Ok(entries)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

/// Renders the assets over the narration into one 1080x1920, 30 fps video.
/// Output stops at whichever of audio and images ends first.
pub fn compose(
    transcoder: &dyn Transcoder,
    assets: &[AssetRef],
    audio: &Path,
    total: f64,
    output: &Path,
) -> Result<()> {
    if assets.is_empty() {
        return Err(PipelineError::InvalidInput(
            "composition needs at least one asset".to_string(),
        ));
    }
    let list_path = output
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("display_list.txt");
    let entries = write_display_list(assets, total, &list_path)?;
    info!(
        "Composing {} images over {:.2}s of narration into {}",
        entries.len(),
        total,
        output.display()
    );

    let filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}",
        w = FRAME_WIDTH,
        h = FRAME_HEIGHT,
        fps = FRAME_RATE
    );
    remove_stale(output)?;
    let args: Vec<String> = vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_path.to_string_lossy().into_owned(),
        "-i".into(),
        audio.to_string_lossy().into_owned(),
        "-vf".into(),
        filter,
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-r".into(),
        FRAME_RATE.to_string(),
        "-c:a".into(),
        "aac".into(),
        "-shortest".into(),
        output.to_string_lossy().into_owned(),
    ];

    let result = transcoder
        .run(&args)
        .map_err(|e| PipelineError::Composition(format!("{:#}", e)))?;
    if !result.success {
        error!("ffmpeg failed to produce final video");
        return Err(PipelineError::Composition(result.diagnostics));
    }
    if !output.exists() {
        return Err(PipelineError::Composition(format!(
            "engine reported success but {} is missing: {}",
            output.display(),
            result.diagnostics
        )));
    }
    info!("Final video written to {}", output.display());
    Ok(())
}

/// Grabs a single frame near the start of the video as a JPEG.
pub fn extract_thumbnail(
    transcoder: &dyn Transcoder,
    video: &Path,
    total: f64,
    output: &Path,
) -> Result<()> {
    let at = (total / 2.0).min(1.0);
    remove_stale(output)?;
    let args: Vec<String> = vec![
        "-y".into(),
        "-ss".into(),
        format!("{:.3}", at),
        "-i".into(),
        video.to_string_lossy().into_owned(),
        "-frames:v".into(),
        "1".into(),
        "-q:v".into(),
        "2".into(),
        output.to_string_lossy().into_owned(),
    ];
    let result = transcoder
        .run(&args)
        .map_err(|e| PipelineError::Thumbnail(format!("{:#}", e)))?;
    if !result.success || !output.exists() {
        return Err(PipelineError::Thumbnail(result.diagnostics));
    }
    info!("Thumbnail written to {}", output.display());
    Ok(())
}
