use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::timing::allocate;
use crate::utils::{normalize_whitespace, split_sentences};

const RLM: char = '\u{200F}';

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleCue {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Script direction used when rendering cue text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

/// One cue per sentence of `script`, each taking an equal share of `total`.
pub fn build_cues(script: &str, total: f64) -> Result<Vec<SubtitleCue>> {
    let segments = split_sentences(script);
    if segments.is_empty() {
        return Err(PipelineError::EmptyScript);
    }
    let slices = allocate(total, segments.len())?;
    Ok(segments
        .into_iter()
        .zip(slices)
        .map(|(text, slice)| SubtitleCue {
            index: slice.index + 1,
            start: slice.start,
            end: slice.end,
            text: normalize_whitespace(&text),
        })
        .collect())
}

pub fn render_srt(cues: &[SubtitleCue], direction: TextDirection) -> String {
    let mut out = String::new();
    for cue in cues {
        out.push_str(&format!("{}\n", cue.index));
        out.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(cue.start),
            format_srt_time(cue.end)
        ));
        for line in cue.text.lines() {
            if direction == TextDirection::Rtl {
                out.push(RLM);
            }
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

pub fn write_srt(path: &Path, cues: &[SubtitleCue], direction: TextDirection) -> Result<()> {
    fs::write(path, render_srt(cues, direction))?;
    Ok(())
}

fn timing_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{2,}:\d{2}:\d{2},\d{3})\s+-->\s+(\d{2,}:\d{2}:\d{2},\d{3})$")
            .expect("static regex")
    })
}

/// Parses SRT text back into cues. Blocks are separated by blank lines;
/// a leading right-to-left mark on text lines is dropped.
pub fn parse_srt(input: &str) -> Result<Vec<SubtitleCue>> {
    let normalized = input.replace("\r\n", "\n");
    let mut cues = Vec::new();
    for block in normalized.split("\n\n") {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty());
        let Some(index_line) = lines.next() else {
            continue;
        };
        let index: usize = index_line.trim().parse().map_err(|_| {
            PipelineError::InvalidInput(format!("bad cue index: {}", index_line))
        })?;
        let timing = lines.next().ok_or_else(|| {
            PipelineError::InvalidInput(format!("cue {} has no timing line", index))
        })?;
        let caps = timing_line().captures(timing.trim()).ok_or_else(|| {
            PipelineError::InvalidInput(format!("bad timing line: {}", timing))
        })?;
        let start = parse_srt_time(&caps[1])?;
        let end = parse_srt_time(&caps[2])?;
        let text = lines
            .map(|l| l.trim_start_matches(RLM))
            .collect::<Vec<_>>()
            .join("\n");
        cues.push(SubtitleCue {
            index,
            start,
            end,
            text,
        });
    }
    Ok(cues)
}

pub fn read_srt(path: &Path) -> Result<Vec<SubtitleCue>> {
    parse_srt(&fs::read_to_string(path)?)
}

pub fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let s = total_sec % 60;
    let total_min = total_sec / 60;
    let m = total_min % 60;
    let h = total_min / 60;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

fn parse_srt_time(stamp: &str) -> Result<f64> {
    let bad = || PipelineError::InvalidInput(format!("bad timestamp: {}", stamp));
    let (hms, ms) = stamp.split_once(',').ok_or_else(bad)?;
    let parts: Vec<u64> = hms
        .split(':')
        .map(|p| p.parse::<u64>().map_err(|_| bad()))
        .collect::<Result<_>>()?;
    let [h, m, s] = parts[..] else {
        return Err(bad());
    };
    let ms: u64 = ms.parse().map_err(|_| bad())?;
    let total_ms = ((h * 60 + m) * 60 + s) * 1000 + ms;
    Ok(total_ms as f64 / 1000.0)
}
