use std::io::ErrorKind;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

fn sentence_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?…؟]+").expect("static regex"))
}

/// Splits text on runs of sentence-terminal punctuation. Fragments are
/// trimmed, the punctuation itself is dropped, and empty fragments are skipped.
pub fn split_sentences(text: &str) -> Vec<String> {
    sentence_break()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Collapses all whitespace runs (including newlines) into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deletes a leftover output file so a later existence check only sees
/// what the current run produced. A missing file is fine.
pub fn remove_stale(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
