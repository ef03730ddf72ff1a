// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Small helpers shared by the overlay loop and the CLI.

use std::path::{Path, PathBuf};

use crate::results::Detection;

/// Simple pluralization for common COCO class names.
#[must_use]
pub fn pluralize(word: &str) -> String {
    match word {
        "person" => "persons".to_string(),
        "bus" => "buses".to_string(),
        "knife" => "knives".to_string(),
        "mouse" => "mice".to_string(),
        "sheep" => "sheep".to_string(),
        "skis" => "skis".to_string(),
        _ => {
            if word.ends_with('s') || word.ends_with("ch") || word.ends_with("sh") {
                format!("{word}es")
            } else if word.ends_with('y') && !word.ends_with("ey") && !word.ends_with("ay") {
                format!("{}ies", &word[..word.len() - 1])
            } else {
                format!("{word}s")
            }
        }
    }
}

/// Count detections per label, e.g. `"2 persons, 1 dog"`.
///
/// Labels appear in the order they were first detected. Empty input gives an empty string.
#[must_use]
pub fn summarize_detections(detections: &[Detection]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for d in detections {
        match counts.iter_mut().find(|(label, _)| *label == d.label) {
            Some((_, n)) => *n += 1,
            None => counts.push((d.label.as_str(), 1)),
        }
    }

    counts
        .iter()
        .map(|&(label, count)| {
            let name = if count > 1 {
                pluralize(label)
            } else {
                label.to_string()
            };
            format!("{count} {name}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Find the next free run directory: `base/prefix`, then `base/prefix2`, `base/prefix3`...
#[must_use]
pub fn find_next_run_dir(base: impl AsRef<Path>, prefix: &str) -> PathBuf {
    let base = base.as_ref();

    let first = base.join(prefix);
    if !first.exists() {
        return first;
    }

    (2..)
        .map(|i| base.join(format!("{prefix}{i}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}
