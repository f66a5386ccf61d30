//! Append-only JSONL log of feedback events.

use crate::outcome::FeedbackEvent;
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const FEEDBACK_LOG_FILE: &str = "feedback.jsonl";

#[must_use]
pub fn feedback_log_path(dir: &Path) -> PathBuf {
    dir.join(FEEDBACK_LOG_FILE)
}

/// Append one event to `<dir>/feedback.jsonl`.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn append_feedback_event(dir: &Path, event: &FeedbackEvent) -> Result<()> {
    let log_path = feedback_log_path(dir);

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    serde_json::to_writer(&mut file, event)
        .with_context(|| format!("failed to serialize feedback to {}", log_path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to append newline to {}", log_path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush {}", log_path.display()))?;

    Ok(())
}

/// Load every event from `<dir>/feedback.jsonl`; a missing log is empty.
///
/// # Errors
///
/// Returns an error naming the offending line if a line fails to parse.
pub fn load_feedback_events(dir: &Path) -> Result<Vec<FeedbackEvent>> {
    let log_path = feedback_log_path(dir);
    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let file = fs::File::open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;
    let reader = BufReader::new(file);

    let mut events = Vec::new();
    for (line_no, line_result) in reader.lines().enumerate() {
        let line = line_result.with_context(|| {
            format!("failed reading line {} in {}", line_no + 1, log_path.display())
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let event: FeedbackEvent = serde_json::from_str(&line).with_context(|| {
            format!(
                "failed parsing feedback event at {}:{}",
                log_path.display(),
                line_no + 1
            )
        })?;
        events.push(event);
    }

    Ok(events)
}
