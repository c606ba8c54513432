//! Transcript parsing
//!
//! Supports the two diarized transcript formats produced upstream:
//! - **AssemblyAI:** `utterances[]` with `speaker`, `start`/`end` in milliseconds, `text`
//! - **Speechmatics:** `results[]` word items with `start_time`/`end_time` in
//!   seconds and a speaker on the item or its first alternative
//!
//! A transcript that is not JSON, is in neither format, or contains no
//! speakers is fatal for the whole run: labels cannot be segmented without it.

use crate::error::{AssignError, AssignResult};
use crate::types::{Conversation, Label};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Speaker label used by Speechmatics for unidentified words
pub const UNKNOWN_SPEAKER: &str = "UU";

/// Drop segments shorter than this when building audio spans (seconds)
pub const DEFAULT_MIN_SEGMENT: f64 = 0.5;

/// Merge segments separated by at most this gap (seconds)
pub const DEFAULT_MAX_GAP: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptFormat {
    AssemblyAi,
    Speechmatics,
}

/// One contiguous stretch of speech by one label
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub label: Label,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Parsed transcript
#[derive(Debug, Clone)]
pub struct Transcript {
    path: PathBuf,
    format: TranscriptFormat,
    utterances: Vec<Utterance>,
}

fn invalid(path: &Path, reason: impl Into<String>) -> AssignError {
    AssignError::Transcript {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn detect_format(data: &Value) -> Option<TranscriptFormat> {
    if data.get("utterances").map(Value::is_array).unwrap_or(false) {
        return Some(TranscriptFormat::AssemblyAi);
    }

    let results = data.get("results")?.as_array()?;
    match results.first() {
        // An empty results array is still recognizably Speechmatics
        None => Some(TranscriptFormat::Speechmatics),
        Some(first) => {
            let looks_like_word = first.get("alternatives").is_some()
                || first.get("start_time").is_some()
                || matches!(
                    first.get("type").and_then(Value::as_str),
                    Some("word") | Some("punctuation")
                );
            looks_like_word.then_some(TranscriptFormat::Speechmatics)
        }
    }
}

fn parse_assemblyai(data: &Value) -> Vec<Utterance> {
    let Some(utterances) = data.get("utterances").and_then(Value::as_array) else {
        return vec![];
    };

    utterances
        .iter()
        .filter_map(|utt| {
            let label = utt.get("speaker").and_then(speaker_string)?;
            let start = utt.get("start").and_then(Value::as_f64).unwrap_or(0.0) / 1000.0;
            let end = utt.get("end").and_then(Value::as_f64).unwrap_or(0.0) / 1000.0;
            let text = utt
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(Utterance {
                label,
                start,
                end,
                text,
            })
        })
        .collect()
}

/// Speaker fields are usually strings, occasionally integers
fn speaker_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_speechmatics(data: &Value) -> Vec<Utterance> {
    let Some(results) = data.get("results").and_then(Value::as_array) else {
        return vec![];
    };

    let mut utterances: Vec<Utterance> = Vec::new();

    for item in results {
        // Items without a type are treated as words; punctuation is skipped
        if let Some(kind) = item.get("type").and_then(Value::as_str) {
            if kind != "word" {
                continue;
            }
        }

        let first_alt = item
            .get("alternatives")
            .and_then(Value::as_array)
            .and_then(|alts| alts.first());

        let speaker = item
            .get("speaker")
            .and_then(speaker_string)
            .or_else(|| first_alt.and_then(|alt| alt.get("speaker")).and_then(speaker_string))
            .unwrap_or_else(|| UNKNOWN_SPEAKER.to_string());
        let content = first_alt
            .and_then(|alt| alt.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let start = item.get("start_time").and_then(Value::as_f64).unwrap_or(0.0);
        let end = item.get("end_time").and_then(Value::as_f64).unwrap_or(0.0);

        match utterances.last_mut() {
            Some(current) if current.label == speaker => {
                current.end = end;
                if !content.is_empty() {
                    if !current.text.is_empty() {
                        current.text.push(' ');
                    }
                    current.text.push_str(content);
                }
            }
            _ => utterances.push(Utterance {
                label: speaker,
                start,
                end,
                text: content.to_string(),
            }),
        }
    }

    utterances
}

impl Transcript {
    /// Load and parse a transcript file
    pub fn load(path: &Path) -> AssignResult<Self> {
        if !path.exists() {
            return Err(AssignError::NotFound(format!(
                "Transcript not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(path, &content)
    }

    /// Parse transcript JSON; `path` is only used for naming and errors
    pub fn from_json_str(path: &Path, content: &str) -> AssignResult<Self> {
        let data: Value = serde_json::from_str(content)
            .map_err(|e| invalid(path, format!("not valid JSON: {}", e)))?;

        let format = detect_format(&data).ok_or_else(|| {
            invalid(
                path,
                "unknown transcript format (expected AssemblyAI or Speechmatics JSON)",
            )
        })?;

        let utterances = match format {
            TranscriptFormat::AssemblyAi => parse_assemblyai(&data),
            TranscriptFormat::Speechmatics => parse_speechmatics(&data),
        };

        if utterances.is_empty() {
            return Err(invalid(path, "No speakers found in transcript"));
        }

        Ok(Self {
            path: path.to_path_buf(),
            format,
            utterances,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Short source name (file name) used in provenance
    pub fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn format(&self) -> TranscriptFormat {
        self.format
    }

    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    /// Sorted unique speaker labels
    pub fn labels(&self) -> Vec<Label> {
        self.utterances
            .iter()
            .map(|u| u.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Raw (start, end) spans for one label, in transcript order
    pub fn segments(&self, label: &str) -> Vec<(f64, f64)> {
        self.utterances
            .iter()
            .filter(|u| u.label == label)
            .map(|u| (u.start, u.end))
            .collect()
    }

    /// Spans for one label with short segments dropped and close ones merged
    pub fn merged_segments(&self, label: &str, min_duration: f64, max_gap: f64) -> Vec<(f64, f64)> {
        let mut merged: Vec<(f64, f64)> = Vec::new();
        for (start, end) in self.segments(label) {
            if end - start < min_duration {
                continue;
            }
            match merged.last_mut() {
                Some(last) if start - last.1 <= max_gap => last.1 = end,
                _ => merged.push((start, end)),
            }
        }
        merged
    }

    /// `label: text` lines for conversation analysis
    pub fn conversation_text(&self) -> String {
        self.utterances
            .iter()
            .filter(|u| !u.text.is_empty())
            .map(|u| format!("{}: {}", u.label, u.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn conversation(&self) -> Conversation {
        Conversation {
            source: self.source_name(),
            text: self.conversation_text(),
            labels: self.labels(),
        }
    }
}
