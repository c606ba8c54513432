//! Command-line Conversation Analyzer
//!
//! Pipes the `label: text` conversation to an external analysis command
//! (typically a wrapper around a language model) and reads back:
//! ```json
//! {"detections": [
//!   {"speaker_label": "A", "detected_name": "Alice", "confidence": 0.95,
//!    "evidence": ["Hello everyone, this is Alice"]}
//! ]}
//! ```
//! Model output is often wrapped in a markdown code fence; the fence is
//! stripped before parsing. Detections without a name or with zero
//! confidence carry no information and are dropped.

use crate::types::{Conversation, ConversationAnalyzer, NameDetection, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    #[serde(default)]
    detections: Vec<RawDetection>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    speaker_label: String,
    #[serde(default)]
    detected_name: Option<String>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    evidence: Vec<String>,
}

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence if present
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (e.g. "json") on the opening line
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse analyzer output into name detections
pub fn parse_detections(output: &str) -> Result<Vec<NameDetection>, ProviderError> {
    let body = strip_code_fence(output);
    let response: AnalysisResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("Failed to parse analysis response: {}", e)))?;

    Ok(response
        .detections
        .into_iter()
        .filter_map(|d| {
            let name = d.detected_name?.trim().to_string();
            if name.is_empty() || d.confidence <= 0.0 {
                return None;
            }
            Some(NameDetection {
                label: d.speaker_label,
                candidate_name: name,
                confidence: d.confidence,
                evidence_quotes: d.evidence,
            })
        })
        .collect())
}

/// Conversation analyzer backed by an external command
pub struct CommandAnalyzer {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandAnalyzer {
    /// `model` only feeds the analyzer identity (and therefore the cache key)
    pub fn new(program: impl Into<String>, args: Vec<String>, model: Option<&str>) -> Self {
        let program = program.into();
        let name = match model {
            Some(model) => format!("command:{}:{}", program, model),
            None => format!("command:{}", program),
        };
        Self {
            name,
            program,
            args,
        }
    }
}

#[async_trait]
impl ConversationAnalyzer for CommandAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, conversation: &Conversation) -> Result<Vec<NameDetection>, ProviderError> {
        debug!(
            program = %self.program,
            source = %conversation.source,
            labels = conversation.labels.len(),
            "Running conversation analyzer"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ProviderError::Unavailable(format!("{} not installed", self.program))
                }
                _ => ProviderError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(conversation.text.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_detections(&String::from_utf8_lossy(&output.stdout))
    }
}
