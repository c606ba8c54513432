//! Command-line Voice Identifier
//!
//! Runs an external identification command and reads its matches. The
//! command receives a JSON request on stdin:
//! ```json
//! {"audio_path": "...", "label": "S1", "segments": [[1.0, 5.0]], "tags": ["team"]}
//! ```
//! and prints a JSON array on stdout:
//! ```json
//! [{"speaker_id": "alice", "similarity": 0.91, "trust_level": "high"}]
//! ```
//! `trust_level` may be omitted in favour of sample review counts
//! (`reviewed`, `unreviewed`, `rejected`), from which trust is derived.
//!
//! A missing binary is `ProviderError::Unavailable`; the collector treats it
//! like any other absent source.

use crate::types::{AudioSpan, BiometricMatch, ProviderError, TrustLevel, VoiceIdentifier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Serialize)]
struct IdentifyRequest<'a> {
    audio_path: &'a Path,
    label: &'a str,
    segments: &'a [(f64, f64)],
    tags: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    speaker_id: String,
    similarity: f64,
    #[serde(default)]
    trust_level: Option<String>,
    #[serde(default)]
    reviewed: Option<usize>,
    #[serde(default)]
    unreviewed: Option<usize>,
    #[serde(default)]
    rejected: Option<usize>,
}

impl RawMatch {
    fn trust(&self) -> TrustLevel {
        match (&self.trust_level, self.reviewed, self.unreviewed, self.rejected) {
            (Some(level), _, _, _) => TrustLevel::parse_lenient(Some(level)),
            (None, None, None, None) => TrustLevel::Unknown,
            (None, reviewed, unreviewed, rejected) => TrustLevel::from_sample_review(
                reviewed.unwrap_or(0),
                unreviewed.unwrap_or(0),
                rejected.unwrap_or(0),
            ),
        }
    }
}

/// Parse identifier stdout into matches
pub fn parse_matches(stdout: &str) -> Result<Vec<BiometricMatch>, ProviderError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(vec![]);
    }

    let raw: Vec<RawMatch> = serde_json::from_str(trimmed)
        .map_err(|e| ProviderError::Parse(format!("Failed to parse identifier output: {}", e)))?;

    Ok(raw
        .into_iter()
        .map(|m| BiometricMatch {
            trust: m.trust(),
            candidate_id: m.speaker_id,
            similarity: m.similarity,
        })
        .collect())
}

/// Voice identifier backed by an external command
pub struct CommandIdentifier {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandIdentifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        Self {
            name: format!("command:{}", program),
            program,
            args,
        }
    }
}

#[async_trait]
impl VoiceIdentifier for CommandIdentifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn identify(&self, span: &AudioSpan) -> Result<Vec<BiometricMatch>, ProviderError> {
        let request = serde_json::to_vec(&IdentifyRequest {
            audio_path: &span.audio_path,
            label: &span.label,
            segments: &span.segments,
            tags: &span.tags,
        })
        .map_err(|e| ProviderError::Failed(format!("Failed to encode request: {}", e)))?;

        debug!(
            program = %self.program,
            label = %span.label,
            segments = span.segments.len(),
            "Running voice identifier"
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
            stdin.write_all(&request).await?;
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

        parse_matches(&String::from_utf8_lossy(&output.stdout))
    }
}
