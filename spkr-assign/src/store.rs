//! Assignment persistence
//!
//! One YAML file per recording at `<root>/assignments/<recording_id>.yaml`.
//! Writes go to a temp file in the same directory and are renamed into
//! place, so a crash never leaves a half-written record. Writers for the
//! same recording are serialized by a per-recording lock.

use crate::collector::SourceFailure;
use crate::error::{AssignError, AssignResult};
use crate::recording_id::RecordingId;
use crate::types::{Alternative, AssignmentResult, CandidateId, ConfidenceTier, Evidence, Label, TrustLevel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Current persisted schema
pub const SCHEMA_VERSION: u32 = 1;

/// Value of the `method` field
pub const METHOD: &str = "signal_fusion";

/// Persisted decision for one label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelAssignment {
    pub winner: Option<CandidateId>,
    pub confidence: ConfidenceTier,
    pub score: f64,
    #[serde(default)]
    pub contributing_evidence: Vec<Evidence>,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

impl From<AssignmentResult> for LabelAssignment {
    fn from(result: AssignmentResult) -> Self {
        Self {
            winner: result.winner,
            confidence: result.confidence,
            score: result.score,
            contributing_evidence: result.contributing_evidence,
            alternatives: result.alternatives,
        }
    }
}

/// Persisted assignment record for one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingAssignment {
    pub schema_version: u32,
    pub recording_id: RecordingId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
    pub transcript_path: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_transcripts: Vec<PathBuf>,
    pub assigned_at: DateTime<Utc>,
    pub method: String,
    pub threshold: f64,
    pub min_trust: TrustLevel,
    #[serde(default)]
    pub context: Option<String>,
    /// Sources that failed during collection
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_sources: Vec<SourceFailure>,
    pub per_label: BTreeMap<Label, LabelAssignment>,
}

impl RecordingAssignment {
    pub fn to_yaml(&self) -> AssignResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| AssignError::Store(format!("Failed to serialize assignment: {}", e)))
    }

    pub fn from_yaml(content: &str) -> AssignResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| AssignError::Store(format!("Failed to parse assignment: {}", e)))
    }

    /// Labels with an accepted winner
    pub fn assigned_count(&self) -> usize {
        self.per_label.values().filter(|l| l.winner.is_some()).count()
    }
}

/// Persistence collaborator: atomic write of one recording's results
#[async_trait]
pub trait AssignmentSink: Send + Sync {
    /// Returns the path written
    async fn write(&self, record: &RecordingAssignment) -> AssignResult<PathBuf>;

    /// Write to an explicit file instead of the sink's own location
    async fn write_to(&self, record: &RecordingAssignment, path: &Path) -> AssignResult<()> {
        write_atomic(path, record.to_yaml()?.as_bytes()).await
    }
}

/// Write `content` to `path` via temp file + rename
async fn write_atomic(path: &Path, content: &[u8]) -> AssignResult<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "assignment".to_string());
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    tokio::fs::write(&temp_path, content).await?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(AssignError::Store(format!(
            "Failed to move assignment into place at {}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

/// Directory-backed assignment store
#[derive(Clone)]
pub struct AssignmentStore {
    dir: PathBuf,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl AssignmentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, recording_id: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", recording_id))
    }

    async fn lock_for(&self, recording_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(recording_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry once no other writer holds or waits on it
    async fn release_lock(&self, recording_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One handle in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(recording_id);
        }
    }

    /// Load the record for an exact recording id
    pub async fn load(&self, recording_id: &str) -> AssignResult<RecordingAssignment> {
        let path = self.path_for(recording_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssignError::NotFound(format!(
                    "No assignments found for {}",
                    recording_id
                )));
            }
            Err(e) => return Err(e.into()),
        };
        RecordingAssignment::from_yaml(&content)
    }

    /// Stored recording ids, sorted
    pub async fn list(&self) -> AssignResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Find a record by exact id or unique id prefix
    ///
    /// `Ok(None)` when nothing matches; an ambiguous prefix is an error.
    pub async fn find(&self, id_or_prefix: &str) -> AssignResult<Option<RecordingAssignment>> {
        if id_or_prefix.is_empty() {
            return Ok(None);
        }

        let ids = self.list().await?;
        if ids.iter().any(|id| id == id_or_prefix) {
            return self.load(id_or_prefix).await.map(Some);
        }

        let matching: Vec<&String> = ids.iter().filter(|id| id.starts_with(id_or_prefix)).collect();
        match matching.as_slice() {
            [] => Ok(None),
            [id] => self.load(id).await.map(Some),
            many => Err(AssignError::Store(format!(
                "Ambiguous recording id prefix '{}' matches {} assignments",
                id_or_prefix,
                many.len()
            ))),
        }
    }

    /// Remove stored assignments; `false` when there was nothing to remove
    pub async fn clear(&self, recording_id: &str) -> AssignResult<bool> {
        let lock = self.lock_for(recording_id).await;
        let removed = {
            let _guard = lock.lock().await;
            tokio::fs::remove_file(self.path_for(recording_id)).await
        };
        self.release_lock(recording_id, lock).await;

        match removed {
            Ok(()) => {
                info!(recording_id = recording_id, "Assignments cleared");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(recording_id = recording_id, "No assignments to clear");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl AssignmentSink for AssignmentStore {
    async fn write(&self, record: &RecordingAssignment) -> AssignResult<PathBuf> {
        let recording_id = record.recording_id.as_str();
        let yaml = record.to_yaml()?;
        let path = self.path_for(recording_id);

        let lock = self.lock_for(recording_id).await;
        let written = {
            let _guard = lock.lock().await;
            write_atomic(&path, yaml.as_bytes()).await
        };
        self.release_lock(recording_id, lock).await;
        written?;

        info!(
            recording_id = %record.recording_id,
            path = %path.display(),
            labels = record.per_label.len(),
            assigned = record.assigned_count(),
            "Assignments saved"
        );
        Ok(path)
    }

    async fn write_to(&self, record: &RecordingAssignment, path: &Path) -> AssignResult<()> {
        let recording_id = record.recording_id.as_str();
        let yaml = record.to_yaml()?;

        let lock = self.lock_for(recording_id).await;
        let written = {
            let _guard = lock.lock().await;
            write_atomic(path, yaml.as_bytes()).await
        };
        self.release_lock(recording_id, lock).await;
        written?;
        info!(path = %path.display(), "Assignments written");
        Ok(())
    }
}
