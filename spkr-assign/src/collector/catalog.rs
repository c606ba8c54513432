//! Recording catalog lookup
//!
//! Catalog entries live at `<root>/catalog/<recording_id>.yaml`:
//! ```yaml
//! recording:
//!   b3sum: 3f2a...
//!   original_path: /recordings/standup.wav
//! context:
//!   name: team-standup
//!   expected_speakers: [alice, bob]
//! ```
//! A recording without an entry simply has no expected participants.

use crate::types::{CatalogContext, ParticipantCatalog, ProviderError, RecordingContext};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    context: Option<EntryContext>,
}

#[derive(Debug, Default, Deserialize)]
struct EntryContext {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    expected_speakers: Vec<String>,
}

/// Participant catalog backed by a directory of YAML entries
pub struct CatalogDirectory {
    dir: PathBuf,
}

impl CatalogDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ParticipantCatalog for CatalogDirectory {
    async fn lookup(&self, ctx: &RecordingContext) -> Result<CatalogContext, ProviderError> {
        let path = self.dir.join(format!("{}.yaml", ctx.recording_id));

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(recording_id = %ctx.recording_id, "No catalog entry");
                return Ok(CatalogContext::default());
            }
            Err(e) => return Err(ProviderError::Io(e)),
        };

        let entry: CatalogEntry = serde_yaml::from_str(&content).map_err(|e| {
            ProviderError::Parse(format!("Invalid catalog entry {}: {}", path.display(), e))
        })?;
        let context = entry.context.unwrap_or_default();

        Ok(CatalogContext {
            name: context.name.filter(|n| !n.trim().is_empty()),
            expected_participants: context
                .expected_speakers
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}
