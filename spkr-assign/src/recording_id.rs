//! Recording identity
//!
//! A recording is keyed by a content hash of its audio bytes, so renaming or
//! moving the file keeps its stored assignments. BLAKE3 is the primary
//! algorithm; SHA-256 is the documented fallback for catalogs produced where
//! BLAKE3 tooling is unavailable. Either way the id is the first 32 hex
//! characters of the digest.

use crate::error::{AssignError, AssignResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Hex characters kept from the digest
pub const ID_LENGTH: usize = 32;

const CHUNK_SIZE: usize = 1024 * 1024;

/// Content hash algorithm for recording ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blake3" => Ok(HashAlgorithm::Blake3),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            other => Err(format!(
                "unknown hash algorithm '{}' (expected blake3 or sha256)",
                other
            )),
        }
    }
}

/// Content-derived recording identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(String);

impl RecordingId {
    /// Hash an audio file
    ///
    /// Reads in 1MB chunks on the blocking pool.
    pub async fn from_file(path: &Path, algorithm: HashAlgorithm) -> AssignResult<Self> {
        if !path.exists() {
            return Err(AssignError::NotFound(format!(
                "Audio file not found: {}",
                path.display()
            )));
        }

        let path_buf = path.to_path_buf();
        tracing::debug!(path = %path_buf.display(), ?algorithm, "Calculating recording id");

        let hex = tokio::task::spawn_blocking(move || hash_file(&path_buf, algorithm))
            .await
            .map_err(|e| AssignError::Internal(format!("Hash calculation task failed: {}", e)))??;

        Ok(Self::from_digest_hex(&hex))
    }

    /// Hash in-memory bytes
    pub fn from_bytes(bytes: &[u8], algorithm: HashAlgorithm) -> Self {
        let hex = match algorithm {
            HashAlgorithm::Blake3 => blake3::hash(bytes).to_hex().to_string(),
            HashAlgorithm::Sha256 => format!("{:x}", Sha256::digest(bytes)),
        };
        Self::from_digest_hex(&hex)
    }

    fn from_digest_hex(hex: &str) -> Self {
        Self(hex.chars().take(ID_LENGTH).collect())
    }

    /// Wrap an id string that was already computed (e.g. read from disk)
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for display
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hash_file(path: &Path, algorithm: HashAlgorithm) -> AssignResult<String> {
    use std::fs::File;
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        AssignError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {} for hashing: {}", path.display(), e),
        ))
    })?;
    let mut buffer = vec![0u8; CHUNK_SIZE];

    match algorithm {
        HashAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            loop {
                let n = file.read(&mut buffer)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
            Ok(hasher.finalize().to_hex().to_string())
        }
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            loop {
                let n = file.read(&mut buffer)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
            Ok(format!("{:x}", hasher.finalize()))
        }
    }
}
