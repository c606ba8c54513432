//! Run settings for spkr-assign
//!
//! Effective settings priority: CLI flag → `SPKR_*` environment variable →
//! `[assign]` table in the TOML config → compiled defaults.
//!
//! ```toml
//! root_folder = "/data/spkr"
//!
//! [logging]
//! level = "info"
//!
//! [assign]
//! acceptance_threshold = 0.3
//! min_trust = "low"
//! provider_timeout_secs = 120
//! hash_algorithm = "blake3"
//!
//! [assign.weights]
//! biometric_match = 0.4
//! content_name_detection = 0.3
//! expected_participant = 0.2
//! cross_source_agreement = 0.1
//!
//! [assign.sources]
//! biometric = true
//! content = true
//!
//! [assign.biometric]
//! program = "spkr-identify"
//!
//! [assign.content]
//! program = "spkr-llm"
//! args = ["detect-names", "--format", "json"]
//! model = "small"
//!
//! [assign.aliases]
//! "Bob" = "robert-jones"
//! ```
//!
//! Weights and threshold are validated when the engine configuration is
//! built, before any recording is touched.

use crate::collector::{CollectorConfig, NameResolver, SourceToggles};
use crate::error::{AssignError, AssignResult};
use crate::fusion::{EngineConfig, TrustMultipliers, WeightTable};
use crate::recording_id::HashAlgorithm;
use crate::transcript::{DEFAULT_MAX_GAP, DEFAULT_MIN_SEGMENT};
use crate::types::TrustLevel;
use serde::{Deserialize, Serialize};
use spkr_common::config::TomlConfig;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Acceptance threshold override
pub const ENV_THRESHOLD: &str = "SPKR_THRESHOLD";
/// Minimum biometric trust override
pub const ENV_MIN_TRUST: &str = "SPKR_MIN_TRUST";
/// Provider timeout override (seconds)
pub const ENV_PROVIDER_TIMEOUT: &str = "SPKR_PROVIDER_TIMEOUT_SECS";
/// Recording id hash algorithm override
pub const ENV_HASH_ALGORITHM: &str = "SPKR_HASH_ALGORITHM";

pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.3;
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;

/// External command backing a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Model name, part of the analyzer identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// `[assign]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignSettings {
    pub acceptance_threshold: f64,
    pub min_trust: TrustLevel,
    pub provider_timeout_secs: u64,
    pub hash_algorithm: HashAlgorithm,
    pub weights: WeightTable,
    pub trust_multipliers: TrustMultipliers,
    pub sources: SourceToggles,
    pub expected_participants: Vec<String>,
    pub tags: Vec<String>,
    pub min_segment_secs: f64,
    pub max_gap_secs: f64,
    /// Cache conversation analysis under `<root>/cache`
    pub cache_analysis: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biometric: Option<CommandSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<CommandSpec>,
    /// Detected name → candidate id
    pub aliases: BTreeMap<String, String>,
}

impl Default for AssignSettings {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            min_trust: TrustLevel::Low,
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            hash_algorithm: HashAlgorithm::default(),
            weights: WeightTable::default(),
            trust_multipliers: TrustMultipliers::default(),
            sources: SourceToggles::default(),
            expected_participants: Vec::new(),
            tags: Vec::new(),
            min_segment_secs: DEFAULT_MIN_SEGMENT,
            max_gap_secs: DEFAULT_MAX_GAP,
            cache_analysis: true,
            biometric: None,
            content: None,
            aliases: BTreeMap::new(),
        }
    }
}

/// Whole TOML file: shared keys plus `[assign]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignToml {
    #[serde(flatten)]
    pub common: TomlConfig,
    #[serde(default)]
    pub assign: AssignSettings,
}

impl AssignToml {
    /// Missing file → defaults; unparseable file → configuration error
    pub fn load(path: &Path) -> AssignResult<Self> {
        Ok(spkr_common::config::load_toml_file(path)?)
    }
}

fn env_value<T>(name: &str) -> AssignResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AssignError::Config(format!("{}: {}", name, e))),
        _ => Ok(None),
    }
}

impl AssignSettings {
    /// Apply `SPKR_*` environment overrides
    pub fn apply_env(&mut self) -> AssignResult<()> {
        if let Some(threshold) = env_value::<f64>(ENV_THRESHOLD)? {
            info!(threshold = threshold, "Acceptance threshold from environment");
            self.acceptance_threshold = threshold;
        }
        if let Some(min_trust) = env_value::<TrustLevel>(ENV_MIN_TRUST)? {
            self.min_trust = min_trust;
        }
        if let Some(secs) = env_value::<u64>(ENV_PROVIDER_TIMEOUT)? {
            self.provider_timeout_secs = secs;
        }
        if let Some(algorithm) = env_value::<HashAlgorithm>(ENV_HASH_ALGORITHM)? {
            self.hash_algorithm = algorithm;
        }
        Ok(())
    }

    /// Validated engine configuration
    pub fn engine_config(&self) -> AssignResult<EngineConfig> {
        EngineConfig::new(self.weights, self.trust_multipliers, self.acceptance_threshold)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Collector configuration; a zero provider timeout is rejected
    pub fn collector_config(&self) -> AssignResult<CollectorConfig> {
        if self.provider_timeout_secs == 0 {
            return Err(AssignError::Config(
                "provider_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(CollectorConfig {
            sources: self.sources,
            min_trust: self.min_trust,
            expected_participants: self.expected_participants.clone(),
            tags: self.tags.clone(),
            names: NameResolver::new(self.aliases.clone()),
            provider_timeout: self.provider_timeout(),
            min_segment: self.min_segment_secs,
            max_gap: self.max_gap_secs,
        })
    }
}
