//! Fusion Module - evidence → scores → decision
//!
//! The pure, stateless half of spkr-assign:
//! - **trust:** trust classification → discount multiplier
//! - **signal_fuser:** evidence items → score per candidate
//! - **confidence:** score → qualitative tier
//! - **resolver:** winner selection with threshold and tie-break
//!
//! Nothing here performs I/O or holds state between calls, so every function
//! is safe to call concurrently with different configurations.

pub mod confidence;
pub mod resolver;
pub mod signal_fuser;
pub mod trust;

pub use confidence::classify;
pub use resolver::{AcceptanceThreshold, AssignmentResolver};
pub use signal_fuser::fuse;
pub use trust::TrustMultipliers;

use crate::error::{AssignError, AssignResult};
use crate::types::EvidenceKind;
use serde::{Deserialize, Serialize};

/// Allowed drift of the weight sum from 1.0
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Base weight per evidence kind
///
/// Weights are each in [0, 1] and sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    pub biometric_match: f64,
    pub content_name_detection: f64,
    pub expected_participant: f64,
    pub cross_source_agreement: f64,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            biometric_match: 0.4,
            content_name_detection: 0.3,
            expected_participant: 0.2,
            cross_source_agreement: 0.1,
        }
    }
}

impl WeightTable {
    pub fn new(
        biometric_match: f64,
        content_name_detection: f64,
        expected_participant: f64,
        cross_source_agreement: f64,
    ) -> AssignResult<Self> {
        let table = Self {
            biometric_match,
            content_name_detection,
            expected_participant,
            cross_source_agreement,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> AssignResult<()> {
        let mut sum = 0.0;
        for kind in EvidenceKind::ALL {
            let weight = self.weight(kind);
            if !(0.0..=1.0).contains(&weight) {
                return Err(AssignError::Config(format!(
                    "weight for {} must be within [0, 1], got {}",
                    kind, weight
                )));
            }
            sum += weight;
        }

        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AssignError::Config(format!(
                "evidence weights must sum to 1.0, got {:.6}",
                sum
            )));
        }
        Ok(())
    }

    pub fn weight(&self, kind: EvidenceKind) -> f64 {
        match kind {
            EvidenceKind::BiometricMatch => self.biometric_match,
            EvidenceKind::ContentNameDetection => self.content_name_detection,
            EvidenceKind::ExpectedParticipant => self.expected_participant,
            EvidenceKind::CrossSourceAgreement => self.cross_source_agreement,
        }
    }
}

/// Immutable engine configuration, validated once before any label is processed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub weights: WeightTable,
    pub trust: TrustMultipliers,
    pub acceptance_threshold: AcceptanceThreshold,
}

impl EngineConfig {
    pub fn new(
        weights: WeightTable,
        trust: TrustMultipliers,
        acceptance_threshold: f64,
    ) -> AssignResult<Self> {
        weights.validate()?;
        trust.validate()?;
        Ok(Self {
            weights,
            trust,
            acceptance_threshold: AcceptanceThreshold::new(acceptance_threshold)?,
        })
    }

    /// Default tables with the given threshold
    pub fn with_threshold(acceptance_threshold: f64) -> AssignResult<Self> {
        Self::new(
            WeightTable::default(),
            TrustMultipliers::default(),
            acceptance_threshold,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let table = WeightTable::default();
        assert!(table.validate().is_ok());
        assert_eq!(table.weight(EvidenceKind::BiometricMatch), 0.4);
        assert_eq!(table.weight(EvidenceKind::ContentNameDetection), 0.3);
        assert_eq!(table.weight(EvidenceKind::ExpectedParticipant), 0.2);
        assert_eq!(table.weight(EvidenceKind::CrossSourceAgreement), 0.1);
    }

    #[test]
    fn test_weights_not_summing_to_one_rejected() {
        let result = WeightTable::new(0.5, 0.3, 0.2, 0.1);
        assert!(matches!(result, Err(AssignError::Config(_))));
    }

    #[test]
    fn test_negative_weight_rejected() {
        assert!(WeightTable::new(1.1, -0.1, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_custom_weights_accepted() {
        assert!(WeightTable::new(0.5, 0.25, 0.15, 0.1).is_ok());
    }

    #[test]
    fn test_engine_config_rejects_bad_threshold() {
        assert!(EngineConfig::with_threshold(1.5).is_err());
        assert!(EngineConfig::with_threshold(-0.01).is_err());
        assert!(EngineConfig::with_threshold(f64::NAN).is_err());
        assert!(EngineConfig::with_threshold(0.0).is_ok());
        assert!(EngineConfig::with_threshold(1.0).is_ok());
    }
}
