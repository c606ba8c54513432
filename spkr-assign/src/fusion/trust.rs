//! Trust Resolver
//!
//! Maps a biometric trust classification to the multiplier that discounts
//! its contribution. Total over [`TrustLevel`]; unrecognized trust strings
//! were already folded into `Unknown` when the evidence was built.

use crate::error::{AssignError, AssignResult};
use crate::types::TrustLevel;
use serde::{Deserialize, Serialize};

/// Trust classification → discount multiplier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustMultipliers {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub invalidated: f64,
    pub unknown: f64,
}

impl Default for TrustMultipliers {
    fn default() -> Self {
        Self {
            high: 1.0,
            medium: 0.7,
            low: 0.4,
            invalidated: 0.0,
            unknown: 0.5,
        }
    }
}

impl TrustMultipliers {
    /// Build a custom table, rejecting multipliers outside [0, 1]
    pub fn new(high: f64, medium: f64, low: f64, invalidated: f64, unknown: f64) -> AssignResult<Self> {
        let table = Self {
            high,
            medium,
            low,
            invalidated,
            unknown,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> AssignResult<()> {
        for (name, value) in [
            ("high", self.high),
            ("medium", self.medium),
            ("low", self.low),
            ("invalidated", self.invalidated),
            ("unknown", self.unknown),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AssignError::Config(format!(
                    "trust multiplier '{}' must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn multiplier(&self, trust: TrustLevel) -> f64 {
        match trust {
            TrustLevel::High => self.high,
            TrustLevel::Medium => self.medium,
            TrustLevel::Low => self.low,
            TrustLevel::Invalidated => self.invalidated,
            TrustLevel::Unknown => self.unknown,
        }
    }
}
