//! Risk tier policy
//!
//! Pure functions mapping a fraud probability onto the discrete risk
//! taxonomy. Live scoring and bulk ingestion both go through these, so a
//! probability always lands in the same tier regardless of how it was
//! produced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Probability above which a transaction is HIGH risk
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Probability above which a transaction is at least MEDIUM risk
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.4;

/// Probability above which a transaction is predicted fraudulent
pub const FRAUD_DECISION_THRESHOLD: f64 = 0.5;

/// Risk tier classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Report ordering: HIGH, MEDIUM, LOW
    pub const ALL: [RiskLevel; 3] = [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low];

    /// Derive the tier from a fraud probability
    pub fn from_probability(probability: f64) -> Self {
        if probability > HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else if probability > MEDIUM_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Column value stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("risk_level must be one of LOW, MEDIUM, HIGH (got '{0}')")]
pub struct ParseRiskLevelError(pub String);

impl FromStr for RiskLevel {
    type Err = ParseRiskLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            _ => Err(ParseRiskLevelError(s.to_string())),
        }
    }
}

/// Binary decision: 1 iff the probability exceeds 0.5
pub fn predicted_class(probability: f64) -> i32 {
    i32::from(probability > FRAUD_DECISION_THRESHOLD)
}
