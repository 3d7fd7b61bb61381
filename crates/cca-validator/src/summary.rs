//! Types the validator pipeline contract (spec §4.6) returns. The engine
//! never inspects a validator's internals, only these shapes.

use cca_core::IssueSeverity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Approved,
    Rejected,
    NeedsRevision,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub validator_id: String,
    pub status: ValidationStatus,
    pub severity: IssueSeverity,
    pub message: String,
    pub issues: Vec<serde_json::Value>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub overall: ValidationStatus,
    pub results: Vec<ValidationResult>,
    pub requires_human_decision: bool,
    pub consensus_reached: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationSummary {
    /// Folds individual results into an overall verdict: any `error`
    /// result forces `error`; else any `rejected` forces `rejected`; else
    /// any `needs_revision` forces `needs_revision`; otherwise `approved`.
    /// Consensus is reached when every result agrees on status.
    pub fn from_results(results: Vec<ValidationResult>) -> Self {
        let overall = if results.iter().any(|r| r.status == ValidationStatus::Error) {
            ValidationStatus::Error
        } else if results.iter().any(|r| r.status == ValidationStatus::Rejected) {
            ValidationStatus::Rejected
        } else if results.iter().any(|r| r.status == ValidationStatus::NeedsRevision) {
            ValidationStatus::NeedsRevision
        } else {
            ValidationStatus::Approved
        };

        let consensus_reached = results.windows(2).all(|w| w[0].status == w[1].status);
        let requires_human_decision = matches!(overall, ValidationStatus::NeedsRevision) || !consensus_reached;

        let warnings = results
            .iter()
            .filter(|r| r.severity == IssueSeverity::Warning)
            .map(|r| r.message.clone())
            .collect();
        let errors = results
            .iter()
            .filter(|r| r.severity == IssueSeverity::Error)
            .map(|r| r.message.clone())
            .collect();

        Self {
            overall,
            results,
            requires_human_decision,
            consensus_reached,
            warnings,
            errors,
        }
    }
}
