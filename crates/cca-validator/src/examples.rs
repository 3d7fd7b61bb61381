//! Two example validators, test/demo scaffolding only: not the real
//! validation pipeline the spec scopes out, just enough to exercise the
//! engine without one.

use crate::pipeline::{ValidationContext, ValidationTrigger, ValidatorPipeline};
use crate::summary::{ValidationResult, ValidationStatus, ValidationSummary};
use async_trait::async_trait;
use cca_core::IssueSeverity;

/// Rejects empty or whitespace-only file content.
pub struct NonEmptyFileValidator;

#[async_trait]
impl ValidatorPipeline for NonEmptyFileValidator {
    async fn validate(&self, _trigger: ValidationTrigger, context: &ValidationContext) -> ValidationSummary {
        let is_empty = context.content.trim().is_empty();
        let result = ValidationResult {
            validator_id: "non-empty-file".into(),
            status: if is_empty {
                ValidationStatus::Rejected
            } else {
                ValidationStatus::Approved
            },
            severity: if is_empty { IssueSeverity::Error } else { IssueSeverity::Info },
            message: if is_empty {
                format!("{} is empty", context.path)
            } else {
                format!("{} is non-empty", context.path)
            },
            issues: vec![],
            duration_ms: 0,
        };
        ValidationSummary::from_results(vec![result])
    }

    fn list_validators(&self) -> Vec<String> {
        vec!["non-empty-file".into()]
    }
}

/// Always approves. Stands in for an AI reviewer in tests where no real
/// validation pipeline is wired up.
pub struct PassthroughAiValidator;

#[async_trait]
impl ValidatorPipeline for PassthroughAiValidator {
    async fn validate(&self, _trigger: ValidationTrigger, context: &ValidationContext) -> ValidationSummary {
        ValidationSummary::from_results(vec![ValidationResult {
            validator_id: "passthrough-ai".into(),
            status: ValidationStatus::Approved,
            severity: IssueSeverity::Info,
            message: format!("{} looks fine", context.path),
            issues: vec![],
            duration_ms: 0,
        }])
    }

    fn list_validators(&self) -> Vec<String> {
        vec!["passthrough-ai".into()]
    }
}
