//! The engine's only dependency on an external validation pipeline (spec
//! §4.6): a `validate`/`list_validators` contract. The real pipeline
//! implementations are out of scope; this crate only ships the contract
//! plus trivial scaffolding validators so the engine is exercisable.

use crate::summary::ValidationSummary;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationTrigger {
    OnChange,
    OnDemand,
    PreCommit,
}

/// What a validator inspects: a single file's content plus enough
/// surrounding context to judge it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationContext {
    pub path: String,
    pub content: String,
    pub workspace_root: String,
}

#[async_trait]
pub trait ValidatorPipeline: Send + Sync {
    async fn validate(&self, trigger: ValidationTrigger, context: &ValidationContext) -> ValidationSummary;

    fn list_validators(&self) -> Vec<String>;
}
