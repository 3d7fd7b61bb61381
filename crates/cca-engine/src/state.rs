//! The CCA session state returned by `run` (spec §4.8).

use cca_core::IterationId;
use cca_validator::ValidationSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Coding,
    Reviewing,
    AwaitingArbiter,
    Applying,
    Iterating,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CcaSessionState {
    pub workflow_state: WorkflowState,
    pub task: String,
    pub iterations: Vec<IterationId>,
    pub current_iteration: u32,
    pub max_iterations: u32,
    pub consensus_reached: bool,
    pub aborted: bool,
    pub last_validation_summary: Option<ValidationSummary>,
}
