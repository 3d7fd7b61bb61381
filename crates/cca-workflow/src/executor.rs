//! Workflow execution state machine (spec §4.7): `execute_step` advances
//! exactly one step; `run_execution_loop` drives it to a terminal state,
//! checkpoint, or pause, with an at-most-one-loop-per-execution mutex.

use crate::definition::{StepType, TriggerType, WorkflowDefinition};
use cca_core::{
    AppError, Checkpoint, CheckpointId, CheckpointStatus, ExecutionId, ExecutionStatus, NodeExecutionId,
    WorkflowExecution, WorkflowId,
};
use cca_store::Store;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument, warn};

/// Result of advancing one step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub execution: WorkflowExecution,
    pub node_execution_id: Option<NodeExecutionId>,
    pub checkpoint: Option<Checkpoint>,
    pub completed: bool,
    pub paused: bool,
    pub error: Option<String>,
}

pub struct WorkflowExecutor {
    store: Store,
    running_loops: AsyncMutex<HashSet<ExecutionId>>,
}

impl WorkflowExecutor {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            running_loops: AsyncMutex::new(HashSet::new()),
        }
    }

    pub fn start_execution(&self, workflow: &WorkflowDefinition) -> Result<WorkflowExecution, AppError> {
        let execution = WorkflowExecution {
            id: ExecutionId::new(),
            workflow_id: WorkflowId::from_raw(workflow.id.clone()),
            status: ExecutionStatus::Running,
            current_node_id: workflow.first_step_id().map(|s| s.to_string()),
            iteration: 0,
            chat_session_id: None,
            started_at: chrono::Utc::now(),
            completed_at: None,
        };
        self.store.create_execution(&execution)?;
        Ok(execution)
    }

    /// Advances exactly one step of `execution_id` through `workflow`.
    #[instrument(skip(self, workflow))]
    pub fn execute_step(
        &self,
        workflow: &WorkflowDefinition,
        execution_id: &ExecutionId,
    ) -> Result<StepOutcome, AppError> {
        let execution = self
            .store
            .get_execution(execution_id)?
            .ok_or_else(|| AppError::ExecutionNotFound(execution_id.to_string()))?;

        if matches!(
            execution.status,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        ) {
            return Ok(StepOutcome {
                execution: execution.clone(),
                node_execution_id: None,
                checkpoint: None,
                completed: matches!(execution.status, ExecutionStatus::Completed),
                paused: false,
                error: None,
            });
        }

        let Some(node_id) = execution.current_node_id.clone() else {
            self.store
                .update_execution_state(execution_id, ExecutionStatus::Failed, None)?;
            return Ok(failed_outcome(execution, "execution has no current node (stall)"));
        };

        let Some(step) = workflow.step(&node_id) else {
            self.store
                .update_execution_state(execution_id, ExecutionStatus::Failed, None)?;
            return Ok(failed_outcome(execution, &format!("unknown step '{node_id}'")));
        };

        let node_execution_id = NodeExecutionId::new();
        match &step.step_type {
            StepType::End => {
                self.store
                    .update_execution_state(execution_id, ExecutionStatus::Completed, Some(&node_id))?;
                info!(execution_id = %execution_id, "execution:complete");
                let execution = self.store.get_execution(execution_id)?.unwrap();
                Ok(StepOutcome {
                    execution,
                    node_execution_id: Some(node_execution_id),
                    checkpoint: None,
                    completed: true,
                    paused: false,
                    error: None,
                })
            }
            StepType::Handoff { .. } | StepType::Agent { .. } if step.edges.is_empty() => {
                let checkpoint = Checkpoint {
                    id: CheckpointId::new(),
                    execution_id: execution_id.clone(),
                    node_execution_id: node_execution_id.clone(),
                    prompt: format!("step '{node_id}' has no successor; awaiting human input"),
                    status: CheckpointStatus::Pending,
                    decision: None,
                    feedback: None,
                    responded_at: None,
                };
                self.store.create_checkpoint(&checkpoint)?;
                self.store
                    .update_execution_state(execution_id, ExecutionStatus::AwaitingInput, None)?;
                let execution = self.store.get_execution(execution_id)?.unwrap();
                Ok(StepOutcome {
                    execution,
                    node_execution_id: Some(node_execution_id),
                    checkpoint: Some(checkpoint),
                    completed: false,
                    paused: false,
                    error: None,
                })
            }
            _ => {
                let next = step.edges.first().cloned();
                match next {
                    Some(next_id) => {
                        self.store
                            .update_execution_state(execution_id, ExecutionStatus::Running, Some(&next_id))?;
                    }
                    None => {
                        self.store
                            .update_execution_state(execution_id, ExecutionStatus::Failed, None)?;
                        return Ok(failed_outcome(
                            self.store.get_execution(execution_id)?.unwrap(),
                            &format!("step '{node_id}' has no successor and is not a terminal type"),
                        ));
                    }
                }
                let execution = self.store.get_execution(execution_id)?.unwrap();
                Ok(StepOutcome {
                    execution,
                    node_execution_id: Some(node_execution_id),
                    checkpoint: None,
                    completed: false,
                    paused: false,
                    error: None,
                })
            }
        }
    }

    pub fn pause_execution(&self, execution_id: &ExecutionId) -> Result<(), AppError> {
        self.store.update_execution_state(execution_id, ExecutionStatus::Paused, None)
    }

    pub fn resume_execution(&self, execution_id: &ExecutionId) -> Result<(), AppError> {
        self.store.update_execution_state(execution_id, ExecutionStatus::Running, None)
    }

    pub fn cancel_execution(&self, execution_id: &ExecutionId) -> Result<(), AppError> {
        self.store.update_execution_state(execution_id, ExecutionStatus::Cancelled, None)
    }

    pub fn respond_to_checkpoint(
        &self,
        checkpoint_id: &CheckpointId,
        execution_id: &ExecutionId,
        decision: serde_json::Value,
        feedback: Option<&str>,
    ) -> Result<(), AppError> {
        self.store.respond_to_checkpoint(checkpoint_id, decision, feedback)?;
        self.store.update_execution_state(execution_id, ExecutionStatus::Running, None)
    }

    /// Re-enters a completed execution for `on-message`/`manual` triggers
    /// (spec §4.7 re-trigger semantics); any other trigger type leaves
    /// `completed` terminal.
    pub fn retrigger(&self, workflow: &WorkflowDefinition, execution_id: &ExecutionId) -> Result<bool, AppError> {
        if !matches!(workflow.trigger_type, TriggerType::OnMessage | TriggerType::Manual) {
            return Ok(false);
        }
        let execution = self
            .store
            .get_execution(execution_id)?
            .ok_or_else(|| AppError::ExecutionNotFound(execution_id.to_string()))?;
        if execution.status != ExecutionStatus::Completed {
            return Ok(false);
        }
        let first = workflow.first_step_id().map(|s| s.to_string());
        self.store.increment_execution_iteration(execution_id)?;
        self.store
            .update_execution_state(execution_id, ExecutionStatus::Running, first.as_deref())?;
        Ok(true)
    }

    /// Drives `execute_step` until a terminal state, checkpoint, pause,
    /// or the workflow's iteration cap is hit. At most one loop runs per
    /// execution-id at a time; concurrent callers return immediately.
    pub async fn run_execution_loop(
        self: &Arc<Self>,
        workflow: &WorkflowDefinition,
        execution_id: &ExecutionId,
    ) -> Result<StepOutcome, AppError> {
        {
            let mut running = self.running_loops.lock().await;
            if running.contains(execution_id) {
                warn!(execution_id = %execution_id, "execution loop already running, skipping");
                let execution = self
                    .store
                    .get_execution(execution_id)?
                    .ok_or_else(|| AppError::ExecutionNotFound(execution_id.to_string()))?;
                return Ok(StepOutcome {
                    execution,
                    node_execution_id: None,
                    checkpoint: None,
                    completed: false,
                    paused: false,
                    error: Some("execution loop already running".into()),
                });
            }
            running.insert(execution_id.clone());
        }

        let result = self.drive_loop(workflow, execution_id).await;

        self.running_loops.lock().await.remove(execution_id);
        result
    }

    async fn drive_loop(&self, workflow: &WorkflowDefinition, execution_id: &ExecutionId) -> Result<StepOutcome, AppError> {
        let cap = workflow.effective_max_iterations();
        let mut iterations = 0u32;
        loop {
            let outcome = self.execute_step(workflow, execution_id)?;
            if outcome.completed || outcome.checkpoint.is_some() || outcome.error.is_some() {
                return Ok(outcome);
            }
            if matches!(outcome.execution.status, ExecutionStatus::Paused) {
                return Ok(outcome);
            }
            iterations += 1;
            if iterations >= cap {
                self.store
                    .update_execution_state(execution_id, ExecutionStatus::Failed, None)?;
                return Ok(failed_outcome(outcome.execution, "iteration cap reached"));
            }
        }
    }
}

fn failed_outcome(execution: WorkflowExecution, message: &str) -> StepOutcome {
    StepOutcome {
        execution,
        node_execution_id: None,
        checkpoint: None,
        completed: false,
        paused: false,
        error: Some(message.to_string()),
    }
}
