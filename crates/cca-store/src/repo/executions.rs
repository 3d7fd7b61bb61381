use crate::connection::Store;
use crate::repo::sessions::parse_ts;
use cca_core::{AppError, Checkpoint, CheckpointId, CheckpointStatus, ExecutionId, ExecutionStatus, NodeExecutionId, SessionId, WorkflowExecution, WorkflowId};
use rusqlite::{params, OptionalExtension};

impl Store {
    pub fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), AppError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO workflow_executions (id, workflow_id, status, current_node_id, iteration, chat_session_id, started_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    execution.id.as_str(),
                    execution.workflow_id.as_str(),
                    status_str(execution.status),
                    execution.current_node_id,
                    execution.iteration,
                    execution.chat_session_id.as_ref().map(|id| id.as_str()),
                    execution.started_at.to_rfc3339(),
                    execution.completed_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_execution(&self, id: &ExecutionId) -> Result<Option<WorkflowExecution>, AppError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, workflow_id, status, current_node_id, iteration, chat_session_id, started_at, completed_at
                 FROM workflow_executions WHERE id = ?1",
                [id.as_str()],
                row_to_execution,
            )
            .optional()
            .map_err(AppError::from)
        })
    }

    pub fn update_execution_state(
        &self,
        id: &ExecutionId,
        status: ExecutionStatus,
        current_node_id: Option<&str>,
    ) -> Result<(), AppError> {
        self.with_conn(|conn| {
            let completed_at = matches!(
                status,
                ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
            )
            .then(|| chrono::Utc::now().to_rfc3339());
            let updated = conn.execute(
                "UPDATE workflow_executions SET status = ?1, current_node_id = COALESCE(?2, current_node_id), completed_at = COALESCE(?3, completed_at) WHERE id = ?4",
                params![status_str(status), current_node_id, completed_at, id.as_str()],
            )?;
            if updated == 0 {
                return Err(AppError::ExecutionNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    /// Bumps the re-trigger counter (spec §4.7 re-trigger semantics).
    pub fn increment_execution_iteration(&self, id: &ExecutionId) -> Result<(), AppError> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE workflow_executions SET iteration = iteration + 1 WHERE id = ?1",
                params![id.as_str()],
            )?;
            if updated == 0 {
                return Err(AppError::ExecutionNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    pub fn create_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), AppError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO checkpoints (id, execution_id, node_execution_id, prompt, status, decision, feedback, responded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    checkpoint.id.as_str(),
                    checkpoint.execution_id.as_str(),
                    checkpoint.node_execution_id.as_str(),
                    checkpoint.prompt,
                    checkpoint_status_str(checkpoint.status),
                    checkpoint.decision.as_ref().map(serde_json::to_string).transpose()?,
                    checkpoint.feedback,
                    checkpoint.responded_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
    }

    pub fn respond_to_checkpoint(
        &self,
        id: &CheckpointId,
        decision: serde_json::Value,
        feedback: Option<&str>,
    ) -> Result<(), AppError> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE checkpoints SET status = 'responded', decision = ?1, feedback = ?2, responded_at = ?3 WHERE id = ?4",
                params![
                    serde_json::to_string(&decision)?,
                    feedback,
                    chrono::Utc::now().to_rfc3339(),
                    id.as_str(),
                ],
            )?;
            if updated == 0 {
                return Err(AppError::Internal(format!("checkpoint '{id}' not found")));
            }
            Ok(())
        })
    }

    pub fn pending_checkpoint_for_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<Checkpoint>, AppError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, execution_id, node_execution_id, prompt, status, decision, feedback, responded_at
                 FROM checkpoints WHERE execution_id = ?1 AND status = 'pending' ORDER BY rowid DESC LIMIT 1",
                [execution_id.as_str()],
                row_to_checkpoint,
            )
            .optional()
            .map_err(AppError::from)
        })
    }
}

fn status_str(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Running => "running",
        ExecutionStatus::Paused => "paused",
        ExecutionStatus::AwaitingInput => "awaiting_input",
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::Failed => "failed",
        ExecutionStatus::Cancelled => "cancelled",
    }
}

fn parse_status(s: &str) -> rusqlite::Result<ExecutionStatus> {
    Ok(match s {
        "running" => ExecutionStatus::Running,
        "paused" => ExecutionStatus::Paused,
        "awaiting_input" => ExecutionStatus::AwaitingInput,
        "completed" => ExecutionStatus::Completed,
        "failed" => ExecutionStatus::Failed,
        "cancelled" => ExecutionStatus::Cancelled,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                0,
                format!("unknown execution status '{other}'"),
                rusqlite::types::Type::Text,
            ))
        }
    })
}

fn checkpoint_status_str(status: CheckpointStatus) -> &'static str {
    match status {
        CheckpointStatus::Pending => "pending",
        CheckpointStatus::Responded => "responded",
    }
}

fn parse_checkpoint_status(s: &str) -> rusqlite::Result<CheckpointStatus> {
    Ok(match s {
        "pending" => CheckpointStatus::Pending,
        "responded" => CheckpointStatus::Responded,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                0,
                format!("unknown checkpoint status '{other}'"),
                rusqlite::types::Type::Text,
            ))
        }
    })
}

fn row_to_execution(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkflowExecution> {
    Ok(WorkflowExecution {
        id: ExecutionId::from_raw(row.get::<_, String>(0)?),
        workflow_id: WorkflowId::from_raw(row.get::<_, String>(1)?),
        status: parse_status(&row.get::<_, String>(2)?)?,
        current_node_id: row.get(3)?,
        iteration: row.get::<_, i64>(4)? as u32,
        chat_session_id: row.get::<_, Option<String>>(5)?.map(SessionId::from_raw),
        started_at: parse_ts(&row.get::<_, String>(6)?),
        completed_at: row.get::<_, Option<String>>(7)?.map(|s| parse_ts(&s)),
    })
}

fn row_to_checkpoint(row: &rusqlite::Row<'_>) -> rusqlite::Result<Checkpoint> {
    let decision_raw: Option<String> = row.get(5)?;
    Ok(Checkpoint {
        id: CheckpointId::from_raw(row.get::<_, String>(0)?),
        execution_id: ExecutionId::from_raw(row.get::<_, String>(1)?),
        node_execution_id: NodeExecutionId::from_raw(row.get::<_, String>(2)?),
        prompt: row.get(3)?,
        status: parse_checkpoint_status(&row.get::<_, String>(4)?)?,
        decision: decision_raw.and_then(|s| serde_json::from_str(&s).ok()),
        feedback: row.get(6)?,
        responded_at: row.get::<_, Option<String>>(7)?.map(|s| parse_ts(&s)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_execution() -> WorkflowExecution {
        WorkflowExecution {
            id: ExecutionId::new(),
            workflow_id: WorkflowId::new(),
            status: ExecutionStatus::Running,
            current_node_id: Some("start".into()),
            iteration: 0,
            chat_session_id: None,
            started_at: chrono::Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn create_and_update_state() {
        let store = Store::open_in_memory().unwrap();
        let execution = sample_execution();
        store.create_execution(&execution).unwrap();
        store
            .update_execution_state(&execution.id, ExecutionStatus::Paused, Some("review"))
            .unwrap();
        let loaded = store.get_execution(&execution.id).unwrap().unwrap();
        assert_eq!(loaded.status, ExecutionStatus::Paused);
        assert_eq!(loaded.current_node_id.as_deref(), Some("review"));
    }

    #[test]
    fn checkpoint_round_trip_and_response() {
        let store = Store::open_in_memory().unwrap();
        let execution = sample_execution();
        store.create_execution(&execution).unwrap();
        let checkpoint = Checkpoint {
            id: CheckpointId::new(),
            execution_id: execution.id.clone(),
            node_execution_id: NodeExecutionId::new(),
            prompt: "approve this change?".into(),
            status: CheckpointStatus::Pending,
            decision: None,
            feedback: None,
            responded_at: None,
        };
        store.create_checkpoint(&checkpoint).unwrap();
        assert!(store.pending_checkpoint_for_execution(&execution.id).unwrap().is_some());
        store
            .respond_to_checkpoint(&checkpoint.id, serde_json::json!({"approve": true}), Some("lgtm"))
            .unwrap();
        assert!(store.pending_checkpoint_for_execution(&execution.id).unwrap().is_none());
    }
}
