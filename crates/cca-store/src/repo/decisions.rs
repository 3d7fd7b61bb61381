use crate::connection::Store;
use crate::repo::sessions::parse_ts;
use cca_core::{ArbiterDecision, ArbiterDecisionKind, AppError, DecisionId, IterationId, IterationStatus};
use rusqlite::{params, OptionalExtension};

impl Store {
    /// Records the decision and marks the iteration completed atomically,
    /// upholding "presence of a decision forces iteration status =
    /// completed" (spec §3).
    pub fn record_decision(&self, decision: &ArbiterDecision) -> Result<(), AppError> {
        self.with_transaction(|tx| {
            let result = tx.execute(
                "INSERT INTO arbiter_decisions (id, iteration_id, decision, feedback, address_issues, focus_files, decided_at, decided_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    decision.id.as_str(),
                    decision.iteration_id.as_str(),
                    decision_str(decision.decision),
                    decision.feedback,
                    decision.address_issues.as_ref().map(|v| serde_json::to_string(v)).transpose()?,
                    decision.focus_files.as_ref().map(|v| serde_json::to_string(v)).transpose()?,
                    decision.decided_at.to_rfc3339(),
                    decision.decided_by,
                ],
            );
            match result {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(AppError::Internal(format!(
                        "iteration '{}' already has a decision",
                        decision.iteration_id
                    )))
                }
                Err(e) => return Err(AppError::from(e)),
            }
            tx.execute(
                "UPDATE iterations SET status = 'completed', completed_at = ?1 WHERE id = ?2",
                params![decision.decided_at.to_rfc3339(), decision.iteration_id.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn get_decision_for_iteration(
        &self,
        iteration_id: &IterationId,
    ) -> Result<Option<ArbiterDecision>, AppError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, iteration_id, decision, feedback, address_issues, focus_files, decided_at, decided_by
                 FROM arbiter_decisions WHERE iteration_id = ?1",
                [iteration_id.as_str()],
                row_to_decision,
            )
            .optional()
            .map_err(AppError::from)
        })
    }

    /// Checks `IterationStatus::Completed` consistency used by tests and
    /// by the engine's resume logic (spec §9 `continue-previous`).
    pub fn iteration_is_decided(&self, iteration_id: &IterationId) -> Result<bool, AppError> {
        Ok(self
            .get_iteration(iteration_id)?
            .map(|i| i.status == IterationStatus::Completed)
            .unwrap_or(false))
    }
}

fn decision_str(decision: ArbiterDecisionKind) -> &'static str {
    match decision {
        ArbiterDecisionKind::Approve => "approve",
        ArbiterDecisionKind::Reject => "reject",
        ArbiterDecisionKind::Iterate => "iterate",
        ArbiterDecisionKind::Abort => "abort",
    }
}

fn parse_decision(s: &str) -> rusqlite::Result<ArbiterDecisionKind> {
    Ok(match s {
        "approve" => ArbiterDecisionKind::Approve,
        "reject" => ArbiterDecisionKind::Reject,
        "iterate" => ArbiterDecisionKind::Iterate,
        "abort" => ArbiterDecisionKind::Abort,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                0,
                format!("unknown decision '{other}'"),
                rusqlite::types::Type::Text,
            ))
        }
    })
}

fn row_to_decision(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArbiterDecision> {
    let address_issues: Option<String> = row.get(4)?;
    let focus_files: Option<String> = row.get(5)?;
    Ok(ArbiterDecision {
        id: DecisionId::from_raw(row.get::<_, String>(0)?),
        iteration_id: IterationId::from_raw(row.get::<_, String>(1)?),
        decision: parse_decision(&row.get::<_, String>(2)?)?,
        feedback: row.get(3)?,
        address_issues: address_issues.map(|s| serde_json::from_str(&s).unwrap_or_default()),
        focus_files: focus_files.map(|s| serde_json::from_str(&s).unwrap_or_default()),
        decided_at: parse_ts(&row.get::<_, String>(6)?),
        decided_by: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cca_core::{Iteration, IterationStatus, Session, SessionId, SessionStatus};

    fn seeded_iteration(store: &Store) -> IterationId {
        let session_id = SessionId::new();
        store
            .create_session(&Session {
                id: session_id.clone(),
                task: "t".into(),
                status: SessionStatus::Running,
                coder_agent: "coder".into(),
                coder_model: "m".into(),
                workspace_path: "/tmp".into(),
                config_snapshot: serde_json::json!({}),
                created_at: chrono::Utc::now(),
                completed_at: None,
            })
            .unwrap();
        let iteration: Iteration = store.start_next_iteration(&session_id).unwrap();
        iteration.id
    }

    #[test]
    fn recording_a_decision_completes_the_iteration() {
        let store = Store::open_in_memory().unwrap();
        let iteration_id = seeded_iteration(&store);
        let decision = ArbiterDecision {
            id: DecisionId::new(),
            iteration_id: iteration_id.clone(),
            decision: ArbiterDecisionKind::Approve,
            feedback: None,
            address_issues: None,
            focus_files: None,
            decided_at: chrono::Utc::now(),
            decided_by: "human".into(),
        };
        store.record_decision(&decision).unwrap();
        assert!(store.iteration_is_decided(&iteration_id).unwrap());
        let loaded = store.get_iteration(&iteration_id).unwrap().unwrap();
        assert_eq!(loaded.status, IterationStatus::Completed);
    }

    #[test]
    fn second_decision_on_same_iteration_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let iteration_id = seeded_iteration(&store);
        let make = || ArbiterDecision {
            id: DecisionId::new(),
            iteration_id: iteration_id.clone(),
            decision: ArbiterDecisionKind::Iterate,
            feedback: None,
            address_issues: None,
            focus_files: None,
            decided_at: chrono::Utc::now(),
            decided_by: "human".into(),
        };
        store.record_decision(&make()).unwrap();
        let second = store.record_decision(&make());
        assert!(second.is_err());
    }
}
