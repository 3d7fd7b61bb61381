use crate::connection::Store;
use crate::repo::sessions::parse_ts;
use cca_core::{AppError, Iteration, IterationId, IterationStatus, SessionId};
use rusqlite::{params, OptionalExtension};

impl Store {
    /// Creates the next contiguous iteration for a session inside a single
    /// transaction so the monotonic-number invariant (spec §3) holds even
    /// under concurrent callers.
    pub fn start_next_iteration(&self, session_id: &SessionId) -> Result<Iteration, AppError> {
        self.with_transaction(|tx| {
            let current_max: Option<i64> = tx
                .query_row(
                    "SELECT MAX(number) FROM iterations WHERE session_id = ?1",
                    [session_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            let number = current_max.unwrap_or(0) + 1;
            let iteration = Iteration {
                id: IterationId::new(),
                session_id: session_id.clone(),
                number: number as u32,
                status: IterationStatus::Coding,
                started_at: chrono::Utc::now(),
                completed_at: None,
            };
            tx.execute(
                "INSERT INTO iterations (id, session_id, number, status, started_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    iteration.id.as_str(),
                    iteration.session_id.as_str(),
                    iteration.number,
                    status_str(iteration.status),
                    iteration.started_at.to_rfc3339(),
                    Option::<String>::None,
                ],
            )?;
            Ok(iteration)
        })
    }

    pub fn get_iteration(&self, id: &IterationId) -> Result<Option<Iteration>, AppError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, session_id, number, status, started_at, completed_at FROM iterations WHERE id = ?1",
                [id.as_str()],
                row_to_iteration,
            )
            .optional()
            .map_err(AppError::from)
        })
    }

    pub fn update_iteration_status(
        &self,
        id: &IterationId,
        status: IterationStatus,
    ) -> Result<(), AppError> {
        self.with_conn(|conn| {
            let completed_at = matches!(status, IterationStatus::Completed)
                .then(|| chrono::Utc::now().to_rfc3339());
            let updated = conn.execute(
                "UPDATE iterations SET status = ?1, completed_at = COALESCE(?2, completed_at) WHERE id = ?3",
                params![status_str(status), completed_at, id.as_str()],
            )?;
            if updated == 0 {
                return Err(AppError::IterationNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    pub fn list_iterations(&self, session_id: &SessionId) -> Result<Vec<Iteration>, AppError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, number, status, started_at, completed_at FROM iterations WHERE session_id = ?1 ORDER BY number ASC",
            )?;
            let rows = stmt.query_map([session_id.as_str()], row_to_iteration)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
        })
    }
}

fn status_str(status: IterationStatus) -> &'static str {
    match status {
        IterationStatus::Coding => "coding",
        IterationStatus::Reviewing => "reviewing",
        IterationStatus::Deciding => "deciding",
        IterationStatus::Completed => "completed",
    }
}

fn parse_status(s: &str) -> rusqlite::Result<IterationStatus> {
    Ok(match s {
        "coding" => IterationStatus::Coding,
        "reviewing" => IterationStatus::Reviewing,
        "deciding" => IterationStatus::Deciding,
        "completed" => IterationStatus::Completed,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                0,
                format!("unknown iteration status '{other}'"),
                rusqlite::types::Type::Text,
            ))
        }
    })
}

fn row_to_iteration(row: &rusqlite::Row<'_>) -> rusqlite::Result<Iteration> {
    Ok(Iteration {
        id: IterationId::from_raw(row.get::<_, String>(0)?),
        session_id: SessionId::from_raw(row.get::<_, String>(1)?),
        number: row.get::<_, i64>(2)? as u32,
        status: parse_status(&row.get::<_, String>(3)?)?,
        started_at: parse_ts(&row.get::<_, String>(4)?),
        completed_at: row.get::<_, Option<String>>(5)?.map(|s| parse_ts(&s)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cca_core::{Session, SessionStatus};

    fn seeded_store() -> (Store, SessionId) {
        let store = Store::open_in_memory().unwrap();
        let session = Session {
            id: SessionId::new(),
            task: "t".into(),
            status: SessionStatus::Running,
            coder_agent: "coder".into(),
            coder_model: "m".into(),
            workspace_path: "/tmp".into(),
            config_snapshot: serde_json::json!({}),
            created_at: chrono::Utc::now(),
            completed_at: None,
        };
        store.create_session(&session).unwrap();
        (store, session.id)
    }

    #[test]
    fn iteration_numbers_are_contiguous_and_monotonic() {
        let (store, session_id) = seeded_store();
        let first = store.start_next_iteration(&session_id).unwrap();
        let second = store.start_next_iteration(&session_id).unwrap();
        let third = store.start_next_iteration(&session_id).unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert_eq!(third.number, 3);
    }

    #[test]
    fn iterations_are_scoped_per_session() {
        let (store, _session_id) = seeded_store();
        let other_session = SessionId::new();
        store
            .create_session(&cca_core::Session {
                id: other_session.clone(),
                task: "other".into(),
                status: SessionStatus::Running,
                coder_agent: "coder".into(),
                coder_model: "m".into(),
                workspace_path: "/tmp".into(),
                config_snapshot: serde_json::json!({}),
                created_at: chrono::Utc::now(),
                completed_at: None,
            })
            .unwrap();
        let iter = store.start_next_iteration(&other_session).unwrap();
        assert_eq!(iter.number, 1);
    }

    #[test]
    fn update_status_on_missing_iteration_errors() {
        let store = Store::open_in_memory().unwrap();
        let result =
            store.update_iteration_status(&IterationId::new(), IterationStatus::Completed);
        assert!(matches!(result, Err(AppError::IterationNotFound(_))));
    }
}
