use crate::connection::Store;
use cca_core::{AppError, Session, SessionId, SessionStatus};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

impl Store {
    pub fn create_session(&self, session: &Session) -> Result<(), AppError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, task, status, coder_agent, coder_model, workspace_path, config_snapshot, created_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    session.id.as_str(),
                    session.task,
                    status_str(session.status),
                    session.coder_agent,
                    session.coder_model,
                    session.workspace_path,
                    serde_json::to_string(&session.config_snapshot)?,
                    session.created_at.to_rfc3339(),
                    session.completed_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, id: &SessionId) -> Result<Option<Session>, AppError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, task, status, coder_agent, coder_model, workspace_path, config_snapshot, created_at, completed_at
                 FROM sessions WHERE id = ?1",
                [id.as_str()],
                row_to_session,
            )
            .optional()
            .map_err(AppError::from)
        })
    }

    pub fn update_session_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
    ) -> Result<(), AppError> {
        self.with_conn(|conn| {
            let completed_at = matches!(
                status,
                SessionStatus::Completed | SessionStatus::Error
            )
            .then(|| Utc::now().to_rfc3339());
            let updated = conn.execute(
                "UPDATE sessions SET status = ?1, completed_at = COALESCE(?2, completed_at) WHERE id = ?3",
                params![status_str(status), completed_at, id.as_str()],
            )?;
            if updated == 0 {
                return Err(AppError::SessionNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    pub fn list_sessions(&self) -> Result<Vec<Session>, AppError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task, status, coder_agent, coder_model, workspace_path, config_snapshot, created_at, completed_at
                 FROM sessions ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map([], row_to_session)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
        })
    }
}

fn status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Running => "running",
        SessionStatus::Paused => "paused",
        SessionStatus::Completed => "completed",
        SessionStatus::Error => "error",
    }
}

fn parse_status(s: &str) -> rusqlite::Result<SessionStatus> {
    Ok(match s {
        "running" => SessionStatus::Running,
        "paused" => SessionStatus::Paused,
        "completed" => SessionStatus::Completed,
        "error" => SessionStatus::Error,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                0,
                format!("unknown session status '{other}'"),
                rusqlite::types::Type::Text,
            ))
        }
    })
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let config_raw: String = row.get(6)?;
    Ok(Session {
        id: SessionId::from_raw(row.get::<_, String>(0)?),
        task: row.get(1)?,
        status: parse_status(&row.get::<_, String>(2)?)?,
        coder_agent: row.get(3)?,
        coder_model: row.get(4)?,
        workspace_path: row.get(5)?,
        config_snapshot: serde_json::from_str(&config_raw).unwrap_or(serde_json::Value::Null),
        created_at: parse_ts(&row.get::<_, String>(7)?),
        completed_at: row.get::<_, Option<String>>(8)?.map(|s| parse_ts(&s)),
    })
}

pub(crate) fn parse_ts(s: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
