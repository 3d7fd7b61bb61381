use crate::connection::Store;
use cca_core::{AppError, ChangeId, ChangeOperation, ChangeStatus, IterationId, ProposedChange};
use rusqlite::{params, OptionalExtension};

impl Store {
    pub fn create_change(&self, change: &ProposedChange) -> Result<(), AppError> {
        if !change.is_well_formed() {
            return Err(AppError::InvalidParams {
                field: "original_content".into(),
                message: "must be present iff operation is modify or delete".into(),
            });
        }
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO proposed_changes (id, iteration_id, file_path, operation, original_content, new_content, diff, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    change.id.as_str(),
                    change.iteration_id.as_str(),
                    change.file_path,
                    operation_str(change.operation),
                    change.original_content,
                    change.new_content,
                    change.diff,
                    status_str(change.status),
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_change_status(&self, id: &ChangeId, status: ChangeStatus) -> Result<(), AppError> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE proposed_changes SET status = ?1 WHERE id = ?2",
                params![status_str(status), id.as_str()],
            )?;
            if updated == 0 {
                return Err(AppError::Internal(format!("change '{id}' not found")));
            }
            Ok(())
        })
    }

    pub fn list_changes_for_iteration(
        &self,
        iteration_id: &IterationId,
    ) -> Result<Vec<ProposedChange>, AppError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, iteration_id, file_path, operation, original_content, new_content, diff, status
                 FROM proposed_changes WHERE iteration_id = ?1",
            )?;
            let rows = stmt.query_map([iteration_id.as_str()], row_to_change)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
        })
    }

    pub fn get_change(&self, id: &ChangeId) -> Result<Option<ProposedChange>, AppError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, iteration_id, file_path, operation, original_content, new_content, diff, status
                 FROM proposed_changes WHERE id = ?1",
                [id.as_str()],
                row_to_change,
            )
            .optional()
            .map_err(AppError::from)
        })
    }
}

fn operation_str(op: ChangeOperation) -> &'static str {
    match op {
        ChangeOperation::Create => "create",
        ChangeOperation::Modify => "modify",
        ChangeOperation::Delete => "delete",
    }
}

fn parse_operation(s: &str) -> rusqlite::Result<ChangeOperation> {
    Ok(match s {
        "create" => ChangeOperation::Create,
        "modify" => ChangeOperation::Modify,
        "delete" => ChangeOperation::Delete,
        other => return Err(bad_enum("operation", other)),
    })
}

fn status_str(status: ChangeStatus) -> &'static str {
    match status {
        ChangeStatus::Proposed => "proposed",
        ChangeStatus::Approved => "approved",
        ChangeStatus::Rejected => "rejected",
        ChangeStatus::Applied => "applied",
        ChangeStatus::Reverted => "reverted",
    }
}

fn parse_status(s: &str) -> rusqlite::Result<ChangeStatus> {
    Ok(match s {
        "proposed" => ChangeStatus::Proposed,
        "approved" => ChangeStatus::Approved,
        "rejected" => ChangeStatus::Rejected,
        "applied" => ChangeStatus::Applied,
        "reverted" => ChangeStatus::Reverted,
        other => return Err(bad_enum("status", other)),
    })
}

fn bad_enum(field: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(
        0,
        format!("unknown {field} '{value}'"),
        rusqlite::types::Type::Text,
    )
}

fn row_to_change(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProposedChange> {
    Ok(ProposedChange {
        id: ChangeId::from_raw(row.get::<_, String>(0)?),
        iteration_id: IterationId::from_raw(row.get::<_, String>(1)?),
        file_path: row.get(2)?,
        operation: parse_operation(&row.get::<_, String>(3)?)?,
        original_content: row.get(4)?,
        new_content: row.get(5)?,
        diff: row.get(6)?,
        status: parse_status(&row.get::<_, String>(7)?)?,
    })
}
