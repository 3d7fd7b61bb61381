use crate::connection::Store;
use crate::repo::sessions::parse_ts;
use cca_core::{AppError, ExecutionId, NodeExecutionId, ToolCall, ToolCallId, ToolCallStatus};
use rusqlite::{params, OptionalExtension};

impl Store {
    pub fn create_tool_call(&self, call: &ToolCall) -> Result<(), AppError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tool_calls (id, execution_id, node_execution_id, tool_name, input, output, status, started_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    call.id.as_str(),
                    call.execution_id.as_str(),
                    call.node_execution_id.as_ref().map(|id| id.as_str()),
                    call.tool_name,
                    serde_json::to_string(&call.input)?,
                    call.output.as_ref().map(serde_json::to_string).transpose()?,
                    status_str(call.status),
                    call.started_at.to_rfc3339(),
                    call.completed_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_tool_call_result(
        &self,
        id: &ToolCallId,
        status: ToolCallStatus,
        output: Option<serde_json::Value>,
    ) -> Result<(), AppError> {
        self.with_conn(|conn| {
            let output_raw = output.as_ref().map(serde_json::to_string).transpose()?;
            let updated = conn.execute(
                "UPDATE tool_calls SET status = ?1, output = ?2, completed_at = ?3 WHERE id = ?4",
                params![
                    status_str(status),
                    output_raw,
                    chrono::Utc::now().to_rfc3339(),
                    id.as_str()
                ],
            )?;
            if updated == 0 {
                return Err(AppError::Internal(format!("tool call '{id}' not found")));
            }
            Ok(())
        })
    }

    pub fn list_tool_calls_for_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Vec<ToolCall>, AppError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, execution_id, node_execution_id, tool_name, input, output, status, started_at, completed_at
                 FROM tool_calls WHERE execution_id = ?1 ORDER BY started_at ASC",
            )?;
            let rows = stmt.query_map([execution_id.as_str()], row_to_tool_call)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
        })
    }

    pub fn get_tool_call(&self, id: &ToolCallId) -> Result<Option<ToolCall>, AppError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, execution_id, node_execution_id, tool_name, input, output, status, started_at, completed_at
                 FROM tool_calls WHERE id = ?1",
                [id.as_str()],
                row_to_tool_call,
            )
            .optional()
            .map_err(AppError::from)
        })
    }
}

fn status_str(status: ToolCallStatus) -> &'static str {
    match status {
        ToolCallStatus::Pending => "pending",
        ToolCallStatus::AwaitingPermission => "awaiting_permission",
        ToolCallStatus::Approved => "approved",
        ToolCallStatus::Denied => "denied",
        ToolCallStatus::Running => "running",
        ToolCallStatus::Success => "success",
        ToolCallStatus::Error => "error",
    }
}

fn parse_status(s: &str) -> rusqlite::Result<ToolCallStatus> {
    Ok(match s {
        "pending" => ToolCallStatus::Pending,
        "awaiting_permission" => ToolCallStatus::AwaitingPermission,
        "approved" => ToolCallStatus::Approved,
        "denied" => ToolCallStatus::Denied,
        "running" => ToolCallStatus::Running,
        "success" => ToolCallStatus::Success,
        "error" => ToolCallStatus::Error,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                0,
                format!("unknown tool call status '{other}'"),
                rusqlite::types::Type::Text,
            ))
        }
    })
}

fn row_to_tool_call(row: &rusqlite::Row<'_>) -> rusqlite::Result<ToolCall> {
    let input_raw: String = row.get(4)?;
    let output_raw: Option<String> = row.get(5)?;
    Ok(ToolCall {
        id: ToolCallId::from_raw(row.get::<_, String>(0)?),
        execution_id: ExecutionId::from_raw(row.get::<_, String>(1)?),
        node_execution_id: row.get::<_, Option<String>>(2)?.map(NodeExecutionId::from_raw),
        tool_name: row.get(3)?,
        input: serde_json::from_str(&input_raw).unwrap_or(serde_json::Value::Null),
        output: output_raw.and_then(|s| serde_json::from_str(&s).ok()),
        status: parse_status(&row.get::<_, String>(6)?)?,
        started_at: parse_ts(&row.get::<_, String>(7)?),
        completed_at: row.get::<_, Option<String>>(8)?.map(|s| parse_ts(&s)),
    })
}
