use crate::connection::Store;
use crate::repo::sessions::parse_ts;
use cca_core::{AgentId, AppError, ContextItem, ContextItemId, ContextItemType, ContextRole, ExecutionId, NodeExecutionId};
use rusqlite::params;

impl Store {
    pub fn append_context_item(&self, item: &ContextItem) -> Result<(), AppError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO context_items (id, execution_id, node_execution_id, item_type, role, content, agent_id, agent_name, tokens, compacted_into_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    item.id.as_str(),
                    item.execution_id.as_str(),
                    item.node_execution_id.as_str(),
                    item_type_str(item.item_type),
                    role_str(item.role),
                    item.content,
                    item.agent_id.as_ref().map(|id| id.as_str()),
                    item.agent_name,
                    item.tokens,
                    item.compacted_into_id.as_ref().map(|id| id.as_str()),
                    item.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Active (non-compacted) items for an execution, in creation order —
    /// what the workflow executor hands to an agent as its live context.
    pub fn list_active_context_items(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Vec<ContextItem>, AppError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, execution_id, node_execution_id, item_type, role, content, agent_id, agent_name, tokens, compacted_into_id, created_at
                 FROM context_items WHERE execution_id = ?1 AND compacted_into_id IS NULL ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map([execution_id.as_str()], row_to_item)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
        })
    }

    /// Marks a set of items as compacted into a newly-inserted summary
    /// item, atomically (spec §4.7 compaction strategies).
    pub fn compact_context_items(
        &self,
        source_ids: &[ContextItemId],
        summary: &ContextItem,
    ) -> Result<(), AppError> {
        self.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO context_items (id, execution_id, node_execution_id, item_type, role, content, agent_id, agent_name, tokens, compacted_into_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    summary.id.as_str(),
                    summary.execution_id.as_str(),
                    summary.node_execution_id.as_str(),
                    item_type_str(summary.item_type),
                    role_str(summary.role),
                    summary.content,
                    summary.agent_id.as_ref().map(|id| id.as_str()),
                    summary.agent_name,
                    summary.tokens,
                    Option::<&str>::None,
                    summary.created_at.to_rfc3339(),
                ],
            )?;
            for id in source_ids {
                tx.execute(
                    "UPDATE context_items SET compacted_into_id = ?1 WHERE id = ?2",
                    params![summary.id.as_str(), id.as_str()],
                )?;
            }
            Ok(())
        })
    }

    /// Reverses a compaction: clears `compacted_into_id` on every item
    /// that pointed at `summary_id` and deletes the summary item itself.
    pub fn expand_compaction(&self, summary_id: &ContextItemId) -> Result<(), AppError> {
        self.with_transaction(|tx| {
            tx.execute(
                "UPDATE context_items SET compacted_into_id = NULL WHERE compacted_into_id = ?1",
                params![summary_id.as_str()],
            )?;
            tx.execute("DELETE FROM context_items WHERE id = ?1", params![summary_id.as_str()])?;
            Ok(())
        })
    }
}

fn item_type_str(item_type: ContextItemType) -> &'static str {
    match item_type {
        ContextItemType::System => "system",
        ContextItemType::UserInput => "user_input",
        ContextItemType::AgentOutput => "agent_output",
        ContextItemType::ToolCall => "tool_call",
        ContextItemType::ToolResult => "tool_result",
        ContextItemType::Compaction => "compaction",
    }
}

fn parse_item_type(s: &str) -> rusqlite::Result<ContextItemType> {
    Ok(match s {
        "system" => ContextItemType::System,
        "user_input" => ContextItemType::UserInput,
        "agent_output" => ContextItemType::AgentOutput,
        "tool_call" => ContextItemType::ToolCall,
        "tool_result" => ContextItemType::ToolResult,
        "compaction" => ContextItemType::Compaction,
        other => return Err(bad_enum(other)),
    })
}

fn role_str(role: ContextRole) -> &'static str {
    match role {
        ContextRole::System => "system",
        ContextRole::User => "user",
        ContextRole::Assistant => "assistant",
    }
}

fn parse_role(s: &str) -> rusqlite::Result<ContextRole> {
    Ok(match s {
        "system" => ContextRole::System,
        "user" => ContextRole::User,
        "assistant" => ContextRole::Assistant,
        other => return Err(bad_enum(other)),
    })
}

fn bad_enum(value: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(0, format!("unknown value '{value}'"), rusqlite::types::Type::Text)
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContextItem> {
    Ok(ContextItem {
        id: ContextItemId::from_raw(row.get::<_, String>(0)?),
        execution_id: ExecutionId::from_raw(row.get::<_, String>(1)?),
        node_execution_id: NodeExecutionId::from_raw(row.get::<_, String>(2)?),
        item_type: parse_item_type(&row.get::<_, String>(3)?)?,
        role: parse_role(&row.get::<_, String>(4)?)?,
        content: row.get(5)?,
        agent_id: row.get::<_, Option<String>>(6)?.map(AgentId::from_raw),
        agent_name: row.get(7)?,
        tokens: row.get::<_, i64>(8)? as u32,
        compacted_into_id: row.get::<_, Option<String>>(9)?.map(ContextItemId::from_raw),
        created_at: parse_ts(&row.get::<_, String>(10)?),
    })
}
