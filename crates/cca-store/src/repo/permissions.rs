use crate::connection::Store;
use crate::repo::sessions::parse_ts;
use cca_core::{AppError, ExecutionId, Permission, PermissionId, PermissionScope, SessionId, WorkflowId};
use rusqlite::params;

impl Store {
    /// `once`-scoped permissions never reach this call — the permission
    /// evaluator resolves and discards them in memory (spec §3 invariant).
    pub fn create_permission(&self, permission: &Permission) -> Result<(), AppError> {
        debug_assert!(
            permission.scope != PermissionScope::Once,
            "once-scoped permissions must not be persisted"
        );
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO permissions (id, scope, workspace, session_id, execution_id, workflow_id, tool_name, match_pattern, granted, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    permission.id.as_str(),
                    scope_str(permission.scope),
                    permission.workspace,
                    permission.session_id.as_ref().map(|id| id.as_str()),
                    permission.execution_id.as_ref().map(|id| id.as_str()),
                    permission.workflow_id.as_ref().map(|id| id.as_str()),
                    permission.tool_name,
                    permission.match_pattern,
                    permission.granted,
                    permission.expires_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
    }

    /// All persisted (non-`once`) permissions bearing on a tool call in a
    /// given session/execution/workspace, for the permission evaluator to
    /// rank by scope.
    pub fn list_permissions_for_tool(&self, tool_name: &str) -> Result<Vec<Permission>, AppError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, scope, workspace, session_id, execution_id, workflow_id, tool_name, match_pattern, granted, expires_at
                 FROM permissions WHERE tool_name = ?1",
            )?;
            let rows = stmt.query_map([tool_name], row_to_permission)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
        })
    }

    pub fn delete_permission(&self, id: &PermissionId) -> Result<(), AppError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM permissions WHERE id = ?1", [id.as_str()])?;
            Ok(())
        })
    }
}

fn scope_str(scope: PermissionScope) -> &'static str {
    match scope {
        PermissionScope::Once => "once",
        PermissionScope::Session => "session",
        PermissionScope::Folder => "folder",
        PermissionScope::Global => "global",
    }
}

fn parse_scope(s: &str) -> rusqlite::Result<PermissionScope> {
    Ok(match s {
        "once" => PermissionScope::Once,
        "session" => PermissionScope::Session,
        "folder" => PermissionScope::Folder,
        "global" => PermissionScope::Global,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                0,
                format!("unknown permission scope '{other}'"),
                rusqlite::types::Type::Text,
            ))
        }
    })
}

fn row_to_permission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Permission> {
    Ok(Permission {
        id: PermissionId::from_raw(row.get::<_, String>(0)?),
        scope: parse_scope(&row.get::<_, String>(1)?)?,
        workspace: row.get(2)?,
        session_id: row.get::<_, Option<String>>(3)?.map(SessionId::from_raw),
        execution_id: row.get::<_, Option<String>>(4)?.map(ExecutionId::from_raw),
        workflow_id: row.get::<_, Option<String>>(5)?.map(WorkflowId::from_raw),
        tool_name: row.get(6)?,
        match_pattern: row.get(7)?,
        granted: row.get(8)?,
        expires_at: row.get::<_, Option<String>>(9)?.map(|s| parse_ts(&s)),
    })
}
