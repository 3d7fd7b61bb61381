//! Schema migration runner (spec §4.1).
//!
//! Migrations are applied in order inside one transaction; `user_version`
//! records the highest version applied. A legacy (pre-migration) database
//! file is detected by probing for a table the current schema requires and,
//! if missing after all migrations would have created it, backed up aside
//! and recreated fresh.

use rusqlite::Connection;

pub struct Migration {
    pub version: u32,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
        CREATE TABLE sessions (
            id TEXT PRIMARY KEY,
            task TEXT NOT NULL,
            status TEXT NOT NULL,
            coder_agent TEXT NOT NULL,
            coder_model TEXT NOT NULL,
            workspace_path TEXT NOT NULL,
            config_snapshot TEXT NOT NULL,
            created_at TEXT NOT NULL,
            completed_at TEXT
        );

        CREATE TABLE iterations (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES sessions(id),
            number INTEGER NOT NULL,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            UNIQUE(session_id, number)
        );
        CREATE INDEX idx_iterations_session ON iterations(session_id);

        CREATE TABLE proposed_changes (
            id TEXT PRIMARY KEY,
            iteration_id TEXT NOT NULL REFERENCES iterations(id),
            file_path TEXT NOT NULL,
            operation TEXT NOT NULL,
            original_content TEXT,
            new_content TEXT,
            diff TEXT,
            status TEXT NOT NULL
        );
        CREATE INDEX idx_changes_iteration ON proposed_changes(iteration_id);

        CREATE TABLE critic_reviews (
            id TEXT PRIMARY KEY,
            change_id TEXT NOT NULL REFERENCES proposed_changes(id),
            critic_id TEXT NOT NULL,
            critic_name TEXT NOT NULL,
            provider TEXT NOT NULL,
            verdict TEXT NOT NULL,
            message TEXT NOT NULL,
            issues TEXT NOT NULL,
            UNIQUE(change_id, critic_id)
        );
        CREATE INDEX idx_reviews_change ON critic_reviews(change_id);

        CREATE TABLE arbiter_decisions (
            id TEXT PRIMARY KEY,
            iteration_id TEXT NOT NULL UNIQUE REFERENCES iterations(id),
            decision TEXT NOT NULL,
            feedback TEXT,
            address_issues TEXT,
            focus_files TEXT,
            decided_at TEXT NOT NULL,
            decided_by TEXT NOT NULL
        );

        CREATE TABLE tool_calls (
            id TEXT PRIMARY KEY,
            execution_id TEXT NOT NULL,
            node_execution_id TEXT,
            tool_name TEXT NOT NULL,
            input TEXT NOT NULL,
            output TEXT,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT
        );
        CREATE INDEX idx_tool_calls_execution ON tool_calls(execution_id);

        CREATE TABLE context_items (
            id TEXT PRIMARY KEY,
            execution_id TEXT NOT NULL,
            node_execution_id TEXT NOT NULL,
            item_type TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            agent_id TEXT,
            agent_name TEXT,
            tokens INTEGER NOT NULL,
            compacted_into_id TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX idx_context_items_execution ON context_items(execution_id);

        CREATE TABLE workflow_executions (
            id TEXT PRIMARY KEY,
            workflow_id TEXT NOT NULL,
            status TEXT NOT NULL,
            current_node_id TEXT,
            iteration INTEGER NOT NULL,
            chat_session_id TEXT,
            started_at TEXT NOT NULL,
            completed_at TEXT
        );
        CREATE INDEX idx_executions_workflow ON workflow_executions(workflow_id);

        CREATE TABLE checkpoints (
            id TEXT PRIMARY KEY,
            execution_id TEXT NOT NULL REFERENCES workflow_executions(id),
            node_execution_id TEXT NOT NULL,
            prompt TEXT NOT NULL,
            status TEXT NOT NULL,
            decision TEXT,
            feedback TEXT,
            responded_at TEXT
        );
        CREATE INDEX idx_checkpoints_execution ON checkpoints(execution_id);

        CREATE TABLE stored_results (
            id TEXT PRIMARY KEY,
            tool_name TEXT NOT NULL,
            original_input TEXT NOT NULL,
            full_result TEXT NOT NULL,
            size_chars INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE permissions (
            id TEXT PRIMARY KEY,
            scope TEXT NOT NULL,
            workspace TEXT,
            session_id TEXT,
            execution_id TEXT,
            workflow_id TEXT,
            tool_name TEXT NOT NULL,
            match_pattern TEXT,
            granted INTEGER NOT NULL,
            expires_at TEXT
        );
        CREATE INDEX idx_permissions_scope ON permissions(scope, tool_name);
        "#,
    },
];

/// Tables that must exist once every migration has run; used to detect a
/// legacy, pre-migration database file.
const EXPECTED_TABLES: &[&str] = &[
    "sessions",
    "iterations",
    "proposed_changes",
    "critic_reviews",
    "arbiter_decisions",
    "tool_calls",
    "context_items",
    "workflow_executions",
    "checkpoints",
    "stored_results",
    "permissions",
];

pub fn is_legacy_layout(conn: &Connection) -> rusqlite::Result<bool> {
    for table in EXPECTED_TABLES {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            [table],
            |row| row.get(0),
        )?;
        if !exists {
            let user_version: u32 =
                conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
            if user_version > 0 {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    let current_version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| m.version > current_version)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }
    let tx = conn.transaction()?;
    let mut highest = current_version;
    for migration in pending {
        tx.execute_batch(migration.sql)?;
        highest = highest.max(migration.version);
    }
    tx.pragma_update(None, "user_version", highest)?;
    tx.commit()
}
