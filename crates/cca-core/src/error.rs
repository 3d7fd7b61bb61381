//! Engine-wide error taxonomy (spec §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid parameter '{field}': {message}")]
    InvalidParams { field: String, message: String },

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("iteration '{0}' not found")]
    IterationNotFound(String),

    #[error("execution '{0}' not found")]
    ExecutionNotFound(String),

    #[error("workflow '{0}' not found")]
    WorkflowNotFound(String),

    #[error("agent '{0}' not found")]
    AgentNotFound(String),

    #[error("theme '{0}' not found")]
    ThemeNotFound(String),

    #[error("validation failed: {0:?}")]
    ValidationFailed(Vec<String>),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    #[error("tool '{tool}' timed out after {timeout_secs}s")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("tool '{tool}' failed: {message}")]
    ToolHandlerError { tool: String, message: String },

    #[error("critic pipeline error: {0}")]
    CriticPipelineError(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("workflow execution stalled: {0}")]
    WorkflowStall(String),

    #[error("engine not initialized")]
    NotInitialized,

    #[error("agent '{0}' already exists")]
    AgentExists(String),

    #[error("agent '{0}' is busy")]
    AgentBusy(String),

    #[error("failed to deliver message: {0}")]
    MessageFailed(String),

    #[error("memory error: {0}")]
    MemoryError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns true for errors that are recovered locally and should
    /// continue the containing loop (spec §7 propagation policy) rather
    /// than aborting the execution.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::PermissionDenied(_)
                | AppError::ToolTimeout { .. }
                | AppError::ToolHandlerError { .. }
                | AppError::CriticPipelineError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors_are_flagged() {
        assert!(AppError::PermissionDenied("no".into()).is_recoverable());
        assert!(
            AppError::ToolTimeout {
                tool: "shell-exec".into(),
                timeout_secs: 120
            }
            .is_recoverable()
        );
        assert!(!AppError::NotInitialized.is_recoverable());
    }

    #[test]
    fn store_error_converts_via_from() {
        let sqlite_err = rusqlite::Error::QueryReturnedNoRows;
        let err: AppError = sqlite_err.into();
        assert!(matches!(err, AppError::Store(_)));
    }

    #[test]
    fn display_session_not_found() {
        let err = AppError::SessionNotFound("sess-123".into());
        assert_eq!(err.to_string(), "session 'sess-123' not found");
    }
}
