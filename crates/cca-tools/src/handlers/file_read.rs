use crate::handler::{ToolContext, ToolHandler};
use async_trait::async_trait;
use cca_context::RawResult;
use cca_core::AppError;

pub struct FileReadHandler;

#[async_trait]
impl ToolHandler for FileReadHandler {
    fn name(&self) -> &'static str {
        "file-read"
    }

    fn requires_permission(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        input: &serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<RawResult, AppError> {
        let path = input
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidParams {
                field: "path".into(),
                message: "required".into(),
            })?;
        let content = tokio::fs::read_to_string(ctx.resolve(path))
            .await
            .map_err(|e| AppError::ToolHandlerError {
                tool: self.name().into(),
                message: e.to_string(),
            })?;
        Ok(RawResult::Text(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[tokio::test]
    async fn reads_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let ctx = ToolContext {
            workspace_root: dir.path().to_path_buf(),
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        let handler = FileReadHandler;
        let result = handler
            .execute(&serde_json::json!({"path": "a.txt"}), &ctx)
            .await
            .unwrap();
        match result {
            RawResult::Text(content) => assert_eq!(content, "hello"),
            _ => panic!("expected text result"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_a_handler_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext {
            workspace_root: dir.path().to_path_buf(),
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        let handler = FileReadHandler;
        let result = handler
            .execute(&serde_json::json!({"path": "missing.txt"}), &ctx)
            .await;
        assert!(matches!(result, Err(AppError::ToolHandlerError { .. })));
    }
}
