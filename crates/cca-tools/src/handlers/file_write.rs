use crate::handler::{ToolContext, ToolHandler};
use async_trait::async_trait;
use cca_context::RawResult;
use cca_core::AppError;

pub struct FileWriteHandler;

#[async_trait]
impl ToolHandler for FileWriteHandler {
    fn name(&self) -> &'static str {
        "file-write"
    }

    fn requires_permission(&self) -> bool {
        true
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
        let content = input
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidParams {
                field: "content".into(),
                message: "required".into(),
            })?;
        let resolved = ctx.resolve(path);
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::ToolHandlerError {
                    tool: self.name().into(),
                    message: e.to_string(),
                })?;
        }
        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| AppError::ToolHandlerError {
                tool: self.name().into(),
                message: e.to_string(),
            })?;
        Ok(RawResult::Text(format!("wrote {} bytes to {path}", content.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[tokio::test]
    async fn creates_parent_directories_and_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext {
            workspace_root: dir.path().to_path_buf(),
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        let handler = FileWriteHandler;
        handler
            .execute(
                &serde_json::json!({"path": "nested/dir/file.txt", "content": "data"}),
                &ctx,
            )
            .await
            .unwrap();
        let written = std::fs::read_to_string(dir.path().join("nested/dir/file.txt")).unwrap();
        assert_eq!(written, "data");
    }

    #[test]
    fn requires_permission_is_true() {
        assert!(FileWriteHandler.requires_permission());
    }
}
