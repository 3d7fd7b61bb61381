use crate::handler::{ToolContext, ToolHandler};
use async_trait::async_trait;
use cca_context::RawResult;
use cca_core::AppError;

pub struct FileEditHandler;

#[async_trait]
impl ToolHandler for FileEditHandler {
    fn name(&self) -> &'static str {
        "file-edit"
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
            .ok_or_else(|| missing("path"))?;
        let old_string = input
            .get("old_string")
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing("old_string"))?;
        let new_string = input
            .get("new_string")
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing("new_string"))?;
        let replace_all = input
            .get("replace_all")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let resolved = ctx.resolve(path);
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| AppError::ToolHandlerError {
                tool: self.name().into(),
                message: e.to_string(),
            })?;
        if !content.contains(old_string) {
            return Err(AppError::ToolHandlerError {
                tool: self.name().into(),
                message: format!("old string not found in {path}"),
            });
        }
        let occurrences = content.matches(old_string).count();
        let updated = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };
        tokio::fs::write(&resolved, &updated)
            .await
            .map_err(|e| AppError::ToolHandlerError {
                tool: self.name().into(),
                message: e.to_string(),
            })?;
        let replaced = if replace_all { occurrences } else { 1 };
        Ok(RawResult::Text(format!("replaced {replaced} occurrence(s) in {path}")))
    }
}

fn missing(field: &str) -> AppError {
    AppError::InvalidParams {
        field: field.into(),
        message: "required".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn ctx(dir: &tempfile::TempDir) -> ToolContext {
        ToolContext {
            workspace_root: dir.path().to_path_buf(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    #[tokio::test]
    async fn replaces_first_occurrence_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "foo foo foo").unwrap();
        let handler = FileEditHandler;
        handler
            .execute(
                &serde_json::json!({"path": "a.rs", "old_string": "foo", "new_string": "bar"}),
                &ctx(&dir),
            )
            .await
            .unwrap();
        let updated = std::fs::read_to_string(dir.path().join("a.rs")).unwrap();
        assert_eq!(updated, "bar foo foo");
    }

    #[tokio::test]
    async fn replace_all_replaces_every_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "foo foo foo").unwrap();
        let handler = FileEditHandler;
        handler
            .execute(
                &serde_json::json!({"path": "a.rs", "old_string": "foo", "new_string": "bar", "replace_all": true}),
                &ctx(&dir),
            )
            .await
            .unwrap();
        let updated = std::fs::read_to_string(dir.path().join("a.rs")).unwrap();
        assert_eq!(updated, "bar bar bar");
    }

    #[tokio::test]
    async fn missing_old_string_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "hello").unwrap();
        let handler = FileEditHandler;
        let result = handler
            .execute(
                &serde_json::json!({"path": "a.rs", "old_string": "absent", "new_string": "x"}),
                &ctx(&dir),
            )
            .await;
        assert!(matches!(result, Err(AppError::ToolHandlerError { .. })));
    }
}
