use crate::glob::{pattern_to_regex, walk_files};
use crate::handler::{ToolContext, ToolHandler};
use async_trait::async_trait;
use cca_context::RawResult;
use cca_core::AppError;

pub struct FileGlobHandler;

#[async_trait]
impl ToolHandler for FileGlobHandler {
    fn name(&self) -> &'static str {
        "file-glob"
    }

    fn requires_permission(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        input: &serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<RawResult, AppError> {
        let pattern = input
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidParams {
                field: "pattern".into(),
                message: "required".into(),
            })?;
        let base = input
            .get("base_path")
            .and_then(|v| v.as_str())
            .map(|p| ctx.resolve(p))
            .unwrap_or_else(|| ctx.workspace_root.clone());
        let regex = pattern_to_regex(pattern);
        let entries = walk_files(&base)
            .into_iter()
            .filter_map(|path| {
                let relative = path.strip_prefix(&base).unwrap_or(&path);
                let relative_str = relative.to_string_lossy().replace('\\', "/");
                regex.is_match(&relative_str).then_some(relative_str)
            })
            .collect();
        Ok(RawResult::List {
            entries,
            omitted_by_file: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[tokio::test]
    async fn matches_nested_files_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/nested/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();
        let ctx = ToolContext {
            workspace_root: dir.path().to_path_buf(),
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        let handler = FileGlobHandler;
        let result = handler
            .execute(&serde_json::json!({"pattern": "**/*.rs"}), &ctx)
            .await
            .unwrap();
        match result {
            RawResult::List { entries, .. } => assert_eq!(entries.len(), 2),
            _ => panic!("expected list result"),
        }
    }
}
