use crate::glob::walk_files;
use crate::handler::{ToolContext, ToolHandler};
use async_trait::async_trait;
use cca_context::RawResult;
use cca_core::AppError;
use regex::Regex;
use std::collections::BTreeMap;

pub struct FileGrepHandler;

#[async_trait]
impl ToolHandler for FileGrepHandler {
    fn name(&self) -> &'static str {
        "file-grep"
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
            .get("path")
            .and_then(|v| v.as_str())
            .map(|p| ctx.resolve(p))
            .unwrap_or_else(|| ctx.workspace_root.clone());
        let regex = Regex::new(pattern).map_err(|e| AppError::InvalidParams {
            field: "pattern".into(),
            message: e.to_string(),
        })?;

        let mut entries = Vec::new();
        let mut omitted_by_file: BTreeMap<String, usize> = BTreeMap::new();
        for path in walk_files(&base) {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let relative = path
                .strip_prefix(&base)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let mut matches_in_file = 0;
            for (line_number, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    matches_in_file += 1;
                    entries.push(format!("{relative}:{}: {line}", line_number + 1));
                }
            }
            if matches_in_file > 0 {
                omitted_by_file.insert(relative, matches_in_file);
            }
        }
        Ok(RawResult::List {
            entries,
            omitted_by_file: Some(omitted_by_file),
        })
    }
}
