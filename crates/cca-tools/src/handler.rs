use async_trait::async_trait;
use cca_context::RawResult;
use cca_core::AppError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-call context a handler needs beyond its input: the workspace root
/// every relative path is resolved against, and a cooperative cancellation
/// flag handlers should poll during long-running work (spec §4.4 "abort").
pub struct ToolContext {
    pub workspace_root: PathBuf,
    pub cancelled: Arc<AtomicBool>,
}

impl ToolContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = PathBuf::from(path);
        if candidate.is_absolute() {
            candidate
        } else {
            self.workspace_root.join(candidate)
        }
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the permission evaluator must be consulted before running.
    fn requires_permission(&self) -> bool;

    async fn execute(
        &self,
        input: &serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<RawResult, AppError>;
}
