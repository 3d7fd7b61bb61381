use crate::handler::{ToolContext, ToolHandler};
use async_trait::async_trait;
use cca_context::RawResult;
use cca_core::AppError;
use std::time::Duration;
use tokio::process::Command;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct ShellExecHandler;

#[async_trait]
impl ToolHandler for ShellExecHandler {
    fn name(&self) -> &'static str {
        "shell-exec"
    }

    fn requires_permission(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        input: &serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<RawResult, AppError> {
        let command = input
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidParams {
                field: "command".into(),
                message: "required".into(),
            })?;
        let timeout_secs = input
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&ctx.workspace_root)
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| AppError::ToolHandlerError {
            tool: self.name().into(),
            message: e.to_string(),
        })?;

        match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if ctx.is_cancelled() {
                    return Err(AppError::ToolHandlerError {
                        tool: self.name().into(),
                        message: "cancelled".into(),
                    });
                }
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if !output.status.success() {
                    stderr.push_str(&format!("\n[exit code {}]", output.status.code().unwrap_or(-1)));
                }
                Ok(RawResult::Shell { stdout, stderr })
            }
            Ok(Err(e)) => Err(AppError::ToolHandlerError {
                tool: self.name().into(),
                message: e.to_string(),
            }),
            Err(_) => Err(AppError::ToolTimeout {
                tool: self.name().into(),
                timeout_secs,
            }),
        }
    }
}
