//! Tool Runtime (spec §4.4): resolves a tool by name, gates it behind the
//! permission evaluator, enforces a timeout, routes the raw result through
//! the context processor, and records a `ToolCall` audit row.

use crate::confirmation::{ConfirmationGate, ConfirmationResponse};
use crate::handler::ToolContext;
use crate::registry::ToolRegistry;
use cca_context::{ContextProcessor, ProcessedResult};
use cca_core::{
    AgentId, AppError, CriticReview, ExecutionId, NodeExecutionId, Permission, PermissionId, PermissionScope, SessionId,
    ToolCall, ToolCallId, ToolCallStatus,
};
use cca_feed::{NewFeedEntry, SharedFeed};
use cca_permission::{PermissionDecision, PermissionEvaluator, PermissionRequest};
use cca_store::Store;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 300;

pub struct ToolRequest {
    pub execution_id: ExecutionId,
    pub node_execution_id: Option<NodeExecutionId>,
    pub session_id: Option<SessionId>,
    pub agent_id: Option<AgentId>,
    pub tool_name: String,
    pub input: serde_json::Value,
    pub target_path: Option<String>,
    /// Critic reviews run inline on the pending change (spec §4.8); they
    /// must surface at the permission confirmation UI (spec §4.4).
    pub critic_reviews: Vec<CriticReview>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolResponse {
    pub success: bool,
    pub result: Option<serde_json::Value>,
    pub truncated: bool,
    pub full_result_id: Option<String>,
    pub duration_ms: u64,
    pub permission_denied: bool,
    pub error: Option<String>,
}

pub struct ToolRuntime {
    registry: ToolRegistry,
    evaluator: PermissionEvaluator,
    processor: ContextProcessor,
    store: Store,
    feed: Arc<SharedFeed>,
    workspace_root: PathBuf,
    cancellations: AsyncMutex<HashMap<ToolCallId, Arc<AtomicBool>>>,
    confirmations: Arc<ConfirmationGate>,
    confirmation_timeout_secs: u64,
}

impl ToolRuntime {
    pub fn new(
        registry: ToolRegistry,
        evaluator: PermissionEvaluator,
        processor: ContextProcessor,
        store: Store,
        feed: Arc<SharedFeed>,
        workspace_root: PathBuf,
    ) -> Self {
        Self::with_confirmation_timeout(
            registry,
            evaluator,
            processor,
            store,
            feed,
            workspace_root,
            DEFAULT_CONFIRMATION_TIMEOUT_SECS,
        )
    }

    /// Same as [`ToolRuntime::new`], with an explicit permission
    /// confirmation timeout instead of the 300s default.
    pub fn with_confirmation_timeout(
        registry: ToolRegistry,
        evaluator: PermissionEvaluator,
        processor: ContextProcessor,
        store: Store,
        feed: Arc<SharedFeed>,
        workspace_root: PathBuf,
        confirmation_timeout_secs: u64,
    ) -> Self {
        Self {
            registry,
            evaluator,
            processor,
            store,
            feed,
            workspace_root,
            cancellations: AsyncMutex::new(HashMap::new()),
            confirmations: Arc::new(ConfirmationGate::new()),
            confirmation_timeout_secs,
        }
    }

    /// Submits a user's answer to a pending permission-request event. A
    /// no-op (returns `false`) if no confirmation is currently awaited
    /// for `call_id`.
    pub async fn submit_confirmation(&self, call_id: &ToolCallId, response: ConfirmationResponse) -> bool {
        self.confirmations.submit(call_id, response).await
    }

    #[instrument(skip(self, request), fields(tool = %request.tool_name))]
    pub async fn execute(&self, request: ToolRequest) -> Result<(ToolCallId, ToolResponse), AppError> {
        let started_at = chrono::Utc::now();
        let start_instant = Instant::now();
        let call_id = ToolCallId::new();

        let Some(handler) = self.registry.get(&request.tool_name) else {
            return Ok((
                call_id,
                error_response(format!("unknown tool '{}'", request.tool_name), false),
            ));
        };

        self.store.create_tool_call(&ToolCall {
            id: call_id.clone(),
            execution_id: request.execution_id.clone(),
            node_execution_id: request.node_execution_id.clone(),
            tool_name: request.tool_name.clone(),
            input: request.input.clone(),
            output: None,
            status: ToolCallStatus::Pending,
            started_at,
            completed_at: None,
        })?;

        if handler.requires_permission() {
            let decision = self.evaluator.evaluate(&PermissionRequest {
                tool_name: &request.tool_name,
                target_path: request.target_path.as_deref(),
                workspace: Some(self.workspace_root.to_string_lossy().as_ref()),
                session_id: request.session_id.as_ref().map(|id| id.as_str()),
                execution_id: Some(request.execution_id.as_str()),
                requires_permission: true,
            })?;
            match decision {
                PermissionDecision::Denied => {
                    self.store.update_tool_call_result(&call_id, ToolCallStatus::Denied, None)?;
                    return Ok((call_id, error_response("permission denied".into(), true)));
                }
                PermissionDecision::RequiresConfirmation => {
                    self.store
                        .update_tool_call_result(&call_id, ToolCallStatus::AwaitingPermission, None)?;

                    let rx = self.confirmations.register(call_id.clone()).await;
                    self.feed.post(NewFeedEntry {
                        source: cca_core::FeedSource::System,
                        source_id: "tool-runtime".into(),
                        entry_type: cca_core::FeedEntryType::Action,
                        content: serde_json::json!({
                            "call_id": call_id.to_string(),
                            "tool_name": request.tool_name,
                            "input": request.input,
                            "target_path": request.target_path,
                            "critic_reviews": request.critic_reviews,
                        }),
                        reply_to: None,
                    });

                    let response = match tokio::time::timeout(
                        Duration::from_secs(self.confirmation_timeout_secs),
                        rx,
                    )
                    .await
                    {
                        Ok(Ok(response)) => response,
                        _ => ConfirmationResponse {
                            approved: false,
                            feedback: Some("permission confirmation timed out".into()),
                            scope: None,
                            match_pattern: None,
                        },
                    };

                    if !response.approved {
                        self.store.update_tool_call_result(&call_id, ToolCallStatus::Denied, None)?;
                        let message = response.feedback.unwrap_or_else(|| "permission denied".into());
                        return Ok((call_id, error_response(message, true)));
                    }

                    if let Some(scope) = response.scope {
                        if scope != PermissionScope::Once {
                            self.evaluator.record_confirmation(&Permission {
                                id: PermissionId::new(),
                                scope,
                                workspace: Some(self.workspace_root.to_string_lossy().to_string()),
                                session_id: request.session_id.clone(),
                                execution_id: Some(request.execution_id.clone()),
                                workflow_id: None,
                                tool_name: request.tool_name.clone(),
                                match_pattern: response.match_pattern.clone().or_else(|| request.target_path.clone()),
                                granted: true,
                                expires_at: None,
                            })?;
                        }
                    }

                    self.store.update_tool_call_result(&call_id, ToolCallStatus::Approved, None)?;
                }
                PermissionDecision::Allowed => {
                    self.store.update_tool_call_result(&call_id, ToolCallStatus::Approved, None)?;
                }
            }
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        self.cancellations.lock().await.insert(call_id.clone(), cancelled.clone());
        self.store.update_tool_call_result(&call_id, ToolCallStatus::Running, None)?;

        let ctx = ToolContext {
            workspace_root: self.workspace_root.clone(),
            cancelled,
        };
        let timeout = Duration::from_secs(
            request
                .input
                .get("timeout")
                .and_then(|v| v.as_u64())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        let outcome = tokio::time::timeout(timeout, handler.execute(&request.input, &ctx)).await;
        self.cancellations.lock().await.remove(&call_id);

        let duration_ms = start_instant.elapsed().as_millis() as u64;
        match outcome {
            Ok(Ok(raw)) => {
                let processed = self.processor.process(&request.tool_name, &request.input, &raw)?;
                self.store.update_tool_call_result(
                    &call_id,
                    ToolCallStatus::Success,
                    Some(serde_json::to_value(&processed).unwrap_or_default()),
                )?;
                info!(duration_ms, "execution:complete");
                Ok((call_id, success_response(processed, duration_ms)))
            }
            Ok(Err(err)) => {
                self.store.update_tool_call_result(&call_id, ToolCallStatus::Error, None)?;
                warn!(error = %err, "execution:error");
                Ok((call_id, error_response(err.to_string(), false)))
            }
            Err(_) => {
                self.store.update_tool_call_result(&call_id, ToolCallStatus::Error, None)?;
                warn!("execution:error (timeout)");
                Ok((
                    call_id,
                    error_response(format!("tool '{}' timed out", request.tool_name), false),
                ))
            }
        }
    }

    /// Interrupts one in-flight request cooperatively.
    pub async fn abort(&self, call_id: &ToolCallId) {
        if let Some(flag) = self.cancellations.lock().await.get(call_id) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Cancels every in-flight request.
    pub async fn abort_all(&self) {
        for flag in self.cancellations.lock().await.values() {
            flag.store(true, Ordering::Relaxed);
        }
    }
}

fn success_response(processed: ProcessedResult, duration_ms: u64) -> ToolResponse {
    ToolResponse {
        success: true,
        result: Some(processed.summary),
        truncated: processed.truncated,
        full_result_id: processed.store_id.map(|id| id.to_string()),
        duration_ms,
        permission_denied: false,
        error: None,
    }
}

fn error_response(message: String, permission_denied: bool) -> ToolResponse {
    ToolResponse {
        success: false,
        result: None,
        truncated: false,
        full_result_id: None,
        duration_ms: 0,
        permission_denied,
        error: Some(message),
    }
}
