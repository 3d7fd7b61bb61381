//! Durable entity types shared across the store, workflow executor, and
//! engine crates (spec §3). Kept separate from persistence and RPC
//! concerns so none of those crates need to depend on each other to
//! agree on a shape.

use crate::ids::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------
// Session / Iteration / ProposedChange / CriticReview / ArbiterDecision
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Paused,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub task: String,
    pub status: SessionStatus,
    pub coder_agent: String,
    pub coder_model: String,
    pub workspace_path: String,
    /// Serialized config snapshot (opaque JSON blob the engine round-trips).
    pub config_snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    Coding,
    Reviewing,
    Deciding,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Iteration {
    pub id: IterationId,
    pub session_id: SessionId,
    /// 1-indexed, contiguous within a session.
    pub number: u32,
    pub status: IterationStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Create,
    Modify,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Proposed,
    Approved,
    Rejected,
    Applied,
    Reverted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedChange {
    pub id: ChangeId,
    pub iteration_id: IterationId,
    pub file_path: String,
    pub operation: ChangeOperation,
    /// Present iff `operation` is `Modify` or `Delete`.
    pub original_content: Option<String>,
    pub new_content: Option<String>,
    pub diff: Option<String>,
    pub status: ChangeStatus,
}

impl ProposedChange {
    /// Enforces the invariant from spec §3: `original_content` present iff
    /// operation is modify or delete.
    pub fn is_well_formed(&self) -> bool {
        match self.operation {
            ChangeOperation::Create => self.original_content.is_none(),
            ChangeOperation::Modify | ChangeOperation::Delete => self.original_content.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewProvider {
    Static,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approve,
    Reject,
    Concerns,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
    Suggestion,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticIssue {
    pub severity: IssueSeverity,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub blocking: bool,
}

impl CriticIssue {
    /// spec §9 Open Question: blocking iff severity is error OR the
    /// validator explicitly flagged it as blocking.
    pub fn resolve_blocking(severity: IssueSeverity, explicit_blocking: bool) -> bool {
        matches!(severity, IssueSeverity::Error) || explicit_blocking
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticReview {
    pub id: ReviewId,
    pub change_id: ChangeId,
    pub critic_id: CriticId,
    pub critic_name: String,
    pub provider: ReviewProvider,
    pub verdict: ReviewVerdict,
    pub message: String,
    pub issues: Vec<CriticIssue>,
}

impl CriticReview {
    pub fn has_blocking_issue(&self) -> bool {
        self.issues.iter().any(|i| i.blocking)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbiterDecisionKind {
    Approve,
    Reject,
    Iterate,
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterDecision {
    pub id: DecisionId,
    pub iteration_id: IterationId,
    pub decision: ArbiterDecisionKind,
    pub feedback: Option<String>,
    pub address_issues: Option<Vec<String>>,
    pub focus_files: Option<Vec<String>>,
    pub decided_at: DateTime<Utc>,
    pub decided_by: String,
}

// ---------------------------------------------------------------------
// ToolCall
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    AwaitingPermission,
    Approved,
    Denied,
    Running,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: ToolCallId,
    pub execution_id: ExecutionId,
    pub node_execution_id: Option<NodeExecutionId>,
    pub tool_name: String,
    pub input: serde_json::Value,
    /// `None` when the raw result was spilled to the context store; in that
    /// case the spill id is carried by the caller's response, not here.
    pub output: Option<serde_json::Value>,
    pub status: ToolCallStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------
// ContextItem
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextItemType {
    System,
    UserInput,
    AgentOutput,
    ToolCall,
    ToolResult,
    Compaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: ContextItemId,
    pub execution_id: ExecutionId,
    pub node_execution_id: NodeExecutionId,
    pub item_type: ContextItemType,
    pub role: ContextRole,
    pub content: String,
    pub agent_id: Option<AgentId>,
    pub agent_name: Option<String>,
    pub tokens: u32,
    pub compacted_into_id: Option<ContextItemId>,
    pub created_at: DateTime<Utc>,
}

impl ContextItem {
    /// Estimate tokens as ceil(len/4) when the caller doesn't supply a
    /// real count (spec §3).
    pub fn estimate_tokens(content: &str) -> u32 {
        ((content.len() as u32) + 3) / 4
    }

    pub fn is_active(&self) -> bool {
        self.compacted_into_id.is_none()
    }
}

// ---------------------------------------------------------------------
// WorkflowExecution / Checkpoint
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Paused,
    AwaitingInput,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub current_node_id: Option<String>,
    pub iteration: u32,
    pub chat_session_id: Option<SessionId>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Pending,
    Responded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub execution_id: ExecutionId,
    pub node_execution_id: NodeExecutionId,
    pub prompt: String,
    pub status: CheckpointStatus,
    pub decision: Option<serde_json::Value>,
    pub feedback: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------
// StoredResult (context store entry)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResultMeta {
    pub id: StoredResultId,
    pub tool_name: String,
    pub original_input: serde_json::Value,
    pub size_chars: usize,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------
// Permission
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScope {
    Once,
    Session,
    Folder,
    Global,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub scope: PermissionScope,
    pub workspace: Option<String>,
    pub session_id: Option<SessionId>,
    pub execution_id: Option<ExecutionId>,
    pub workflow_id: Option<WorkflowId>,
    pub tool_name: String,
    pub match_pattern: Option<String>,
    pub granted: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------
// FeedEntry
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    Human,
    Agent,
    Critic,
    Validator,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedEntryType {
    Message,
    Change,
    Action,
    System,
    Validation,
    Decision,
    Critic,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: FeedEntryId,
    pub timestamp: DateTime<Utc>,
    pub source: FeedSource,
    pub source_id: String,
    pub entry_type: FeedEntryType,
    pub content: serde_json::Value,
    pub reply_to: Option<FeedEntryId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposed_change_create_requires_no_original() {
        let change = ProposedChange {
            id: ChangeId::new(),
            iteration_id: IterationId::new(),
            file_path: "src/lib.rs".into(),
            operation: ChangeOperation::Create,
            original_content: None,
            new_content: Some("fn add() {}".into()),
            diff: None,
            status: ChangeStatus::Proposed,
        };
        assert!(change.is_well_formed());
    }

    #[test]
    fn proposed_change_modify_requires_original() {
        let change = ProposedChange {
            id: ChangeId::new(),
            iteration_id: IterationId::new(),
            file_path: "src/lib.rs".into(),
            operation: ChangeOperation::Modify,
            original_content: None,
            new_content: Some("fn add() {}".into()),
            diff: None,
            status: ChangeStatus::Proposed,
        };
        assert!(!change.is_well_formed());
    }

    #[test]
    fn blocking_resolution_follows_open_question_rule() {
        assert!(CriticIssue::resolve_blocking(IssueSeverity::Error, false));
        assert!(CriticIssue::resolve_blocking(IssueSeverity::Warning, true));
        assert!(!CriticIssue::resolve_blocking(
            IssueSeverity::Suggestion,
            false
        ));
    }

    #[test]
    fn context_item_token_estimate_rounds_up() {
        assert_eq!(ContextItem::estimate_tokens(""), 0);
        assert_eq!(ContextItem::estimate_tokens("abc"), 1);
        assert_eq!(ContextItem::estimate_tokens("abcdefgh"), 2);
        assert_eq!(ContextItem::estimate_tokens("abcde"), 2);
    }

    #[test]
    fn context_item_active_iff_not_compacted() {
        let item = ContextItem {
            id: ContextItemId::new(),
            execution_id: ExecutionId::new(),
            node_execution_id: NodeExecutionId::new(),
            item_type: ContextItemType::UserInput,
            role: ContextRole::User,
            content: "hello".into(),
            agent_id: None,
            agent_name: None,
            tokens: 2,
            compacted_into_id: None,
            created_at: Utc::now(),
        };
        assert!(item.is_active());
        let mut compacted = item.clone();
        compacted.compacted_into_id = Some(ContextItemId::new());
        assert!(!compacted.is_active());
    }
}
