use serde::{Deserialize, Serialize};

/// Outcome of evaluating a tool call against the permission rule set
/// (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Allowed,
    Denied,
    RequiresConfirmation,
}

/// A request to evaluate, independent of how the rules are stored.
#[derive(Debug, Clone)]
pub struct PermissionRequest<'a> {
    pub tool_name: &'a str,
    pub target_path: Option<&'a str>,
    pub workspace: Option<&'a str>,
    pub session_id: Option<&'a str>,
    pub execution_id: Option<&'a str>,
    pub requires_permission: bool,
}
