//! Rule-based allow/deny/confirm evaluator (spec §4.3).

use crate::decision::{PermissionDecision, PermissionRequest};
use cca_core::{AppError, Permission, PermissionScope};
use cca_store::Store;
use chrono::Utc;
use tracing::instrument;

pub struct PermissionEvaluator {
    store: Store,
}

impl PermissionEvaluator {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, request), fields(tool = request.tool_name))]
    pub fn evaluate(&self, request: &PermissionRequest<'_>) -> Result<PermissionDecision, AppError> {
        let rules = self.store.list_permissions_for_tool(request.tool_name)?;
        let now = Utc::now();
        let matching: Vec<&Permission> = rules
            .iter()
            .filter(|rule| !is_expired(rule, now) && matches(rule, request))
            .collect();

        if matching.iter().any(|rule| !rule.granted) {
            return Ok(PermissionDecision::Denied);
        }
        if matching
            .iter()
            .filter(|rule| rule.granted)
            .max_by_key(|rule| scope_rank(rule.scope))
            .is_some()
        {
            return Ok(PermissionDecision::Allowed);
        }
        if request.requires_permission {
            return Ok(PermissionDecision::RequiresConfirmation);
        }
        Ok(PermissionDecision::Allowed)
    }

    /// Persists a confirmation response's grant, unless it is `once`
    /// scoped — those are never stored (spec §3 invariant).
    pub fn record_confirmation(&self, permission: &Permission) -> Result<(), AppError> {
        if permission.scope == PermissionScope::Once {
            return Ok(());
        }
        self.store.create_permission(permission)
    }
}

fn scope_rank(scope: PermissionScope) -> u8 {
    match scope {
        PermissionScope::Global => 3,
        PermissionScope::Folder => 2,
        PermissionScope::Session => 1,
        PermissionScope::Once => 0,
    }
}

fn is_expired(rule: &Permission, now: chrono::DateTime<Utc>) -> bool {
    rule.expires_at.is_some_and(|expires| expires < now)
}

fn matches(rule: &Permission, request: &PermissionRequest<'_>) -> bool {
    if rule.tool_name != request.tool_name {
        return false;
    }
    match rule.scope {
        PermissionScope::Global => true,
        PermissionScope::Session => {
            rule.session_id.as_deref() == request.session_id && request.session_id.is_some()
        }
        PermissionScope::Folder => {
            let prefix = rule.match_pattern.as_deref().or(rule.workspace.as_deref());
            match (prefix, request.target_path) {
                (Some(prefix), Some(path)) => path.starts_with(prefix),
                _ => false,
            }
        }
        PermissionScope::Once => false,
    }
}
