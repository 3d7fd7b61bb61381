//! Context budget reporting (spec §4.7): how close an execution's active
//! context is to its token cap.

use cca_core::{ContextItem, ContextItemType, ContextRole, ExecutionId};
use cca_store::Store;

pub const DEFAULT_TOKEN_CAP: u32 = 128_000 / 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetHealth {
    Healthy,
    Warning,
    Critical,
}

impl BudgetHealth {
    fn from_ratio(used: u32, cap: u32) -> Self {
        if cap == 0 {
            return Self::Critical;
        }
        let ratio = used as f64 / cap as f64;
        if ratio > 0.90 {
            Self::Critical
        } else if ratio >= 0.70 {
            Self::Warning
        } else {
            Self::Healthy
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextBudgetReport {
    pub total_tokens: u32,
    pub system_tokens: u32,
    pub context_tokens: u32,
    pub message_tokens: u32,
    pub remaining_tokens: i64,
    pub active_item_count: usize,
    pub compacted_item_count: usize,
    pub health: BudgetHealth,
}

fn bucket_of(item: &ContextItem) -> &'static str {
    match (item.role, item.item_type) {
        (ContextRole::System, _) => "system",
        (_, ContextItemType::ToolCall | ContextItemType::ToolResult) => "context",
        _ => "message",
    }
}

/// Reports token usage for an execution against `cap`, using
/// [`cca_core::ContextItem::estimate_tokens`] semantics already baked
/// into the stored `tokens` field.
pub fn report(store: &Store, execution_id: &ExecutionId, cap: u32) -> Result<ContextBudgetReport, cca_core::AppError> {
    let active = store.list_active_context_items(execution_id)?;
    let compacted_item_count = active.iter().filter(|i| i.compacted_into_id.is_some()).count();

    let mut system_tokens = 0u32;
    let mut context_tokens = 0u32;
    let mut message_tokens = 0u32;
    for item in &active {
        match bucket_of(item) {
            "system" => system_tokens += item.tokens,
            "context" => context_tokens += item.tokens,
            _ => message_tokens += item.tokens,
        }
    }
    let total_tokens = system_tokens + context_tokens + message_tokens;

    Ok(ContextBudgetReport {
        total_tokens,
        system_tokens,
        context_tokens,
        message_tokens,
        remaining_tokens: cap as i64 - total_tokens as i64,
        active_item_count: active.len(),
        compacted_item_count,
        health: BudgetHealth::from_ratio(total_tokens, cap),
    })
}
