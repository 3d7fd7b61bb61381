//! Context compaction (spec §4.7): fold older context items into a single
//! marker or summary item, reversibly.

use cca_core::{AppError, ContextItem, ContextItemId, ContextItemType, ContextRole, ExecutionId, NodeExecutionId};
use cca_store::Store;
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const DEFAULT_KEEP_RECENT_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompactionStrategy {
    Summarize,
    Truncate,
    SlidingWindow,
}

fn compaction_content(strategy: CompactionStrategy, items: &[ContextItem]) -> String {
    match strategy {
        CompactionStrategy::Summarize => {
            let synopsis: Vec<&str> = items.iter().map(|i| i.content.as_str()).collect();
            format!("summary of {} items: {}", items.len(), synopsis.join(" | "))
        }
        CompactionStrategy::Truncate => format!("[{} items truncated]", items.len()),
        CompactionStrategy::SlidingWindow => format!("[{} items dropped from window]", items.len()),
    }
}

/// Compacts every active item older than the most recent `keep_recent_count`
/// into one new `Compaction` item. No-op (returns `Ok(None)`) if there is
/// nothing to compact.
pub fn compact(
    store: &Store,
    execution_id: &ExecutionId,
    node_execution_id: &NodeExecutionId,
    strategy: CompactionStrategy,
    keep_recent_count: usize,
) -> Result<Option<ContextItemId>, AppError> {
    let active = store.list_active_context_items(execution_id)?;
    if active.len() <= keep_recent_count {
        return Ok(None);
    }
    let split = active.len() - keep_recent_count;
    let (to_compact, _kept) = active.split_at(split);
    let source_ids: Vec<ContextItemId> = to_compact.iter().map(|i| i.id.clone()).collect();

    let content = compaction_content(strategy, to_compact);
    let summary = ContextItem {
        id: ContextItemId::new(),
        execution_id: execution_id.clone(),
        node_execution_id: node_execution_id.clone(),
        item_type: ContextItemType::Compaction,
        role: ContextRole::System,
        tokens: ContextItem::estimate_tokens(&content),
        content,
        agent_id: None,
        agent_name: None,
        compacted_into_id: None,
        created_at: Utc::now(),
    };
    store.compact_context_items(&source_ids, &summary)?;
    Ok(Some(summary.id))
}

/// Reverses a compaction, restoring its sources to active.
pub fn expand(store: &Store, summary_id: &ContextItemId) -> Result<(), AppError> {
    store.expand_compaction(summary_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(execution_id: ExecutionId, content: &str) -> ContextItem {
        ContextItem {
            id: ContextItemId::new(),
            execution_id,
            node_execution_id: NodeExecutionId::new(),
            item_type: ContextItemType::AgentOutput,
            role: ContextRole::Assistant,
            content: content.into(),
            agent_id: None,
            agent_name: None,
            tokens: 4,
            compacted_into_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn compacts_all_but_the_most_recent_n() {
        let store = Store::open_in_memory().unwrap();
        let execution_id = ExecutionId::new();
        for i in 0..15 {
            store.append_context_item(&item(execution_id.clone(), &format!("item {i}"))).unwrap();
        }
        let node_id = NodeExecutionId::new();
        let summary_id = compact(&store, &execution_id, &node_id, CompactionStrategy::Summarize, 10)
            .unwrap()
            .expect("should compact");
        let active = store.list_active_context_items(&execution_id).unwrap();
        assert_eq!(active.len(), 11); // 10 kept + 1 summary
        assert!(active.iter().any(|i| i.id == summary_id));
    }

    #[test]
    fn nothing_to_compact_is_a_no_op() {
        let store = Store::open_in_memory().unwrap();
        let execution_id = ExecutionId::new();
        store.append_context_item(&item(execution_id.clone(), "only one")).unwrap();
        let node_id = NodeExecutionId::new();
        let result = compact(&store, &execution_id, &node_id, CompactionStrategy::Truncate, 10).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn expansion_reverses_compaction() {
        let store = Store::open_in_memory().unwrap();
        let execution_id = ExecutionId::new();
        for i in 0..12 {
            store.append_context_item(&item(execution_id.clone(), &format!("item {i}"))).unwrap();
        }
        let node_id = NodeExecutionId::new();
        let summary_id = compact(&store, &execution_id, &node_id, CompactionStrategy::SlidingWindow, 10)
            .unwrap()
            .unwrap();
        expand(&store, &summary_id).unwrap();
        let active = store.list_active_context_items(&execution_id).unwrap();
        assert_eq!(active.len(), 12);
    }
}
