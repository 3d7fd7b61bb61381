//! Ties the size policy and truncation strategies to the store layer:
//! given a raw tool result, decide whether it needs to spill, persist the
//! full result when it does, and hand back the bounded summary.

use crate::policy::SizePolicy;
use crate::truncate::{truncate_list, truncate_shell, truncate_text};
use cca_core::{AppError, StoredResultId, StoredResultMeta};
use cca_store::Store;
use std::collections::BTreeMap;
use tracing::instrument;

/// The shape of a raw tool result before size limiting. Tool handlers in
/// `cca-tools` produce one of these; the processor never needs to know
/// which tool produced it beyond the name used for policy lookup.
#[derive(Debug, Clone)]
pub enum RawResult {
    Text(String),
    Shell { stdout: String, stderr: String },
    List {
        entries: Vec<String>,
        omitted_by_file: Option<BTreeMap<String, usize>>,
    },
}

impl RawResult {
    fn full_text(&self) -> String {
        match self {
            RawResult::Text(s) => s.clone(),
            RawResult::Shell { stdout, stderr } => format!("{stdout}\n{stderr}"),
            RawResult::List { entries, .. } => entries.join("\n"),
        }
    }

    fn size(&self) -> usize {
        match self {
            RawResult::Text(s) => s.chars().count(),
            RawResult::Shell { stdout, stderr } => stdout.chars().count() + stderr.chars().count(),
            RawResult::List { entries, .. } => entries.len(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessedResult {
    pub summary: serde_json::Value,
    pub truncated: bool,
    pub store_id: Option<StoredResultId>,
    pub original_size: usize,
    pub summary_size: usize,
}

pub struct ContextProcessor {
    store: Store,
    policy: SizePolicy,
}

impl ContextProcessor {
    pub fn new(store: Store, policy: SizePolicy) -> Self {
        Self { store, policy }
    }

    #[instrument(skip(self, input, raw), fields(tool = tool_name))]
    pub fn process(
        &self,
        tool_name: &str,
        input: &serde_json::Value,
        raw: &RawResult,
    ) -> Result<ProcessedResult, AppError> {
        let cap = self.policy.cap_for(tool_name);
        let original_size = raw.size();

        if let RawResult::List {
            entries,
            omitted_by_file,
        } = raw
        {
            let (summary, truncated) = truncate_list(entries, cap, omitted_by_file.as_ref());
            let store_id = if truncated {
                Some(self.spill(tool_name, input, &raw.full_text())?)
            } else {
                None
            };
            let summary_size = summary.to_string().chars().count();
            return Ok(ProcessedResult {
                summary,
                truncated,
                store_id,
                original_size,
                summary_size,
            });
        }

        if original_size <= cap {
            let summary = serde_json::Value::String(raw.full_text());
            return Ok(ProcessedResult {
                summary_size: original_size,
                summary,
                truncated: false,
                store_id: None,
                original_size,
            });
        }

        let store_id = self.spill(tool_name, input, &raw.full_text())?;
        let (text, truncated) = match raw {
            RawResult::Text(content) => truncate_text(content, cap, store_id.as_str()),
            RawResult::Shell { stdout, stderr } => {
                truncate_shell(stdout, stderr, cap, store_id.as_str())
            }
            RawResult::List { .. } => unreachable!("handled above"),
        };
        let summary_size = text.chars().count();
        Ok(ProcessedResult {
            summary: serde_json::Value::String(text),
            truncated,
            store_id: Some(store_id),
            original_size,
            summary_size,
        })
    }

    fn spill(
        &self,
        tool_name: &str,
        input: &serde_json::Value,
        full_text: &str,
    ) -> Result<StoredResultId, AppError> {
        let meta = StoredResultMeta {
            id: StoredResultId::new(),
            tool_name: tool_name.to_string(),
            original_input: input.clone(),
            size_chars: full_text.chars().count(),
            created_at: chrono::Utc::now(),
        };
        self.store.store_full_result(&meta, full_text)?;
        self.store.evict_stored_results(1000)?;
        Ok(meta.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> ContextProcessor {
        ContextProcessor::new(Store::open_in_memory().unwrap(), SizePolicy::default())
    }

    #[test]
    fn small_text_result_is_not_truncated_and_does_not_spill() {
        let processor = processor();
        let result = processor
            .process("file-read", &serde_json::json!({}), &RawResult::Text("fn main() {}".into()))
            .unwrap();
        assert!(!result.truncated);
        assert!(result.store_id.is_none());
    }

    #[test]
    fn oversized_text_result_spills_and_truncates() {
        let processor = processor();
        let content = "a".repeat(60_000);
        let result = processor
            .process("file-read", &serde_json::json!({"path": "big.txt"}), &RawResult::Text(content))
            .unwrap();
        assert!(result.truncated);
        assert!(result.store_id.is_some());
        assert!(result.summary_size < result.original_size);
    }

    #[test]
    fn list_result_over_entry_cap_spills_full_list() {
        let processor = processor();
        let entries: Vec<String> = (0..200).map(|i| format!("file-{i}.rs")).collect();
        let result = processor
            .process("file-glob", &serde_json::json!({"pattern": "**/*.rs"}), &RawResult::List {
                entries,
                omitted_by_file: None,
            })
            .unwrap();
        assert!(result.truncated);
        assert!(result.store_id.is_some());
    }
}
