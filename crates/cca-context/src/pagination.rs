//! The `get-stored-result(id, offset, limit)` fetch tool (spec §4.2).
//! Never requires permission — callers in `cca-tools` must not gate it.

use cca_core::{AppError, StoredResultId};
use cca_store::Store;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ResultPage {
    pub content: String,
    pub offset: usize,
    pub limit: usize,
    pub total_size: usize,
    pub has_more: bool,
    pub next_offset: Option<usize>,
}

pub fn get_stored_result(
    store: &Store,
    id: &StoredResultId,
    offset: usize,
    limit: usize,
) -> Result<Option<ResultPage>, AppError> {
    let Some((meta, page)) = store.get_stored_result_page(id, offset, limit)? else {
        return Ok(None);
    };
    let next_offset = offset + page.chars().count();
    let has_more = next_offset < meta.size_chars;
    Ok(Some(ResultPage {
        content: page,
        offset,
        limit,
        total_size: meta.size_chars,
        has_more,
        next_offset: has_more.then_some(next_offset),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cca_core::StoredResultMeta;

    fn seeded_store() -> (Store, StoredResultId) {
        let store = Store::open_in_memory().unwrap();
        let meta = StoredResultMeta {
            id: StoredResultId::new(),
            tool_name: "shell-exec".into(),
            original_input: serde_json::json!({}),
            size_chars: 26,
            created_at: chrono::Utc::now(),
        };
        store.store_full_result(&meta, "abcdefghijklmnopqrstuvwxyz").unwrap();
        (store, meta.id)
    }

    #[test]
    fn page_in_the_middle_reports_has_more() {
        let (store, id) = seeded_store();
        let page = get_stored_result(&store, &id, 0, 10).unwrap().unwrap();
        assert_eq!(page.content, "abcdefghij");
        assert!(page.has_more);
        assert_eq!(page.next_offset, Some(10));
    }

    #[test]
    fn final_page_reports_no_more() {
        let (store, id) = seeded_store();
        let page = get_stored_result(&store, &id, 20, 10).unwrap().unwrap();
        assert_eq!(page.content, "uvwxyz");
        assert!(!page.has_more);
        assert_eq!(page.next_offset, None);
    }

    #[test]
    fn missing_id_returns_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(get_stored_result(&store, &StoredResultId::new(), 0, 10).unwrap().is_none());
    }
}
