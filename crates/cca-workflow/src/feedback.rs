//! Feedback queue (spec §4.7): review concerns that were not immediately
//! applied, tracked until a human addresses or dismisses them.
//!
//! Kept in-memory per executor rather than in `cca-store`: the queue is
//! transient triage state, not part of the durable audit trail the other
//! entities form.

use cca_core::{ChangeId, FeedEntryId, ToolCallId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Queued,
    Addressed,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub id: FeedEntryId,
    pub tool_call_id: ToolCallId,
    pub change_id: Option<ChangeId>,
    pub file: String,
    pub feedback: String,
    pub status: FeedbackStatus,
}

#[derive(Default)]
pub struct FeedbackQueue {
    items: Mutex<Vec<FeedbackItem>>,
}

impl FeedbackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, tool_call_id: ToolCallId, change_id: Option<ChangeId>, file: String, feedback: String) -> FeedEntryId {
        let id = FeedEntryId::new();
        self.items.lock().push(FeedbackItem {
            id: id.clone(),
            tool_call_id,
            change_id,
            file,
            feedback,
            status: FeedbackStatus::Queued,
        });
        id
    }

    pub fn list(&self) -> Vec<FeedbackItem> {
        self.items.lock().clone()
    }

    pub fn mark_addressed(&self, id: &FeedEntryId) -> bool {
        self.set_status(id, FeedbackStatus::Addressed)
    }

    pub fn mark_dismissed(&self, id: &FeedEntryId) -> bool {
        self.set_status(id, FeedbackStatus::Dismissed)
    }

    fn set_status(&self, id: &FeedEntryId, status: FeedbackStatus) -> bool {
        let mut items = self.items.lock();
        match items.iter_mut().find(|i| &i.id == id) {
            Some(item) => {
                item.status = status;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueued_items_start_as_queued() {
        let queue = FeedbackQueue::new();
        queue.enqueue(ToolCallId::new(), None, "src/lib.rs".into(), "missing docs".into());
        let items = queue.list();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, FeedbackStatus::Queued);
    }

    #[test]
    fn mark_addressed_updates_status() {
        let queue = FeedbackQueue::new();
        let id = queue.enqueue(ToolCallId::new(), None, "src/lib.rs".into(), "missing docs".into());
        assert!(queue.mark_addressed(&id));
        assert_eq!(queue.list()[0].status, FeedbackStatus::Addressed);
    }

    #[test]
    fn marking_an_unknown_id_returns_false() {
        let queue = FeedbackQueue::new();
        assert!(!queue.mark_dismissed(&FeedEntryId::new()));
    }
}
