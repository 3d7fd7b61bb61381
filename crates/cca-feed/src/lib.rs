//! Shared Feed (spec §4.5): an append-only in-memory ring buffer with
//! typed entries and multi-subscriber fan-out.

use cca_core::{FeedEntry, FeedEntryId, FeedEntryType};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

pub type Listener = Arc<dyn Fn(&FeedEntry) + Send + Sync>;

/// A posted entry, before id/timestamp assignment.
pub struct NewFeedEntry {
    pub source: cca_core::FeedSource,
    pub source_id: String,
    pub entry_type: FeedEntryType,
    pub content: serde_json::Value,
    pub reply_to: Option<FeedEntryId>,
}

struct Subscribers {
    general: Vec<Listener>,
    by_type: Vec<(FeedEntryType, Listener)>,
}

pub struct SharedFeed {
    max_entries: usize,
    entries: RwLock<VecDeque<FeedEntry>>,
    subscribers: RwLock<Subscribers>,
}

impl SharedFeed {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: RwLock::new(VecDeque::new()),
            subscribers: RwLock::new(Subscribers {
                general: Vec::new(),
                by_type: Vec::new(),
            }),
        }
    }

    /// Assigns id and timestamp, appends, trims to `max_entries`, then
    /// fans out to general subscribers before type subscribers. A
    /// listener that panics is caught so it cannot prevent the rest from
    /// running (spec §4.5).
    pub fn post(&self, entry: NewFeedEntry) -> FeedEntry {
        let stored = FeedEntry {
            id: FeedEntryId::new(),
            timestamp: Utc::now(),
            source: entry.source,
            source_id: entry.source_id,
            entry_type: entry.entry_type,
            content: entry.content,
            reply_to: entry.reply_to,
        };

        {
            let mut entries = self.entries.write();
            entries.push_back(stored.clone());
            while entries.len() > self.max_entries {
                entries.pop_front();
            }
        }

        let subscribers = self.subscribers.read();
        for listener in &subscribers.general {
            notify(listener, &stored);
        }
        for (entry_type, listener) in &subscribers.by_type {
            if *entry_type == stored.entry_type {
                notify(listener, &stored);
            }
        }
        stored
    }

    pub fn get(&self, filter: impl Fn(&FeedEntry) -> bool) -> Vec<FeedEntry> {
        self.entries.read().iter().filter(|e| filter(e)).cloned().collect()
    }

    pub fn get_by_id(&self, id: &FeedEntryId) -> Option<FeedEntry> {
        self.entries.read().iter().find(|e| &e.id == id).cloned()
    }

    pub fn replies_to(&self, id: &FeedEntryId) -> Vec<FeedEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.reply_to.as_ref() == Some(id))
            .cloned()
            .collect()
    }

    pub fn subscribe(&self, listener: Listener) {
        self.subscribers.write().general.push(listener);
    }

    pub fn subscribe_type(&self, entry_type: FeedEntryType, listener: Listener) {
        self.subscribers.write().by_type.push((entry_type, listener));
    }

    /// Serializes the buffer as an ordered list, oldest first.
    pub fn export(&self) -> Vec<FeedEntry> {
        self.entries.read().iter().cloned().collect()
    }

    /// Replaces the buffer with a previously exported list, trimming to
    /// `max_entries` from the tail if it's larger than the current cap.
    pub fn import(&self, entries: Vec<FeedEntry>) {
        let mut buffer: VecDeque<FeedEntry> = entries.into();
        while buffer.len() > self.max_entries {
            buffer.pop_front();
        }
        *self.entries.write() = buffer;
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SharedFeed {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

fn notify(listener: &Listener, entry: &FeedEntry) {
    let listener = listener.clone();
    let entry = entry.clone();
    if let Err(_panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || listener(&entry))) {
        warn!("feed listener panicked, continuing fan-out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cca_core::FeedSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry(entry_type: FeedEntryType) -> NewFeedEntry {
        NewFeedEntry {
            source: FeedSource::Agent,
            source_id: "coder".into(),
            entry_type,
            content: serde_json::json!({"text": "hi"}),
            reply_to: None,
        }
    }

    #[test]
    fn post_assigns_id_and_appends() {
        let feed = SharedFeed::default();
        let posted = feed.post(entry(FeedEntryType::Message));
        assert_eq!(feed.len(), 1);
        assert!(feed.get_by_id(&posted.id).is_some());
    }

    #[test]
    fn eviction_is_fifo_once_cap_exceeded() {
        let feed = SharedFeed::new(2);
        let first = feed.post(entry(FeedEntryType::Message));
        feed.post(entry(FeedEntryType::Message));
        feed.post(entry(FeedEntryType::Message));
        assert_eq!(feed.len(), 2);
        assert!(feed.get_by_id(&first.id).is_none());
    }

    #[test]
    fn general_subscribers_see_every_post() {
        let feed = SharedFeed::default();
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        feed.subscribe(Arc::new(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        }));
        feed.post(entry(FeedEntryType::Message));
        feed.post(entry(FeedEntryType::Action));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn type_subscribers_only_see_matching_entries() {
        let feed = SharedFeed::default();
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        feed.subscribe_type(
            FeedEntryType::Critic,
            Arc::new(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            }),
        );
        feed.post(entry(FeedEntryType::Message));
        feed.post(entry(FeedEntryType::Critic));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_panicking_listener_does_not_stop_the_rest() {
        let feed = SharedFeed::default();
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        feed.subscribe(Arc::new(|_| panic!("boom")));
        feed.subscribe(Arc::new(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        }));
        feed.post(entry(FeedEntryType::System));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn replies_to_filters_by_reply_to_id() {
        let feed = SharedFeed::default();
        let original = feed.post(entry(FeedEntryType::Message));
        let mut reply = entry(FeedEntryType::Message);
        reply.reply_to = Some(original.id.clone());
        feed.post(reply);
        feed.post(entry(FeedEntryType::Message));
        assert_eq!(feed.replies_to(&original.id).len(), 1);
    }

    #[test]
    fn export_then_import_round_trips() {
        let feed = SharedFeed::default();
        feed.post(entry(FeedEntryType::Message));
        feed.post(entry(FeedEntryType::Action));
        let exported = feed.export();
        let restored = SharedFeed::default();
        restored.import(exported.clone());
        assert_eq!(restored.export().len(), exported.len());
    }
}
