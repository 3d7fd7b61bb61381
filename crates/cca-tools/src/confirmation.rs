//! Tool-call confirmation plumbing (spec §4.4 step 2): the runtime blocks
//! on a resolver keyed to the pending call until the adapter answers the
//! permission-request event it published, mirroring `cca-engine`'s
//! `ArbiterGate`.

use cca_core::{PermissionScope, ToolCallId};
use std::collections::HashMap;
use tokio::sync::{oneshot, Mutex};

/// A user's answer to a permission-request event.
#[derive(Debug, Clone)]
pub struct ConfirmationResponse {
    pub approved: bool,
    /// Carried verbatim into the tool result's `error` on deny (spec §4.4,
    /// E2E scenario 5).
    pub feedback: Option<String>,
    /// A granted non-`once` scope is persisted before the call executes.
    pub scope: Option<PermissionScope>,
    pub match_pattern: Option<String>,
}

#[derive(Default)]
pub struct ConfirmationGate {
    pending: Mutex<HashMap<ToolCallId, oneshot::Sender<ConfirmationResponse>>>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver for `call_id` and returns the receiving half
    /// the runtime awaits on.
    pub async fn register(&self, call_id: ToolCallId) -> oneshot::Receiver<ConfirmationResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(call_id, tx);
        rx
    }

    /// Submits a response for a pending call. Returns `false` if no
    /// confirmation is currently awaited for that call.
    pub async fn submit(&self, call_id: &ToolCallId, response: ConfirmationResponse) -> bool {
        if let Some(tx) = self.pending.lock().await.remove(call_id) {
            tx.send(response).is_ok()
        } else {
            false
        }
    }

    #[cfg(test)]
    pub(crate) async fn pending_ids(&self) -> Vec<ToolCallId> {
        self.pending.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submission_wakes_the_registered_receiver() {
        let gate = ConfirmationGate::new();
        let call_id = ToolCallId::new();
        let rx = gate.register(call_id.clone()).await;
        let submitted = gate
            .submit(
                &call_id,
                ConfirmationResponse {
                    approved: false,
                    feedback: Some("edit file.txt instead".into()),
                    scope: None,
                    match_pattern: None,
                },
            )
            .await;
        assert!(submitted);
        let received = rx.await.unwrap();
        assert!(!received.approved);
        assert_eq!(received.feedback.as_deref(), Some("edit file.txt instead"));
    }

    #[tokio::test]
    async fn submitting_for_an_unregistered_call_is_a_no_op() {
        let gate = ConfirmationGate::new();
        let submitted = gate
            .submit(
                &ToolCallId::new(),
                ConfirmationResponse {
                    approved: true,
                    feedback: None,
                    scope: None,
                    match_pattern: None,
                },
            )
            .await;
        assert!(!submitted);
    }
}
