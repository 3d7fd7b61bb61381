//! Arbiter phase plumbing (spec §4.8): the loop blocks on a resolver
//! keyed to the current iteration until a human (or a test harness)
//! submits a decision.

use cca_core::{ArbiterDecisionKind, IterationId};
use std::collections::HashMap;
use tokio::sync::{oneshot, Mutex};

#[derive(Debug, Clone)]
pub struct ArbiterSubmission {
    pub decision: ArbiterDecisionKind,
    pub feedback: Option<String>,
    pub address_issues: Option<Vec<String>>,
    pub focus_files: Option<Vec<String>>,
}

#[derive(Default)]
pub struct ArbiterGate {
    pending: Mutex<HashMap<IterationId, oneshot::Sender<ArbiterSubmission>>>,
}

impl ArbiterGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver for `iteration_id` and returns the receiving
    /// half the loop awaits on.
    pub async fn register(&self, iteration_id: IterationId) -> oneshot::Receiver<ArbiterSubmission> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(iteration_id, tx);
        rx
    }

    /// Submits a decision for a pending iteration. Returns `false` if no
    /// arbiter is currently awaited for that iteration.
    pub async fn submit(&self, iteration_id: &IterationId, submission: ArbiterSubmission) -> bool {
        if let Some(tx) = self.pending.lock().await.remove(iteration_id) {
            tx.send(submission).is_ok()
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submission_wakes_the_registered_receiver() {
        let gate = ArbiterGate::new();
        let iteration_id = IterationId::new();
        let rx = gate.register(iteration_id.clone()).await;
        let submitted = gate
            .submit(
                &iteration_id,
                ArbiterSubmission {
                    decision: ArbiterDecisionKind::Approve,
                    feedback: None,
                    address_issues: None,
                    focus_files: None,
                },
            )
            .await;
        assert!(submitted);
        let received = rx.await.unwrap();
        assert_eq!(received.decision, ArbiterDecisionKind::Approve);
    }

    #[tokio::test]
    async fn submitting_for_an_unregistered_iteration_is_a_no_op() {
        let gate = ArbiterGate::new();
        let submitted = gate
            .submit(
                &IterationId::new(),
                ArbiterSubmission {
                    decision: ArbiterDecisionKind::Reject,
                    feedback: None,
                    address_issues: None,
                    focus_files: None,
                },
            )
            .await;
        assert!(!submitted);
    }
}
