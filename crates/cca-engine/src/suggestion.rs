//! Suggestion policy for the arbiter prompt (spec §4.8): what the engine
//! recommends, not what it decides — the human (or an auto-resolver in
//! tests) still makes the call.

use cca_core::ArbiterDecisionKind;

pub fn suggest(has_blocking_error: bool, approvals: usize, total_reviews: usize) -> ArbiterDecisionKind {
    if has_blocking_error {
        return ArbiterDecisionKind::Iterate;
    }
    if total_reviews == 0 {
        return ArbiterDecisionKind::Iterate;
    }
    let ratio = approvals as f64 / total_reviews as f64;
    if ratio >= 0.8 {
        ArbiterDecisionKind::Approve
    } else if ratio <= 0.2 {
        ArbiterDecisionKind::Reject
    } else {
        ArbiterDecisionKind::Iterate
    }
}
