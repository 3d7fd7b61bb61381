//! The CCA Workflow: the primary iterative core (spec §4.8). Coordinates
//! the coding phase (agentic tool loop + inline critic review), the
//! review phase, consensus checking, and the arbiter phase across a
//! session's iterations.

use crate::arbiter::{ArbiterGate, ArbiterSubmission};
use crate::config::EngineRunConfig;
use crate::provider::{ApiProvider, StopReason};
use crate::prompt::{build_coder_prompt, PromptContext};
use crate::state::{CcaSessionState, WorkflowState};
use crate::suggestion;
use cca_core::{
    ArbiterDecision, ArbiterDecisionKind, ChangeId, ChangeOperation, ChangeStatus, CriticId, CriticReview, FeedEntryType,
    FeedSource, Iteration, IterationStatus, ProposedChange, ReviewId, ReviewProvider, ReviewVerdict, Session, SessionId,
    SessionStatus,
};
use cca_feed::{NewFeedEntry, SharedFeed};
use cca_store::Store;
use cca_tools::{ToolRequest, ToolRuntime};
use cca_validator::{ValidationContext, ValidationStatus, ValidationTrigger, ValidatorPipeline};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument, warn};

pub struct CcaEngine {
    store: Store,
    feed: Arc<SharedFeed>,
    validator: Arc<dyn ValidatorPipeline>,
    tool_runtime: Arc<ToolRuntime>,
    provider: Arc<dyn ApiProvider>,
    arbiter: Arc<ArbiterGate>,
    config: EngineRunConfig,
    workspace_root: PathBuf,
    pending_feedback: AsyncMutex<HashMap<SessionId, String>>,
}

struct ArbiterOutcome {
    submission: ArbiterSubmission,
}

impl CcaEngine {
    pub fn new(
        store: Store,
        feed: Arc<SharedFeed>,
        validator: Arc<dyn ValidatorPipeline>,
        tool_runtime: Arc<ToolRuntime>,
        provider: Arc<dyn ApiProvider>,
        arbiter: Arc<ArbiterGate>,
        config: EngineRunConfig,
        workspace_root: PathBuf,
    ) -> Self {
        Self {
            store,
            feed,
            validator,
            tool_runtime,
            provider,
            arbiter,
            config,
            workspace_root,
            pending_feedback: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Submits a human arbiter decision for a pending iteration. No-op
    /// (returns `false`) if no arbiter is currently awaited for it.
    pub async fn submit_arbiter_decision(&self, iteration_id: &cca_core::IterationId, submission: ArbiterSubmission) -> bool {
        self.arbiter.submit(iteration_id, submission).await
    }

    /// Stores feedback to prepend to the next coding prompt and clears
    /// the `aborted`/`consensus-reached` flags by resuming a completed
    /// session (spec §4.8 `continueWithFeedback`).
    pub async fn continue_with_feedback(&self, session_id: &SessionId, feedback: String) -> Result<CcaSessionState, cca_core::AppError> {
        self.pending_feedback.lock().await.insert(session_id.clone(), feedback);
        self.store.update_session_status(session_id, SessionStatus::Running)?;
        self.run(String::new(), Some(session_id.clone())).await
    }

    #[instrument(skip(self, task))]
    pub async fn run(&self, task: String, session_id: Option<SessionId>) -> Result<CcaSessionState, cca_core::AppError> {
        let session = self.resolve_session(task, session_id)?;
        let mut iterations = self.store.list_iterations(&session.id)?;

        let mut consensus_reached = false;
        let mut aborted = false;

        if let Some(pending) = iterations.iter().find(|it| it.status == IterationStatus::Deciding).cloned() {
            info!(iteration = pending.number, "run:restore-pending-arbiter");
            let changes = self.store.list_changes_for_iteration(&pending.id)?;
            let reviews = self.reviews_for_changes(&changes)?;
            let outcome = self.arbiter_phase(&session, &pending, &reviews, changes.is_empty(), false).await?;
            match self.apply_decision(&session, &pending, outcome.submission).await? {
                LoopControl::Stop { consensus, aborted: did_abort } => {
                    consensus_reached = consensus;
                    aborted = did_abort;
                }
                LoopControl::Continue => {}
            }
        }

        let mut current_iteration = iterations.len() as u32;
        let mut continuation_start = !iterations.is_empty() && current_iteration > 0;

        while !consensus_reached && !aborted && current_iteration < self.config.max_iterations {
            let iteration = self.store.start_next_iteration(&session.id)?;
            current_iteration = iteration.number;
            let is_cap_reached = current_iteration >= self.config.max_iterations;

            let previous_iteration_id = self.previous_iteration_id(&iterations, &iteration);
            let prior_decision = self.store.get_decision_for_iteration(&previous_iteration_id)?;
            let prior_changes = if prior_decision.is_some() {
                self.store.list_changes_for_iteration(&previous_iteration_id)?
            } else {
                Vec::new()
            };
            let prior_reviews = self.reviews_for_changes(&prior_changes)?;

            let human_feedback = self.pending_feedback.lock().await.remove(&session.id);
            let prompt = build_coder_prompt(PromptContext {
                task: &session.task,
                iteration_number: current_iteration,
                is_continuation_start: continuation_start,
                prior_decision: prior_decision.as_ref(),
                prior_reviews: &prior_reviews,
                human_feedback: human_feedback.as_deref(),
                forced_cap_notice: false,
            });
            continuation_start = false;

            let changes = self.coding_phase(&iteration, &prompt).await?;
            self.store.update_iteration_status(&iteration.id, IterationStatus::Reviewing)?;

            if changes.is_empty() {
                if current_iteration >= 2 {
                    self.post_audit_trail(current_iteration, &prior_reviews, &[], &[])?;
                }
                let outcome = self.arbiter_phase(&session, &iteration, &[], true, is_cap_reached).await?;
                match self.apply_decision(&session, &iteration, outcome.submission).await? {
                    LoopControl::Stop { consensus, aborted: did_abort } => {
                        consensus_reached = consensus;
                        aborted = did_abort;
                    }
                    LoopControl::Continue => {}
                }
                iterations = self.store.list_iterations(&session.id)?;
                continue;
            }

            let reviews = if self.config.validate_after_coding {
                self.review_phase(&changes).await?
            } else {
                Vec::new()
            };

            if current_iteration >= 2 {
                self.post_audit_trail(current_iteration, &prior_reviews, &changes, &reviews)?;
            }

            let approvals = reviews.iter().filter(|r| r.verdict == ReviewVerdict::Approve).count();
            let rejections = reviews.iter().filter(|r| r.verdict == ReviewVerdict::Reject).count();
            let has_blocking = reviews.iter().any(|r| r.has_blocking_issue());
            let total = reviews.len();
            let ratio = if total > 0 { approvals as f64 / total as f64 } else { 0.0 };

            if !is_cap_reached
                && self.config.auto_apply_on_consensus
                && ratio >= self.config.auto_apply_threshold
                && rejections == 0
                && !has_blocking
            {
                self.record_auto_decision(&iteration.id)?;
                self.store.update_session_status(&session.id, SessionStatus::Completed)?;
                consensus_reached = true;
            } else {
                let outcome = self.arbiter_phase(&session, &iteration, &reviews, false, is_cap_reached).await?;
                match self.apply_decision(&session, &iteration, outcome.submission).await? {
                    LoopControl::Stop { consensus, aborted: did_abort } => {
                        consensus_reached = consensus;
                        aborted = did_abort;
                    }
                    LoopControl::Continue => {}
                }
            }
            iterations = self.store.list_iterations(&session.id)?;
        }

        self.build_session_state(&session, consensus_reached, aborted)
    }

    fn resolve_session(&self, task: String, session_id: Option<SessionId>) -> Result<Session, cca_core::AppError> {
        if let Some(id) = session_id {
            if let Some(session) = self.store.get_session(&id)? {
                return Ok(session);
            }
        }
        let session = Session {
            id: SessionId::new(),
            task,
            status: SessionStatus::Running,
            coder_agent: "coder".into(),
            coder_model: "mock".into(),
            workspace_path: self.workspace_root.to_string_lossy().to_string(),
            config_snapshot: serde_json::json!({}),
            created_at: chrono::Utc::now(),
            completed_at: None,
        };
        self.store.create_session(&session)?;
        Ok(session)
    }

    fn previous_iteration_id(&self, iterations: &[Iteration], current: &Iteration) -> cca_core::IterationId {
        iterations
            .iter()
            .filter(|it| it.number == current.number.saturating_sub(1))
            .map(|it| it.id.clone())
            .next()
            .unwrap_or_else(|| current.id.clone())
    }

    fn reviews_for_changes(&self, changes: &[ProposedChange]) -> Result<Vec<CriticReview>, cca_core::AppError> {
        let mut reviews = Vec::new();
        for change in changes {
            reviews.extend(self.store.list_reviews_for_change(&change.id)?);
        }
        Ok(reviews)
    }

    /// Audit trail (spec §4.8): for iterations >= 2, maps every prior
    /// iteration's critic concern to the change (if any) that addressed
    /// its file this round, and posts one feed entry with the outcomes
    /// and counts.
    fn post_audit_trail(
        &self,
        iteration_number: u32,
        prior_reviews: &[CriticReview],
        changes: &[ProposedChange],
        reviews: &[CriticReview],
    ) -> Result<(), cca_core::AppError> {
        let mut addressed_change_ids = std::collections::HashSet::new();
        let mut concerns = Vec::new();

        for review in prior_reviews {
            for issue in &review.issues {
                let matching_change = issue
                    .file
                    .as_ref()
                    .and_then(|file| changes.iter().find(|c| &c.file_path == file));

                let outcome = match matching_change {
                    None => "not-addressed",
                    Some(change) => {
                        let new_reviews: Vec<&CriticReview> = reviews.iter().filter(|r| r.change_id == change.id).collect();
                        if new_reviews.iter().any(|r| r.has_blocking_issue()) || new_reviews.iter().any(|r| r.verdict == ReviewVerdict::Reject) {
                            "concerns"
                        } else if new_reviews.iter().any(|r| r.verdict == ReviewVerdict::Approve) {
                            "approved"
                        } else {
                            "partial"
                        }
                    }
                };

                let addressed_by = matching_change.map(|change| {
                    addressed_change_ids.insert(change.id.clone());
                    let (lines_added, lines_removed, snippet) =
                        summarize_diff(change.original_content.as_deref(), change.new_content.as_deref().unwrap_or_default());
                    serde_json::json!({
                        "file": change.file_path,
                        "change_type": format!("{:?}", change.operation),
                        "diff_snippet": snippet,
                        "lines_added": lines_added,
                        "lines_removed": lines_removed,
                    })
                });

                concerns.push(serde_json::json!({
                    "source_id": review.id.to_string(),
                    "file": issue.file,
                    "line": issue.line,
                    "addressed_by": addressed_by,
                    "outcome": outcome,
                }));
            }
        }

        let approvals = reviews.iter().filter(|r| r.verdict == ReviewVerdict::Approve).count();
        let new_issues: usize = reviews
            .iter()
            .filter(|r| !addressed_change_ids.contains(&r.change_id))
            .map(|r| r.issues.len())
            .sum();

        self.feed.post(NewFeedEntry {
            source: FeedSource::System,
            source_id: "audit-trail".into(),
            entry_type: FeedEntryType::Change,
            content: serde_json::json!({
                "iteration": iteration_number,
                "concerns": concerns,
                "approvals": approvals,
                "new_issues": new_issues,
            }),
            reply_to: None,
        });
        Ok(())
    }

    /// Agentic tool loop bounded by `max-tool-loops` (spec §4.8).
    async fn coding_phase(&self, iteration: &Iteration, prompt: &str) -> Result<Vec<ProposedChange>, cca_core::AppError> {
        let mut changes = Vec::new();
        let tool_schema = serde_json::json!({});
        let response = self.provider.send_message(prompt, &tool_schema).await?;
        let mut pending = response;
        let mut loops = 0u32;

        loop {
            let tool_uses: Vec<(String, String, serde_json::Value)> = pending
                .tool_uses()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if tool_uses.is_empty() {
                break;
            }

            for (_id, name, input) in tool_uses {
                loops += 1;
                if loops > self.config.max_tool_loops {
                    self.feed.post(NewFeedEntry {
                        source: FeedSource::System,
                        source_id: "engine".into(),
                        entry_type: FeedEntryType::System,
                        content: serde_json::json!({"message": "tool loop cap reached, returning control"}),
                        reply_to: None,
                    });
                    return Ok(changes);
                }

                if name == "file-write" || name == "file-edit" {
                    if let Some(change) = self.apply_file_change(iteration, &name, &input).await? {
                        changes.push(change);
                    }
                } else {
                    let _ = self
                        .tool_runtime
                        .execute(ToolRequest {
                            execution_id: cca_core::ExecutionId::from_raw(iteration.id.as_str()),
                            node_execution_id: None,
                            session_id: Some(SessionId::from_raw(iteration.session_id.as_str())),
                            agent_id: None,
                            tool_name: name,
                            input,
                            target_path: None,
                            critic_reviews: Vec::new(),
                        })
                        .await?;
                }
            }

            if pending.stop_reason == StopReason::EndTurn {
                break;
            }
            pending = self.provider.send_message(prompt, &tool_schema).await?;
            if matches!(pending.stop_reason, StopReason::EndTurn) && pending.content.is_empty() {
                break;
            }
        }
        Ok(changes)
    }

    /// Inline critic review runs first on the pending content, then the
    /// Tool Runtime actually performs the write (spec §4.8 coding phase).
    async fn apply_file_change(
        &self,
        iteration: &Iteration,
        tool_name: &str,
        input: &serde_json::Value,
    ) -> Result<Option<ProposedChange>, cca_core::AppError> {
        let path = input.get("path").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let pending_content = input
            .get("content")
            .or_else(|| input.get("new_string"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let inline = self
            .validator
            .validate(
                ValidationTrigger::OnChange,
                &ValidationContext {
                    path: path.clone(),
                    content: pending_content.clone(),
                    workspace_root: self.workspace_root.to_string_lossy().to_string(),
                },
            )
            .await;

        let original_content = tokio::fs::read_to_string(self.workspace_root.join(&path)).await.ok();
        let operation = if tool_name == "file-write" && original_content.is_none() {
            ChangeOperation::Create
        } else {
            ChangeOperation::Modify
        };

        let change_id = ChangeId::new();
        let inline_reviews: Vec<CriticReview> = inline
            .results
            .iter()
            .map(|result| CriticReview {
                id: ReviewId::new(),
                change_id: change_id.clone(),
                critic_id: CriticId::from_raw(result.validator_id.clone()),
                critic_name: result.validator_id.clone(),
                provider: ReviewProvider::Static,
                verdict: map_verdict(result.status),
                message: result.message.clone(),
                issues: vec![cca_core::CriticIssue {
                    severity: result.severity,
                    file: Some(path.clone()),
                    line: None,
                    blocking: cca_core::CriticIssue::resolve_blocking(result.severity, false),
                }],
            })
            .collect();

        let response = self
            .tool_runtime
            .execute(ToolRequest {
                execution_id: cca_core::ExecutionId::from_raw(iteration.id.as_str()),
                node_execution_id: None,
                session_id: Some(SessionId::from_raw(iteration.session_id.as_str())),
                agent_id: None,
                tool_name: tool_name.to_string(),
                input: input.clone(),
                target_path: Some(path.clone()),
                critic_reviews: inline_reviews.clone(),
            })
            .await?;

        if !response.1.success {
            warn!(path = %path, error = ?response.1.error, "coding:file_change_failed");
            return Ok(None);
        }

        let change = ProposedChange {
            id: change_id,
            iteration_id: iteration.id.clone(),
            file_path: path,
            operation,
            original_content,
            new_content: Some(pending_content),
            diff: None,
            status: ChangeStatus::Applied,
        };
        self.store.create_change(&change)?;

        for review in &inline_reviews {
            self.store.create_review(review)?;
        }

        Ok(Some(change))
    }

    /// Review phase (spec §4.8): runs the pipeline once over each changed
    /// file and persists the resulting reviews.
    async fn review_phase(&self, changes: &[ProposedChange]) -> Result<Vec<CriticReview>, cca_core::AppError> {
        let mut reviews = Vec::new();
        for change in changes {
            let existing = self.store.list_reviews_for_change(&change.id)?;
            if !existing.is_empty() {
                reviews.extend(existing);
                continue;
            }
            let summary = self
                .validator
                .validate(
                    ValidationTrigger::OnChange,
                    &ValidationContext {
                        path: change.file_path.clone(),
                        content: change.new_content.clone().unwrap_or_default(),
                        workspace_root: self.workspace_root.to_string_lossy().to_string(),
                    },
                )
                .await;
            for result in &summary.results {
                let review = CriticReview {
                    id: ReviewId::new(),
                    change_id: change.id.clone(),
                    critic_id: CriticId::from_raw(format!("{}-review", result.validator_id)),
                    critic_name: result.validator_id.clone(),
                    provider: ReviewProvider::Static,
                    verdict: map_verdict(result.status),
                    message: result.message.clone(),
                    issues: vec![cca_core::CriticIssue {
                        severity: result.severity,
                        file: Some(change.file_path.clone()),
                        line: None,
                        blocking: cca_core::CriticIssue::resolve_blocking(result.severity, false),
                    }],
                };
                self.store.create_review(&review)?;
                reviews.push(review);
            }
        }
        self.feed.post(NewFeedEntry {
            source: FeedSource::Validator,
            source_id: "review-phase".into(),
            entry_type: FeedEntryType::Critic,
            content: serde_json::json!({"review_count": reviews.len()}),
            reply_to: None,
        });
        Ok(reviews)
    }

    fn record_auto_decision(&self, iteration_id: &cca_core::IterationId) -> Result<(), cca_core::AppError> {
        self.store.record_decision(&ArbiterDecision {
            id: cca_core::DecisionId::new(),
            iteration_id: iteration_id.clone(),
            decision: ArbiterDecisionKind::Approve,
            feedback: None,
            address_issues: None,
            focus_files: None,
            decided_at: chrono::Utc::now(),
            decided_by: "auto-consensus".into(),
        })
    }

    /// Emits `awaiting-arbiter`, registers the resolver, and blocks until
    /// a decision is submitted (optionally timing out to `iterate`).
    async fn arbiter_phase(
        &self,
        session: &Session,
        iteration: &Iteration,
        reviews: &[CriticReview],
        no_changes: bool,
        forced: bool,
    ) -> Result<ArbiterOutcome, cca_core::AppError> {
        self.store.update_iteration_status(&iteration.id, IterationStatus::Deciding)?;

        let approvals = reviews.iter().filter(|r| r.verdict == ReviewVerdict::Approve).count();
        let has_blocking = reviews.iter().any(|r| r.has_blocking_issue());
        let suggested = suggestion::suggest(has_blocking, approvals, reviews.len());

        self.feed.post(NewFeedEntry {
            source: FeedSource::System,
            source_id: "arbiter".into(),
            entry_type: FeedEntryType::Decision,
            content: serde_json::json!({
                "iteration": iteration.number,
                "no_changes": no_changes,
                "forced": forced,
                "suggested": format!("{suggested:?}"),
                "message": if forced {
                    format!("iteration cap reached; forced arbiter decision for iteration {}", iteration.number)
                } else if no_changes {
                    "no files modified this iteration".to_string()
                } else {
                    format!("awaiting arbiter decision for iteration {}", iteration.number)
                },
            }),
            reply_to: None,
        });

        let rx = self.arbiter.register(iteration.id.clone()).await;
        let submission = match self.config.arbiter_timeout_secs {
            Some(secs) => match tokio::time::timeout(std::time::Duration::from_secs(secs), rx).await {
                Ok(Ok(submission)) => submission,
                _ => ArbiterSubmission {
                    decision: ArbiterDecisionKind::Iterate,
                    feedback: Some("arbiter decision timed out".into()),
                    address_issues: None,
                    focus_files: None,
                },
            },
            None => rx.await.unwrap_or(ArbiterSubmission {
                decision: ArbiterDecisionKind::Abort,
                feedback: Some("arbiter channel closed".into()),
                address_issues: None,
                focus_files: None,
            }),
        };

        self.store.record_decision(&ArbiterDecision {
            id: cca_core::DecisionId::new(),
            iteration_id: iteration.id.clone(),
            decision: submission.decision,
            feedback: submission.feedback.clone(),
            address_issues: submission.address_issues.clone(),
            focus_files: submission.focus_files.clone(),
            decided_at: chrono::Utc::now(),
            decided_by: "human".into(),
        })?;

        let _ = session;
        Ok(ArbiterOutcome { submission })
    }

    async fn apply_decision(
        &self,
        session: &Session,
        iteration: &Iteration,
        submission: ArbiterSubmission,
    ) -> Result<LoopControl, cca_core::AppError> {
        match submission.decision {
            ArbiterDecisionKind::Approve => {
                for change in self.store.list_changes_for_iteration(&iteration.id)? {
                    self.store.update_change_status(&change.id, ChangeStatus::Applied)?;
                }
                self.store.update_session_status(&session.id, SessionStatus::Completed)?;
                Ok(LoopControl::Stop { consensus: true, aborted: false })
            }
            ArbiterDecisionKind::Reject => {
                for change in self.store.list_changes_for_iteration(&iteration.id)? {
                    self.store.update_change_status(&change.id, ChangeStatus::Rejected)?;
                }
                self.store.update_session_status(&session.id, SessionStatus::Completed)?;
                Ok(LoopControl::Stop { consensus: true, aborted: false })
            }
            ArbiterDecisionKind::Abort => {
                self.store.update_session_status(&session.id, SessionStatus::Error)?;
                Ok(LoopControl::Stop { consensus: false, aborted: true })
            }
            ArbiterDecisionKind::Iterate => {
                if let Some(feedback) = submission.feedback {
                    self.pending_feedback.lock().await.insert(session.id.clone(), feedback);
                }
                Ok(LoopControl::Continue)
            }
        }
    }

    fn build_session_state(
        &self,
        session: &Session,
        consensus_reached: bool,
        aborted: bool,
    ) -> Result<CcaSessionState, cca_core::AppError> {
        let iterations = self.store.list_iterations(&session.id)?;
        let workflow_state = if aborted {
            WorkflowState::Error
        } else if consensus_reached {
            WorkflowState::Completed
        } else if iterations.iter().any(|it| it.status == IterationStatus::Deciding) {
            WorkflowState::AwaitingArbiter
        } else {
            WorkflowState::Iterating
        };

        Ok(CcaSessionState {
            workflow_state,
            task: session.task.clone(),
            iterations: iterations.iter().map(|it| it.id.clone()).collect(),
            current_iteration: iterations.len() as u32,
            max_iterations: self.config.max_iterations,
            consensus_reached,
            aborted,
            last_validation_summary: None,
        })
    }
}

enum LoopControl {
    Stop { consensus: bool, aborted: bool },
    Continue,
}

fn map_verdict(status: ValidationStatus) -> ReviewVerdict {
    match status {
        ValidationStatus::Approved => ReviewVerdict::Approve,
        ValidationStatus::Rejected => ReviewVerdict::Reject,
        ValidationStatus::NeedsRevision => ReviewVerdict::Concerns,
        ValidationStatus::Error => ReviewVerdict::Error,
    }
}

/// Line-set diff between a change's original and new content: a
/// representative snippet plus `+added/-removed` line counts, for the
/// audit trail feed entry.
fn summarize_diff(original: Option<&str>, new_content: &str) -> (usize, usize, String) {
    let old_lines: Vec<&str> = original.map(|s| s.lines().collect()).unwrap_or_default();
    let new_lines: Vec<&str> = new_content.lines().collect();
    let old_set: std::collections::HashSet<&str> = old_lines.iter().copied().collect();
    let new_set: std::collections::HashSet<&str> = new_lines.iter().copied().collect();

    let added: Vec<&str> = new_lines.iter().copied().filter(|l| !old_set.contains(l)).collect();
    let removed: Vec<&str> = old_lines.iter().copied().filter(|l| !new_set.contains(l)).collect();

    let mut snippet_lines = Vec::new();
    snippet_lines.extend(added.iter().take(3).map(|l| format!("+{l}")));
    snippet_lines.extend(removed.iter().take(3).map(|l| format!("-{l}")));

    (added.len(), removed.len(), snippet_lines.join("\n"))
}

