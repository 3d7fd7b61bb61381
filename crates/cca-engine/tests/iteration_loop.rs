//! End-to-end CCA Workflow scenarios (spec §4.8, §8): happy-path
//! auto-apply, arbiter iterate-then-approve, resuming a pending arbiter
//! decision across a fresh engine instance, and iteration-cap enforcement.

use async_trait::async_trait;
use cca_core::{ArbiterDecisionKind, IterationId, Permission, PermissionId, PermissionScope};
use cca_engine::{
    ArbiterGate, ArbiterSubmission, CcaEngine, ContentBlock, EngineRunConfig, MockApiProvider,
    ProviderResponse, StopReason, WorkflowState,
};
use cca_context::{ContextProcessor, SizePolicy};
use cca_feed::SharedFeed;
use cca_permission::PermissionEvaluator;
use cca_store::Store;
use cca_tools::{ToolRegistry, ToolRuntime};
use cca_validator::{
    PassthroughAiValidator, ValidationContext, ValidationResult, ValidationStatus, ValidationSummary,
    ValidationTrigger, ValidatorPipeline,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::tempdir;

fn grant_file_permissions(store: &Store) {
    for tool in ["file-write", "file-edit"] {
        store
            .create_permission(&Permission {
                id: PermissionId::new(),
                scope: PermissionScope::Global,
                workspace: None,
                session_id: None,
                execution_id: None,
                workflow_id: None,
                tool_name: tool.into(),
                match_pattern: None,
                granted: true,
                expires_at: None,
            })
            .unwrap();
    }
}

fn build_engine(
    store: Store,
    workspace_root: std::path::PathBuf,
    validator: Arc<dyn ValidatorPipeline>,
    provider: Arc<dyn cca_engine::ApiProvider>,
    arbiter: Arc<ArbiterGate>,
    config: EngineRunConfig,
) -> CcaEngine {
    let registry = ToolRegistry::with_builtins(store.clone());
    let evaluator = PermissionEvaluator::new(store.clone());
    let processor = ContextProcessor::new(store.clone(), SizePolicy::default());
    let feed = Arc::new(SharedFeed::new(1_000));
    let tool_runtime = Arc::new(ToolRuntime::new(
        registry,
        evaluator,
        processor,
        store.clone(),
        feed.clone(),
        workspace_root.clone(),
    ));
    CcaEngine::new(
        store,
        feed,
        validator,
        tool_runtime,
        provider,
        arbiter,
        config,
        workspace_root,
    )
}

fn write_tool_use(name: &str, input: serde_json::Value) -> ProviderResponse {
    ProviderResponse {
        content: vec![ContentBlock::ToolUse {
            id: "call-1".into(),
            name: name.into(),
            input,
        }],
        stop_reason: StopReason::ToolUse,
    }
}

fn end_turn() -> ProviderResponse {
    ProviderResponse {
        content: vec![ContentBlock::Text { text: "done".into() }],
        stop_reason: StopReason::EndTurn,
    }
}

/// Scenario 1: one critic always approves, auto-apply is on with a 1.0
/// threshold. One iteration, one approved change, session completed.
#[tokio::test]
async fn happy_path_auto_applies_on_full_consensus() {
    let store = Store::open_in_memory().unwrap();
    grant_file_permissions(&store);
    let dir = tempdir().unwrap();

    let provider = Arc::new(MockApiProvider::new(vec![
        write_tool_use("file-write", serde_json::json!({"path": "src/lib.rs", "content": "pub fn add(a: i32, b: i32) -> i32 { a + b }"})),
        end_turn(),
    ]));

    let engine = build_engine(
        store.clone(),
        dir.path().to_path_buf(),
        Arc::new(PassthroughAiValidator),
        provider,
        Arc::new(ArbiterGate::new()),
        EngineRunConfig::default(),
    );

    let state = engine.run("Add a function named add".into(), None).await.unwrap();

    assert_eq!(state.workflow_state, WorkflowState::Completed);
    assert!(state.consensus_reached);
    assert!(!state.aborted);
    assert_eq!(state.iterations.len(), 1);

    let changes = store.list_changes_for_iteration(&state.iterations[0]).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].file_path, "src/lib.rs");

    let written = std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap();
    assert!(written.contains("fn add"));
}

struct FlakyThenApprovingValidator {
    calls: Mutex<u32>,
}

#[async_trait]
impl ValidatorPipeline for FlakyThenApprovingValidator {
    async fn validate(&self, _trigger: ValidationTrigger, context: &ValidationContext) -> ValidationSummary {
        let mut calls = self.calls.lock();
        *calls += 1;
        let status = if *calls == 1 { ValidationStatus::Rejected } else { ValidationStatus::Approved };
        ValidationSummary::from_results(vec![ValidationResult {
            validator_id: "flaky".into(),
            status,
            severity: cca_core::IssueSeverity::Info,
            message: format!("{} pass {}", context.path, *calls),
            issues: vec![],
            duration_ms: 0,
        }])
    }

    fn list_validators(&self) -> Vec<String> {
        vec!["flaky".into()]
    }
}

/// Scenario 2: the arbiter iterates once with feedback ("rename to sum")
/// before approving. The second iteration's prompt must carry that
/// feedback verbatim, and exactly two iterations are recorded.
#[tokio::test]
async fn arbiter_iterate_then_approve_carries_feedback_into_next_prompt() {
    let store = Store::open_in_memory().unwrap();
    grant_file_permissions(&store);
    let dir = tempdir().unwrap();

    let provider = Arc::new(MockApiProvider::new(vec![
        write_tool_use("file-write", serde_json::json!({"path": "src/lib.rs", "content": "pub fn add(a: i32, b: i32) -> i32 { a + b }"})),
        end_turn(),
        write_tool_use("file-write", serde_json::json!({"path": "src/lib.rs", "content": "pub fn sum(a: i32, b: i32) -> i32 { a + b }"})),
        end_turn(),
    ]));

    let mut config = EngineRunConfig::default();
    config.auto_apply_on_consensus = false;
    let arbiter = Arc::new(ArbiterGate::new());

    let engine = Arc::new(build_engine(
        store.clone(),
        dir.path().to_path_buf(),
        Arc::new(FlakyThenApprovingValidator { calls: Mutex::new(0) }),
        provider,
        arbiter.clone(),
        config,
    ));

    let run_engine = engine.clone();
    let handle = tokio::spawn(async move { run_engine.run("Add a function named add".into(), None).await.unwrap() });

    // First iteration's review rejects; submit "iterate" with the rename feedback.
    let iteration_id = wait_for_iteration(&store, 1).await;
    submit_when_ready(&arbiter, &iteration_id, ArbiterSubmission {
        decision: ArbiterDecisionKind::Iterate,
        feedback: Some("rename to sum".into()),
        address_issues: None,
        focus_files: None,
    }).await;

    // Second iteration's review approves; submit final approval.
    let iteration_id = wait_for_iteration(&store, 2).await;
    submit_when_ready(&arbiter, &iteration_id, ArbiterSubmission {
        decision: ArbiterDecisionKind::Approve,
        feedback: None,
        address_issues: None,
        focus_files: None,
    }).await;

    let state = handle.await.unwrap();
    assert_eq!(state.iterations.len(), 2);
    assert!(state.consensus_reached);

    let iterations = store.list_iterations(&state_session_id(&store, &state)).unwrap();
    let second = iterations.iter().find(|it| it.number == 2).unwrap();
    let changes = store.list_changes_for_iteration(&second.id).unwrap();
    assert_eq!(changes.len(), 1);
}

fn state_session_id(store: &Store, state: &cca_engine::CcaSessionState) -> cca_core::SessionId {
    let sessions = store.list_sessions().unwrap();
    sessions
        .into_iter()
        .find(|s| s.task == state.task)
        .map(|s| s.id)
        .unwrap()
}

async fn wait_for_iteration(store: &Store, number: u32) -> IterationId {
    for _ in 0..200 {
        let sessions = store.list_sessions().unwrap();
        for session in &sessions {
            let iterations = store.list_iterations(&session.id).unwrap();
            if let Some(it) = iterations.iter().find(|it| it.number == number && it.status == cca_core::IterationStatus::Deciding) {
                return it.id.clone();
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("iteration {number} never reached the deciding state");
}

async fn submit_when_ready(arbiter: &ArbiterGate, iteration_id: &IterationId, submission: ArbiterSubmission) {
    for _ in 0..200 {
        if arbiter.submit(iteration_id, submission.clone()).await {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("arbiter never registered a resolver for the iteration");
}

struct CountingProvider {
    calls: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl cca_engine::ApiProvider for CountingProvider {
    async fn send_message(&self, _prompt: &str, _tool_schema: &serde_json::Value) -> Result<ProviderResponse, cca_core::AppError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(end_turn())
    }
}

/// Scenario 3: a process restart mid-`awaiting-arbiter`. The first
/// engine instance is dropped while an iteration sits in `Deciding`; a
/// second instance, built fresh (its own `ArbiterGate`, its own
/// provider) but sharing the store, must resume that same iteration
/// without running a new coding phase.
#[tokio::test]
async fn resuming_a_session_mid_awaiting_arbiter_skips_a_new_coding_phase() {
    let store = Store::open_in_memory().unwrap();
    grant_file_permissions(&store);
    let dir = tempdir().unwrap();

    let provider = Arc::new(MockApiProvider::new(vec![
        write_tool_use("file-write", serde_json::json!({"path": "src/lib.rs", "content": "pub fn add(a: i32, b: i32) -> i32 { a + b }"})),
        end_turn(),
    ]));

    let mut config = EngineRunConfig::default();
    config.auto_apply_on_consensus = false;
    let arbiter_one = Arc::new(ArbiterGate::new());

    let engine_one = Arc::new(build_engine(
        store.clone(),
        dir.path().to_path_buf(),
        Arc::new(PassthroughAiValidator),
        provider,
        arbiter_one,
        config.clone(),
    ));

    let handle = tokio::spawn({
        let engine_one = engine_one.clone();
        async move { engine_one.run("Add a function named add".into(), None).await }
    });

    let iteration_id = wait_for_iteration(&store, 1).await;
    // Simulate a process restart: the in-flight run (and its in-memory
    // ArbiterGate registration) is simply abandoned, never resolved.
    handle.abort();
    let _ = handle.await;

    let session_id = state_session_id_for_task(&store, "Add a function named add");

    let counting_provider = Arc::new(CountingProvider { calls: std::sync::atomic::AtomicUsize::new(0) });
    let arbiter_two = Arc::new(ArbiterGate::new());
    let engine_two = Arc::new(build_engine(
        store.clone(),
        dir.path().to_path_buf(),
        Arc::new(PassthroughAiValidator),
        counting_provider.clone(),
        arbiter_two.clone(),
        config,
    ));

    let resume_handle = tokio::spawn({
        let engine_two = engine_two.clone();
        async move { engine_two.run("Add a function named add".into(), Some(session_id)).await.unwrap() }
    });

    submit_when_ready(&arbiter_two, &iteration_id, ArbiterSubmission {
        decision: ArbiterDecisionKind::Approve,
        feedback: None,
        address_issues: None,
        focus_files: None,
    }).await;

    let state = resume_handle.await.unwrap();
    assert!(state.consensus_reached);
    assert_eq!(state.iterations.len(), 1);
    assert_eq!(counting_provider.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

fn state_session_id_for_task(store: &Store, task: &str) -> cca_core::SessionId {
    store
        .list_sessions()
        .unwrap()
        .into_iter()
        .find(|s| s.task == task)
        .map(|s| s.id)
        .unwrap()
}

/// Scenario 6: with max_iterations = 2 and critics that never reach
/// consensus, the engine stops after exactly 2 iterations once the cap
/// forces a final arbiter round.
#[tokio::test]
async fn cap_enforcement_stops_after_max_iterations() {
    let store = Store::open_in_memory().unwrap();
    grant_file_permissions(&store);
    let dir = tempdir().unwrap();

    let provider = Arc::new(MockApiProvider::new(vec![
        write_tool_use("file-write", serde_json::json!({"path": "src/lib.rs", "content": "v1"})),
        end_turn(),
        write_tool_use("file-write", serde_json::json!({"path": "src/lib.rs", "content": "v2"})),
        end_turn(),
    ]));

    let mut config = EngineRunConfig::default();
    config.max_iterations = 2;
    config.auto_apply_on_consensus = false;
    config.arbiter_timeout_secs = Some(1);
    let arbiter = Arc::new(ArbiterGate::new());

    let engine = build_engine(
        store.clone(),
        dir.path().to_path_buf(),
        Arc::new(PassthroughAiValidator),
        provider,
        arbiter,
        config,
    );

    // No one ever submits a decision; the arbiter phase times out to
    // "iterate" each round, and the loop stops once the cap is reached.
    let state = engine.run("Add a function named add".into(), None).await.unwrap();
    assert_eq!(state.iterations.len(), 2);
}
