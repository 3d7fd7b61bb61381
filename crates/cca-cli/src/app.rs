//! Wires every crate into a runnable engine (spec §6 ambient: `cca-cli`).
//! Persisted state layout is `<workspace>/.cca/chat.db`, mirroring the
//! teacher's `~/.local/state/csa/<project>` convention for where
//! per-workspace state lives.

use cca_adapter::RpcAdapter;
use cca_config::EngineConfig;
use cca_context::{ContextProcessor, SizePolicy};
use cca_core::AppError;
use cca_engine::{ArbiterGate, CcaEngine, EngineRunConfig, MockApiProvider};
use cca_feed::SharedFeed;
use cca_permission::PermissionEvaluator;
use cca_store::Store;
use cca_tools::{ToolRegistry, ToolRuntime};
use cca_validator::PassthroughAiValidator;
use cca_workflow::WorkflowExecutor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const STATE_DIR: &str = ".cca";
pub const STATE_DB: &str = "chat.db";

/// Every long-lived component a running session needs, held together so
/// `serve` and `run` can share the same bootstrap path.
pub struct App {
    pub engine: Arc<CcaEngine>,
    pub arbiter: Arc<ArbiterGate>,
    pub feed: Arc<SharedFeed>,
    #[allow(dead_code)]
    pub workflow_executor: WorkflowExecutor,
}

impl App {
    pub fn bootstrap(project_root: &Path) -> Result<Self, AppError> {
        let config = load_config(project_root)?;
        config.validate()?;

        let state_dir = project_root.join(STATE_DIR);
        std::fs::create_dir_all(&state_dir)?;
        let store = Store::open(state_dir.join(STATE_DB))?;

        let feed = Arc::new(SharedFeed::default());
        let registry = ToolRegistry::with_builtins(store.clone());
        let evaluator = PermissionEvaluator::new(store.clone());
        let size_policy = to_size_policy(&config);
        let processor = ContextProcessor::new(store.clone(), size_policy);
        let tool_runtime = Arc::new(ToolRuntime::new(
            registry,
            evaluator,
            processor,
            store.clone(),
            feed.clone(),
            project_root.to_path_buf(),
        ));

        let arbiter = Arc::new(ArbiterGate::new());
        let workflow_executor = WorkflowExecutor::new(store.clone());

        let engine = Arc::new(CcaEngine::new(
            store,
            feed.clone(),
            Arc::new(PassthroughAiValidator),
            tool_runtime,
            Arc::new(MockApiProvider::empty()),
            arbiter.clone(),
            to_engine_run_config(&config),
            project_root.to_path_buf(),
        ));

        Ok(Self { engine, arbiter, feed, workflow_executor })
    }

    pub fn rpc_adapter(&self, transport: Arc<dyn cca_adapter::RpcTransport>) -> RpcAdapter {
        let adapter = RpcAdapter::new(self.engine.clone(), self.arbiter.clone(), transport);
        adapter.subscribe_feed(&self.feed);
        adapter
    }
}

fn load_config(project_root: &Path) -> Result<EngineConfig, AppError> {
    let defaults = EngineConfig::default();
    match EngineConfig::load(project_root)? {
        Some(overlay) => defaults.merge(overlay),
        None => Ok(defaults),
    }
}

fn to_engine_run_config(config: &EngineConfig) -> EngineRunConfig {
    EngineRunConfig {
        max_iterations: config.engine.max_iterations,
        max_tool_loops: config.engine.max_tool_loops,
        validate_after_coding: config.engine.validate_after_coding,
        auto_apply_on_consensus: config.engine.auto_apply_on_consensus,
        auto_apply_threshold: config.engine.auto_apply_threshold,
        coder_timeout_secs: config.engine.coder_timeout_secs,
        arbiter_timeout_secs: config.engine.arbiter_timeout_secs,
    }
}

fn to_size_policy(config: &EngineConfig) -> SizePolicy {
    SizePolicy {
        file_read_chars: config.size_policy.file_read_chars,
        file_glob_entries: config.size_policy.file_glob_entries,
        file_grep_matches: config.size_policy.file_grep_matches,
        shell_exec_chars: config.size_policy.shell_exec_chars,
        other_chars: config.size_policy.other_chars,
    }
}

pub fn resolve_project_root(explicit: Option<PathBuf>) -> std::io::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => std::env::current_dir(),
    }
}
