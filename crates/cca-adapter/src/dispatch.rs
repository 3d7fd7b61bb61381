//! Request dispatch table (spec §6), grounded on
//! `cli-sub-agent::mcp_server::handle_request`'s `match request.method`
//! idiom, generalized from the teacher's MCP tool-call surface to the
//! `workflow/...` JSON-RPC method namespace.

use crate::protocol::{app_error_to_rpc, RpcError, RpcRequest, RpcResponse, INVALID_PARAMS, METHOD_NOT_FOUND};
use crate::transport::RpcTransport;
use cca_core::{ArbiterDecisionKind, IterationId, SessionId};
use cca_engine::{ArbiterGate, ArbiterSubmission, CcaEngine};
use cca_feed::SharedFeed;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

pub struct RpcAdapter {
    engine: Arc<CcaEngine>,
    arbiter: Arc<ArbiterGate>,
    transport: Arc<dyn RpcTransport>,
}

impl RpcAdapter {
    pub fn new(engine: Arc<CcaEngine>, arbiter: Arc<ArbiterGate>, transport: Arc<dyn RpcTransport>) -> Self {
        Self { engine, arbiter, transport }
    }

    /// Forwards every posted feed entry as a `workflow/feedEntry`
    /// notification, keeping the transport boundary the only place that
    /// knows about JSON-RPC framing.
    pub fn subscribe_feed(&self, feed: &SharedFeed) {
        let transport = self.transport.clone();
        feed.subscribe(Arc::new(move |entry| {
            transport.send_notification(
                "workflow/feedEntry",
                serde_json::to_value(entry).unwrap_or(serde_json::Value::Null),
            );
        }));
    }

    #[instrument(skip(self, request), fields(method = %request.method))]
    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone();
        let result = match request.method.as_str() {
            "workflow/run" => self.handle_run(request.params).await,
            "workflow/continueWithFeedback" => self.handle_continue_with_feedback(request.params).await,
            "workflow/submitArbiterDecision" => self.handle_submit_arbiter_decision(request.params).await,
            _ => Err(RpcError::new(METHOD_NOT_FOUND, format!("unknown method '{}'", request.method))),
        };
        match result {
            Ok(value) => RpcResponse::ok(id, value),
            Err(error) => RpcResponse::err(id, error),
        }
    }

    async fn handle_run(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, RpcError> {
        #[derive(Deserialize)]
        struct Params {
            task: String,
            #[serde(default)]
            session_id: Option<String>,
        }
        let params: Params = parse_params(params)?;
        let state = self
            .engine
            .run(params.task, params.session_id.map(SessionId::from_raw))
            .await
            .map_err(|e| app_error_to_rpc(&e))?;
        Ok(serde_json::to_value(state).unwrap_or(serde_json::Value::Null))
    }

    async fn handle_continue_with_feedback(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, RpcError> {
        #[derive(Deserialize)]
        struct Params {
            session_id: String,
            feedback: String,
        }
        let params: Params = parse_params(params)?;
        let state = self
            .engine
            .continue_with_feedback(&SessionId::from_raw(params.session_id), params.feedback)
            .await
            .map_err(|e| app_error_to_rpc(&e))?;
        Ok(serde_json::to_value(state).unwrap_or(serde_json::Value::Null))
    }

    async fn handle_submit_arbiter_decision(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, RpcError> {
        #[derive(Deserialize)]
        struct Params {
            iteration_id: String,
            decision: String,
            #[serde(default)]
            feedback: Option<String>,
            #[serde(default)]
            address_issues: Option<Vec<String>>,
            #[serde(default)]
            focus_files: Option<Vec<String>>,
        }
        let params: Params = parse_params(params)?;
        let decision = parse_decision(&params.decision)?;
        let accepted = self
            .arbiter
            .submit(
                &IterationId::from_raw(params.iteration_id),
                ArbiterSubmission {
                    decision,
                    feedback: params.feedback,
                    address_issues: params.address_issues,
                    focus_files: params.focus_files,
                },
            )
            .await;
        Ok(serde_json::json!({ "accepted": accepted }))
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Option<serde_json::Value>) -> Result<T, RpcError> {
    let value = params.ok_or_else(|| RpcError::new(INVALID_PARAMS, "missing params"))?;
    serde_json::from_value(value).map_err(|e| RpcError::new(INVALID_PARAMS, e.to_string()))
}

fn parse_decision(raw: &str) -> Result<ArbiterDecisionKind, RpcError> {
    match raw {
        "approve" => Ok(ArbiterDecisionKind::Approve),
        "reject" => Ok(ArbiterDecisionKind::Reject),
        "iterate" => Ok(ArbiterDecisionKind::Iterate),
        "abort" => Ok(ArbiterDecisionKind::Abort),
        other => Err(RpcError::new(INVALID_PARAMS, format!("unknown decision '{other}'"))),
    }
}
