//! JSON-RPC 2.0 envelope types (spec §6), grounded on
//! `cli-sub-agent::mcp_server`'s `JsonRpcRequest`/`JsonRpcResponse` pair.

use cca_core::AppError;
use serde::{Deserialize, Serialize};

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Domain error codes (spec §6): one band reserved outside the standard
/// JSON-RPC range for `AppError` variants the standard codes don't fit.
const DOMAIN_ERROR_BASE: i32 = -32300;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

fn jsonrpc_version() -> String {
    "2.0".to_string()
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

impl RpcResponse {
    pub fn ok(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn err(id: Option<serde_json::Value>, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Maps the engine-wide error taxonomy onto JSON-RPC error codes (spec
/// §7): standard codes for malformed requests, a reserved domain band for
/// everything else, keeping `cca-core` itself transport-agnostic.
pub fn app_error_to_rpc(err: &AppError) -> RpcError {
    let code = match err {
        AppError::InvalidParams { .. } => INVALID_PARAMS,
        AppError::SessionNotFound(_) => DOMAIN_ERROR_BASE,
        AppError::IterationNotFound(_) => DOMAIN_ERROR_BASE - 1,
        AppError::ExecutionNotFound(_) => DOMAIN_ERROR_BASE - 2,
        AppError::WorkflowNotFound(_) => DOMAIN_ERROR_BASE - 3,
        AppError::AgentNotFound(_) => DOMAIN_ERROR_BASE - 4,
        AppError::ThemeNotFound(_) => DOMAIN_ERROR_BASE - 5,
        AppError::ValidationFailed(_) => DOMAIN_ERROR_BASE - 6,
        AppError::PermissionDenied(_) => DOMAIN_ERROR_BASE - 7,
        AppError::ToolNotFound(_) => DOMAIN_ERROR_BASE - 8,
        AppError::ToolTimeout { .. } => DOMAIN_ERROR_BASE - 9,
        AppError::ToolHandlerError { .. } => DOMAIN_ERROR_BASE - 10,
        AppError::CriticPipelineError(_) => DOMAIN_ERROR_BASE - 11,
        AppError::WorkflowStall(_) => DOMAIN_ERROR_BASE - 12,
        AppError::NotInitialized => DOMAIN_ERROR_BASE - 13,
        AppError::AgentExists(_) => DOMAIN_ERROR_BASE - 14,
        AppError::AgentBusy(_) => DOMAIN_ERROR_BASE - 15,
        AppError::MessageFailed(_) => DOMAIN_ERROR_BASE - 16,
        AppError::MemoryError(_) => DOMAIN_ERROR_BASE - 17,
        AppError::Store(_) | AppError::Io(_) | AppError::Serde(_) | AppError::Internal(_) => INTERNAL_ERROR,
    };
    RpcError::new(code, err.to_string())
}
