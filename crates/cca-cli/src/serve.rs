//! The `serve` subcommand (spec §6 ambient: `cca-cli`): a JSON-RPC 2.0
//! stdio loop, grounded on `cli-sub-agent::mcp_server::run_mcp_server`'s
//! read-line/parse/dispatch/write-response structure.

use crate::app::App;
use anyhow::{Context, Result};
use cca_adapter::{RpcRequest, RpcResponse, RpcTransport};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{debug, error, info};

struct StdoutTransport;

impl RpcTransport for StdoutTransport {
    fn send_notification(&self, method: &str, params: serde_json::Value) {
        let envelope = serde_json::json!({"jsonrpc": "2.0", "method": method, "params": params});
        let mut stdout = std::io::stdout().lock();
        if writeln!(stdout, "{envelope}").is_ok() {
            let _ = stdout.flush();
        }
    }
}

pub async fn run(app: App) -> Result<()> {
    info!("starting cca JSON-RPC server on stdio");
    let adapter = app.rpc_adapter(Arc::new(StdoutTransport));

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read line from stdin")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        debug!(line = trimmed, "received request");

        let request: RpcRequest = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(e) => {
                error!("failed to parse request: {e}");
                write_response(&RpcResponse::err(None, cca_adapter::RpcError::new(cca_adapter::PARSE_ERROR, e.to_string())))?;
                continue;
            }
        };

        let response = adapter.handle(request).await;
        write_response(&response)?;
    }

    info!("cca server shutting down");
    Ok(())
}

fn write_response(response: &RpcResponse) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", serde_json::to_string(response)?).context("failed to write response")?;
    stdout.flush().context("failed to flush stdout")?;
    Ok(())
}
