//! The Coder and Critic roles' vendor LLM HTTP client boundary (spec §6).
//! The real client is out of scope; this crate depends only on this
//! trait, mirroring the split between `MemoryLlmClient` and its transport
//! implementations.

use async_trait::async_trait;
use cca_core::AppError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

impl ProviderResponse {
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &serde_json::Value)> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            ContentBlock::Text { .. } => None,
        })
    }
}

#[async_trait]
pub trait ApiProvider: Send + Sync {
    /// Sends a prompt plus the available tool schema, bounded by
    /// `coder-timeout` (spec §5); the caller is responsible for applying
    /// the timeout since the provider boundary doesn't know which phase
    /// it's serving.
    async fn send_message(&self, prompt: &str, tool_schema: &serde_json::Value) -> Result<ProviderResponse, AppError>;
}
