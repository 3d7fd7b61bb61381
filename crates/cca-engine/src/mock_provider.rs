//! A deterministic [`ApiProvider`] that proposes exactly the file changes
//! encoded in its canned script. Test/demo scaffolding only, mirroring
//! the teacher's `NoopClient` stand-in for a real vendor client.

use crate::provider::{ApiProvider, ProviderResponse, StopReason};
use async_trait::async_trait;
use cca_core::AppError;
use parking_lot::Mutex;

pub struct MockApiProvider {
    script: Mutex<std::collections::VecDeque<ProviderResponse>>,
}

impl MockApiProvider {
    pub fn new(script: Vec<ProviderResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }

    /// A provider that proposes nothing and ends its turn immediately,
    /// useful for exercising the "coder produced zero changes" path.
    pub fn empty() -> Self {
        Self::new(vec![ProviderResponse {
            content: vec![],
            stop_reason: StopReason::EndTurn,
        }])
    }
}

#[async_trait]
impl ApiProvider for MockApiProvider {
    async fn send_message(&self, _prompt: &str, _tool_schema: &serde_json::Value) -> Result<ProviderResponse, AppError> {
        let mut script = self.script.lock();
        Ok(script.pop_front().unwrap_or(ProviderResponse {
            content: vec![],
            stop_reason: StopReason::EndTurn,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ContentBlock;

    #[tokio::test]
    async fn replays_the_script_in_order_then_ends_turn() {
        let provider = MockApiProvider::new(vec![ProviderResponse {
            content: vec![ContentBlock::Text { text: "hi".into() }],
            stop_reason: StopReason::EndTurn,
        }]);
        let first = provider.send_message("task", &serde_json::json!({})).await.unwrap();
        assert_eq!(first.stop_reason, StopReason::EndTurn);
        let second = provider.send_message("task", &serde_json::json!({})).await.unwrap();
        assert!(second.content.is_empty());
    }
}
