use crate::handler::{ToolContext, ToolHandler};
use async_trait::async_trait;
use cca_context::{get_stored_result, RawResult};
use cca_core::{AppError, StoredResultId};
use cca_store::Store;

/// The paginated fetch tool (spec §4.2/§4.4). Never requires permission.
pub struct StoredResultHandler {
    store: Store,
}

impl StoredResultHandler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for StoredResultHandler {
    fn name(&self) -> &'static str {
        "get-stored-result"
    }

    fn requires_permission(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        input: &serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<RawResult, AppError> {
        let id = input
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::InvalidParams {
                field: "id".into(),
                message: "required".into(),
            })?;
        let offset = input.get("offset").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let limit = input.get("limit").and_then(|v| v.as_u64()).unwrap_or(10_000) as usize;
        let page = get_stored_result(&self.store, &StoredResultId::from_raw(id), offset, limit)?
            .ok_or_else(|| AppError::Internal(format!("stored result '{id}' not found")))?;
        Ok(RawResult::Text(
            serde_json::to_string(&page).unwrap_or_default(),
        ))
    }
}
