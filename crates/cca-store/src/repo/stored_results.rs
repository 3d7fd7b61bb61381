use crate::connection::Store;
use crate::repo::sessions::parse_ts;
use cca_core::{AppError, StoredResultId, StoredResultMeta};
use rusqlite::{params, OptionalExtension};

impl Store {
    pub fn store_full_result(
        &self,
        meta: &StoredResultMeta,
        full_result: &str,
    ) -> Result<(), AppError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO stored_results (id, tool_name, original_input, full_result, size_chars, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    meta.id.as_str(),
                    meta.tool_name,
                    serde_json::to_string(&meta.original_input)?,
                    full_result,
                    meta.size_chars as i64,
                    meta.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Paginated retrieval backing the `get-stored-result(id, offset,
    /// limit)` operation (spec §4.2).
    pub fn get_stored_result_page(
        &self,
        id: &StoredResultId,
        offset: usize,
        limit: usize,
    ) -> Result<Option<(StoredResultMeta, String)>, AppError> {
        self.with_conn(|conn| {
            let row: Option<(String, String, String, i64, String, String)> = conn
                .query_row(
                    "SELECT tool_name, original_input, full_result, size_chars, created_at, id FROM stored_results WHERE id = ?1",
                    [id.as_str()],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    },
                )
                .optional()?;
            let Some((tool_name, input_raw, full_result, size_chars, created_at, id_raw)) = row else {
                return Ok(None);
            };
            let page: String = full_result
                .chars()
                .skip(offset)
                .take(limit)
                .collect();
            let meta = StoredResultMeta {
                id: StoredResultId::from_raw(id_raw),
                tool_name,
                original_input: serde_json::from_str(&input_raw).unwrap_or(serde_json::Value::Null),
                size_chars: size_chars as usize,
                created_at: parse_ts(&created_at),
            };
            Ok(Some((meta, page)))
        })
    }

    /// Evicts oldest stored results beyond `cap` (default 1000, spec §3).
    pub fn evict_stored_results(&self, cap: usize) -> Result<usize, AppError> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM stored_results", [], |r| r.get(0))?;
            let overflow = (total as usize).saturating_sub(cap);
            if overflow == 0 {
                return Ok(0);
            }
            conn.execute(
                "DELETE FROM stored_results WHERE id IN (
                    SELECT id FROM stored_results ORDER BY created_at ASC LIMIT ?1
                 )",
                [overflow as i64],
            )?;
            Ok(overflow)
        })
    }
}
