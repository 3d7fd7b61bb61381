use crate::connection::Store;
use cca_core::{AppError, ChangeId, CriticId, CriticIssue, CriticReview, ReviewId, ReviewProvider, ReviewVerdict};
use rusqlite::params;

impl Store {
    /// Enforces "at most one review per (change-id, critic-id) pair"
    /// (spec §3) via the table's UNIQUE constraint, surfaced as
    /// `AppError::CriticPipelineError` rather than a raw sqlite error.
    pub fn create_review(&self, review: &CriticReview) -> Result<(), AppError> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO critic_reviews (id, change_id, critic_id, critic_name, provider, verdict, message, issues)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    review.id.as_str(),
                    review.change_id.as_str(),
                    review.critic_id.as_str(),
                    review.critic_name,
                    provider_str(review.provider),
                    verdict_str(review.verdict),
                    review.message,
                    serde_json::to_string(&review.issues)?,
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(AppError::CriticPipelineError(format!(
                        "critic '{}' already reviewed change '{}'",
                        review.critic_id, review.change_id
                    )))
                }
                Err(e) => Err(AppError::from(e)),
            }
        })
    }

    pub fn list_reviews_for_change(&self, change_id: &ChangeId) -> Result<Vec<CriticReview>, AppError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, change_id, critic_id, critic_name, provider, verdict, message, issues
                 FROM critic_reviews WHERE change_id = ?1",
            )?;
            let rows = stmt.query_map([change_id.as_str()], row_to_review)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
        })
    }
}

fn provider_str(provider: ReviewProvider) -> &'static str {
    match provider {
        ReviewProvider::Static => "static",
        ReviewProvider::Ai => "ai",
    }
}

fn parse_provider(s: &str) -> ReviewProvider {
    match s {
        "ai" => ReviewProvider::Ai,
        _ => ReviewProvider::Static,
    }
}

fn verdict_str(verdict: ReviewVerdict) -> &'static str {
    match verdict {
        ReviewVerdict::Approve => "approve",
        ReviewVerdict::Reject => "reject",
        ReviewVerdict::Concerns => "concerns",
        ReviewVerdict::Error => "error",
    }
}

fn parse_verdict(s: &str) -> ReviewVerdict {
    match s {
        "approve" => ReviewVerdict::Approve,
        "reject" => ReviewVerdict::Reject,
        "concerns" => ReviewVerdict::Concerns,
        _ => ReviewVerdict::Error,
    }
}

fn row_to_review(row: &rusqlite::Row<'_>) -> rusqlite::Result<CriticReview> {
    let issues_raw: String = row.get(7)?;
    let issues: Vec<CriticIssue> = serde_json::from_str(&issues_raw).unwrap_or_default();
    Ok(CriticReview {
        id: ReviewId::from_raw(row.get::<_, String>(0)?),
        change_id: ChangeId::from_raw(row.get::<_, String>(1)?),
        critic_id: CriticId::from_raw(row.get::<_, String>(2)?),
        critic_name: row.get(3)?,
        provider: parse_provider(&row.get::<_, String>(4)?),
        verdict: parse_verdict(&row.get::<_, String>(5)?),
        message: row.get(6)?,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_review(change_id: ChangeId, critic_id: CriticId) -> CriticReview {
        CriticReview {
            id: ReviewId::new(),
            change_id,
            critic_id,
            critic_name: "lint-critic".into(),
            provider: ReviewProvider::Static,
            verdict: ReviewVerdict::Approve,
            message: "looks fine".into(),
            issues: vec![],
        }
    }

    #[test]
    fn second_review_from_same_critic_on_same_change_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let change_id = ChangeId::new();
        let critic_id = CriticId::new();
        store.create_review(&sample_review(change_id.clone(), critic_id.clone())).unwrap();
        let second = store.create_review(&sample_review(change_id, critic_id));
        assert!(matches!(second, Err(AppError::CriticPipelineError(_))));
    }

    #[test]
    fn distinct_critics_can_both_review_same_change() {
        let store = Store::open_in_memory().unwrap();
        let change_id = ChangeId::new();
        store.create_review(&sample_review(change_id.clone(), CriticId::new())).unwrap();
        store.create_review(&sample_review(change_id.clone(), CriticId::new())).unwrap();
        let reviews = store.list_reviews_for_change(&change_id).unwrap();
        assert_eq!(reviews.len(), 2);
    }
}
