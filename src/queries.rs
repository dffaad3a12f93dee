use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{require_text, AppError, Result};
use crate::models::{Identity, NewQuery, QueryRecord, QueryStatus};
use crate::responder::Responder;
use crate::store::Store;

#[derive(Clone)]
pub struct QueryWorkflow {
    store: Arc<dyn Store>,
    responder: Arc<dyn Responder>,
}

impl QueryWorkflow {
    pub fn new(store: Arc<dyn Store>, responder: Arc<dyn Responder>) -> Self {
        Self { store, responder }
    }

    /// Answers the query synchronously and persists it as `answered`.
    pub async fn submit(&self, user_id: Uuid, query_text: &str) -> Result<QueryRecord> {
        require_text("query_text", query_text)?;

        let answer = self.responder.respond(query_text);
        let query = self
            .store
            .insert_query(NewQuery {
                user_id,
                query_text: query_text.to_string(),
                response_text: answer.response_text,
                confidence_score: answer.confidence,
                status: QueryStatus::Answered,
                created_at: Utc::now(),
            })
            .await?;

        info!(query_id = %query.id, %user_id, confidence = answer.confidence, "Query answered");
        Ok(query.into())
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<QueryRecord>> {
        let queries = self.store.queries_for_user(user_id).await?;
        debug!(%user_id, count = queries.len(), "Loaded query history");
        Ok(queries.into_iter().map(QueryRecord::from).collect())
    }

    pub async fn get_by_id(&self, query_id: Uuid) -> Result<QueryRecord> {
        self.store
            .query_by_id(query_id)
            .await?
            .map(QueryRecord::from)
            .ok_or_else(|| AppError::NotFound("Query not found".to_string()))
    }
}

/// Owners and faculty may read a query; everyone else is refused.
pub fn authorize_view(viewer: &Identity, record: &QueryRecord) -> Result<()> {
    if record.user_id == viewer.id || viewer.is_faculty() {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "Not authorized to view this query".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::responder::KeywordResponder;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn workflow() -> (QueryWorkflow, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let responder = KeywordResponder::new(vec![(
            "library".to_string(),
            "Library is open until 22:00.".to_string(),
        )])
        .unwrap();
        (QueryWorkflow::new(store.clone(), Arc::new(responder)), store)
    }

    fn identity(role: Role) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            role,
            full_name: "Someone".to_string(),
            last_sign_in_at: None,
        }
    }

    #[tokio::test]
    async fn submit_records_answered_query() {
        let (workflow, _) = workflow();
        let record = workflow.submit(Uuid::new_v4(), "library hours").await.unwrap();

        assert_eq!(record.status, QueryStatus::Answered);
        assert_eq!(record.response.response_text, "Library is open until 22:00.");
        assert_eq!(record.response.confidence_score, Some(0.9));
        assert_eq!(record.updated_at, Some(record.created_at));
    }

    #[tokio::test]
    async fn submit_keeps_unmatched_queries_with_fallback() {
        let (workflow, _) = workflow();
        let record = workflow
            .submit(Uuid::new_v4(), "spaceship launch schedule")
            .await
            .unwrap();

        let confidence = record.response.confidence_score.unwrap();
        assert!((0.0..=1.0).contains(&confidence));
        assert_eq!(confidence, 0.3);
    }

    #[tokio::test]
    async fn submit_rejects_blank_text() {
        let (workflow, _) = workflow();
        let err = workflow.submit(Uuid::new_v4(), "  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn history_only_contains_own_queries_newest_first() {
        let (workflow, store) = workflow();
        let owner = Uuid::new_v4();
        for (text, minutes_ago) in [("first", 20), ("second", 10), ("third", 1)] {
            store
                .insert_query(NewQuery {
                    user_id: owner,
                    query_text: text.to_string(),
                    response_text: "answer".to_string(),
                    confidence_score: 0.9,
                    status: QueryStatus::Answered,
                    created_at: Utc::now() - Duration::minutes(minutes_ago),
                })
                .await
                .unwrap();
        }
        workflow.submit(Uuid::new_v4(), "library").await.unwrap();

        let history = workflow.list_for_user(owner).await.unwrap();
        let texts: Vec<&str> = history.iter().map(|q| q.query_text.as_str()).collect();
        assert_eq!(texts, vec!["third", "second", "first"]);
        assert!(history.iter().all(|q| q.user_id == owner));
        assert!(workflow.list_for_user(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_by_id_reports_missing_queries() {
        let (workflow, _) = workflow();
        let err = workflow.get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn only_owner_or_faculty_may_view() {
        let (workflow, _) = workflow();
        let owner = identity(Role::Student);
        let record = workflow.submit(owner.id, "library").await.unwrap();
        let fetched = workflow.get_by_id(record.id).await.unwrap();

        assert!(authorize_view(&owner, &fetched).is_ok());
        assert!(authorize_view(&identity(Role::Faculty), &fetched).is_ok());
        assert!(matches!(
            authorize_view(&identity(Role::Student), &fetched),
            Err(AppError::Forbidden(_))
        ));
    }
}
