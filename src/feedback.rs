use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{require_text, AppError, Result};
use crate::models::{
    AddressedFeedback, FacultyReply, FeedbackRecord, NewFeedback, PendingFeedback,
};
use crate::store::Store;

#[derive(Clone)]
pub struct FeedbackWorkflow {
    store: Arc<dyn Store>,
}

impl FeedbackWorkflow {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Flags the query and files a pending feedback row against it.
    pub async fn flag(
        &self,
        query_id: Uuid,
        student_id: Uuid,
        feedback_text: &str,
    ) -> Result<FeedbackRecord> {
        require_text("feedback_text", feedback_text)?;

        let feedback = self
            .store
            .flag_query(
                query_id,
                NewFeedback {
                    student_id,
                    feedback_text: feedback_text.to_string(),
                    created_at: Utc::now(),
                },
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Query not found".to_string()))?;

        info!(%query_id, feedback_id = %feedback.id, %student_id, "Query flagged");
        Ok(feedback.into())
    }

    pub async fn list_pending(&self) -> Result<Vec<PendingFeedback>> {
        let rows = self.store.pending_feedback().await?;
        debug!(count = rows.len(), "Loaded pending feedback");
        Ok(rows.into_iter().map(PendingFeedback::from).collect())
    }

    /// Records a faculty reply. An unknown `feedback_id` is not an error and yields
    /// `None`; a repeated reply overwrites the previous one.
    pub async fn respond(
        &self,
        feedback_id: Uuid,
        faculty_id: Uuid,
        response_text: &str,
    ) -> Result<Option<AddressedFeedback>> {
        require_text("response_text", response_text)?;

        let Some(previous) = self.store.feedback_by_id(feedback_id).await? else {
            warn!(%feedback_id, "Response recorded for unknown feedback, nothing updated");
            return Ok(None);
        };
        if let Some(earlier) = previous.faculty_response.as_deref() {
            info!(
                %feedback_id,
                earlier_faculty = ?previous.faculty_id,
                earlier_reply = earlier,
                "Overwriting earlier faculty reply"
            );
        }

        let reply = FacultyReply {
            faculty_id,
            response_text: response_text.to_string(),
            responded_at: Utc::now(),
        };

        match self.store.respond_to_feedback(feedback_id, reply).await? {
            Some(feedback) => {
                info!(%feedback_id, %faculty_id, query_id = %feedback.query_id, "Feedback addressed");
                Ok(Some(feedback.into()))
            }
            None => {
                warn!(%feedback_id, "Feedback disappeared before the reply was stored");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeedbackStatus, NewQuery, Query, QueryStatus};
    use crate::store::MemoryStore;

    async fn setup() -> (FeedbackWorkflow, Arc<MemoryStore>, Query) {
        let store = Arc::new(MemoryStore::new());
        let query = store
            .insert_query(NewQuery {
                user_id: Uuid::new_v4(),
                query_text: "tuition deadline".to_string(),
                response_text: "Tuition is due on day one.".to_string(),
                confidence_score: 0.9,
                status: QueryStatus::Answered,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        (FeedbackWorkflow::new(store.clone()), store, query)
    }

    #[tokio::test]
    async fn flag_marks_query_and_files_one_pending_row() {
        let (workflow, store, query) = setup().await;
        let student = query.user_id;

        let record = workflow.flag(query.id, student, "Deadline moved").await.unwrap();
        assert_eq!(record.query_id, query.id);
        assert_eq!(record.status, FeedbackStatus::Pending);
        assert_eq!(record.feedback_text, "Deadline moved");

        let query = store.query_by_id(query.id).await.unwrap().unwrap();
        assert_eq!(query.status, QueryStatus::Flagged);
        assert!(query.updated_at >= Some(query.created_at));

        let rows = store.feedback_for_query(query.id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].student_id, student);
        assert_eq!(rows[0].status, FeedbackStatus::Pending);
    }

    #[tokio::test]
    async fn flag_on_missing_query_is_not_found_and_files_nothing() {
        let (workflow, _, _) = setup().await;
        let err = workflow
            .flag(Uuid::new_v4(), Uuid::new_v4(), "wrong answer")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(workflow.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_list_joins_query_and_skips_addressed() {
        let (workflow, _, query) = setup().await;
        let first = workflow.flag(query.id, query.user_id, "Too vague").await.unwrap();
        let second = workflow.flag(query.id, query.user_id, "Also wrong").await.unwrap();

        workflow.respond(first.id, Uuid::new_v4(), "Clarified").await.unwrap();

        let pending = workflow.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);
        assert_eq!(pending[0].query.query_text, "tuition deadline");
        assert_eq!(pending[0].query.response_text, "Tuition is due on day one.");
        assert_eq!(pending[0].query.status, QueryStatus::Flagged);
        assert!(pending.iter().all(|f| f.status == FeedbackStatus::Pending));
    }

    #[tokio::test]
    async fn respond_addresses_feedback_and_last_write_wins() {
        let (workflow, store, query) = setup().await;
        let flagged = workflow.flag(query.id, query.user_id, "Outdated").await.unwrap();
        let faculty = Uuid::new_v4();

        let first = workflow.respond(flagged.id, faculty, "Updated the page").await.unwrap();
        let first = first.unwrap();
        assert_eq!(first.status, FeedbackStatus::Addressed);
        assert_eq!(first.faculty_id, Some(faculty));

        workflow.respond(flagged.id, faculty, "Second thoughts").await.unwrap();
        let stored = store.feedback_by_id(flagged.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FeedbackStatus::Addressed);
        assert_eq!(stored.faculty_response.as_deref(), Some("Second thoughts"));

        let query = store.query_by_id(query.id).await.unwrap().unwrap();
        assert_eq!(query.status, QueryStatus::Flagged);
    }

    #[tokio::test]
    async fn respond_to_unknown_feedback_succeeds_without_effect() {
        let (workflow, _, _) = setup().await;
        let result = workflow
            .respond(Uuid::new_v4(), Uuid::new_v4(), "Hello")
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
