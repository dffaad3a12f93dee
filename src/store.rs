//! Persistence seam for queries and feedback.
//!
//! `PgStore` (in `db`) is the production implementation; `MemoryStore` keeps rows in
//! process and backs the test suite and `--in-memory` runs.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    FacultyReply, Feedback, FeedbackStatus, NewFeedback, NewQuery, PendingRow, Query,
    QueryStatus,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_query(&self, query: NewQuery) -> StoreResult<Query>;

    /// Queries owned by `user_id`, most recent first.
    async fn queries_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Query>>;

    async fn query_by_id(&self, query_id: Uuid) -> StoreResult<Option<Query>>;

    /// Marks the query flagged and inserts a pending feedback row as one unit.
    /// Returns `None`, with nothing written, when the query does not exist.
    async fn flag_query(
        &self,
        query_id: Uuid,
        feedback: NewFeedback,
    ) -> StoreResult<Option<Feedback>>;

    /// Pending feedback joined with its query, oldest first.
    async fn pending_feedback(&self) -> StoreResult<Vec<PendingRow>>;

    /// Records the faculty reply and touches the linked query as one unit.
    /// Returns `None` when the feedback row does not exist.
    async fn respond_to_feedback(
        &self,
        feedback_id: Uuid,
        reply: FacultyReply,
    ) -> StoreResult<Option<Feedback>>;

    async fn feedback_by_id(&self, feedback_id: Uuid) -> StoreResult<Option<Feedback>>;
}

#[derive(Default)]
struct Tables {
    queries: Vec<Query>,
    feedback: Vec<Feedback>,
}

/// In-process store. Both two-step mutations run under a single write lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_query(&self, query: NewQuery) -> StoreResult<Query> {
        let row = Query {
            id: Uuid::new_v4(),
            user_id: query.user_id,
            query_text: query.query_text,
            response_text: query.response_text,
            confidence_score: Some(query.confidence_score),
            status: query.status,
            created_at: query.created_at,
            updated_at: Some(query.created_at),
        };

        self.tables.write().await.queries.push(row.clone());
        Ok(row)
    }

    async fn queries_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Query>> {
        let tables = self.tables.read().await;
        let mut owned: Vec<Query> = tables
            .queries
            .iter()
            .filter(|query| query.user_id == user_id)
            .cloned()
            .collect();

        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn query_by_id(&self, query_id: Uuid) -> StoreResult<Option<Query>> {
        let tables = self.tables.read().await;
        Ok(tables.queries.iter().find(|query| query.id == query_id).cloned())
    }

    async fn flag_query(
        &self,
        query_id: Uuid,
        feedback: NewFeedback,
    ) -> StoreResult<Option<Feedback>> {
        let mut tables = self.tables.write().await;

        let Some(query) = tables.queries.iter_mut().find(|query| query.id == query_id) else {
            return Ok(None);
        };
        query.status = QueryStatus::Flagged;
        query.updated_at = Some(feedback.created_at);

        let row = Feedback {
            id: Uuid::new_v4(),
            query_id,
            student_id: feedback.student_id,
            faculty_id: None,
            feedback_text: feedback.feedback_text,
            faculty_response: None,
            status: FeedbackStatus::Pending,
            created_at: feedback.created_at,
            updated_at: None,
        };
        tables.feedback.push(row.clone());

        Ok(Some(row))
    }

    async fn pending_feedback(&self) -> StoreResult<Vec<PendingRow>> {
        let tables = self.tables.read().await;
        let mut rows = Vec::new();

        for feedback in tables
            .feedback
            .iter()
            .filter(|feedback| feedback.status == FeedbackStatus::Pending)
        {
            // Inner join: feedback whose query vanished is skipped.
            let Some(query) = tables.queries.iter().find(|q| q.id == feedback.query_id) else {
                continue;
            };
            rows.push(PendingRow {
                feedback: feedback.clone(),
                query_text: query.query_text.clone(),
                response_text: query.response_text.clone(),
                query_status: query.status,
            });
        }

        rows.sort_by(|a, b| a.feedback.created_at.cmp(&b.feedback.created_at));
        Ok(rows)
    }

    async fn respond_to_feedback(
        &self,
        feedback_id: Uuid,
        reply: FacultyReply,
    ) -> StoreResult<Option<Feedback>> {
        let mut tables = self.tables.write().await;

        let Some(feedback) = tables.feedback.iter_mut().find(|f| f.id == feedback_id) else {
            return Ok(None);
        };
        feedback.faculty_id = Some(reply.faculty_id);
        feedback.faculty_response = Some(reply.response_text);
        feedback.status = FeedbackStatus::Addressed;
        feedback.updated_at = Some(reply.responded_at);
        let updated = feedback.clone();

        if let Some(query) = tables.queries.iter_mut().find(|q| q.id == updated.query_id) {
            query.updated_at = Some(reply.responded_at);
        }

        Ok(Some(updated))
    }

    async fn feedback_by_id(&self, feedback_id: Uuid) -> StoreResult<Option<Feedback>> {
        let tables = self.tables.read().await;
        Ok(tables.feedback.iter().find(|f| f.id == feedback_id).cloned())
    }
}

#[cfg(test)]
impl MemoryStore {
    /// All feedback rows filed against a query, oldest first.
    pub async fn feedback_for_query(&self, query_id: Uuid) -> Vec<Feedback> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Feedback> = tables
            .feedback
            .iter()
            .filter(|f| f.query_id == query_id)
            .cloned()
            .collect();

        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }
}
