use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    FacultyReply, Feedback, FeedbackStatus, NewFeedback, NewQuery, PendingRow, Query,
    QueryStatus,
};
use crate::store::{Store, StoreError, StoreResult};

const FEEDBACK_COLUMNS: &str = "f.id, f.query_id, f.student_id, f.faculty_id, f.feedback_text, \
     f.faculty_response, f.status, f.created_at, f.updated_at";

pub async fn init_db(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_status<T: std::str::FromStr<Err = String>>(row: &PgRow, column: &str) -> StoreResult<T> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(StoreError::Corrupt)
}

fn query_from_row(row: &PgRow) -> StoreResult<Query> {
    Ok(Query {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        query_text: row.try_get("query_text")?,
        response_text: row.try_get("response_text")?,
        confidence_score: row.try_get("confidence_score")?,
        status: parse_status(row, "status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn feedback_from_row(row: &PgRow) -> StoreResult<Feedback> {
    Ok(Feedback {
        id: row.try_get("id")?,
        query_id: row.try_get("query_id")?,
        student_id: row.try_get("student_id")?,
        faculty_id: row.try_get("faculty_id")?,
        feedback_text: row.try_get("feedback_text")?,
        faculty_response: row.try_get("faculty_response")?,
        status: parse_status(row, "status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn insert_query(&self, query: NewQuery) -> StoreResult<Query> {
        let row = sqlx::query(
            r#"
            INSERT INTO helpdesk.queries
            (id, user_id, query_text, response_text, confidence_score, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(query.user_id)
        .bind(&query.query_text)
        .bind(&query.response_text)
        .bind(query.confidence_score)
        .bind(query.status.as_str())
        .bind(query.created_at)
        .fetch_one(&self.pool)
        .await?;

        query_from_row(&row)
    }

    async fn queries_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Query>> {
        let rows = sqlx::query(
            "SELECT * FROM helpdesk.queries WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(query_from_row).collect()
    }

    async fn query_by_id(&self, query_id: Uuid) -> StoreResult<Option<Query>> {
        let row = sqlx::query("SELECT * FROM helpdesk.queries WHERE id = $1")
            .bind(query_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(query_from_row).transpose()
    }

    async fn flag_query(
        &self,
        query_id: Uuid,
        feedback: NewFeedback,
    ) -> StoreResult<Option<Feedback>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE helpdesk.queries SET status = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(QueryStatus::Flagged.as_str())
        .bind(feedback.created_at)
        .bind(query_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query(
            r#"
            INSERT INTO helpdesk.feedback
            (id, query_id, student_id, feedback_text, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(query_id)
        .bind(feedback.student_id)
        .bind(&feedback.feedback_text)
        .bind(FeedbackStatus::Pending.as_str())
        .bind(feedback.created_at)
        .fetch_one(&mut *tx)
        .await?;

        let created = feedback_from_row(&row)?;
        tx.commit().await?;
        Ok(Some(created))
    }

    async fn pending_feedback(&self) -> StoreResult<Vec<PendingRow>> {
        let sql = format!(
            "SELECT {FEEDBACK_COLUMNS}, q.query_text, q.response_text, q.status AS query_status \
             FROM helpdesk.feedback f \
             JOIN helpdesk.queries q ON q.id = f.query_id \
             WHERE f.status = $1 \
             ORDER BY f.created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(FeedbackStatus::Pending.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut pending = Vec::with_capacity(rows.len());
        for row in rows {
            pending.push(PendingRow {
                feedback: feedback_from_row(&row)?,
                query_text: row.try_get("query_text")?,
                response_text: row.try_get("response_text")?,
                query_status: parse_status(&row, "query_status")?,
            });
        }

        Ok(pending)
    }

    async fn respond_to_feedback(
        &self,
        feedback_id: Uuid,
        reply: FacultyReply,
    ) -> StoreResult<Option<Feedback>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE helpdesk.feedback
            SET faculty_id = $1, faculty_response = $2, status = $3, updated_at = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(reply.faculty_id)
        .bind(&reply.response_text)
        .bind(FeedbackStatus::Addressed.as_str())
        .bind(reply.responded_at)
        .bind(feedback_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let feedback = feedback_from_row(&row)?;

        sqlx::query("UPDATE helpdesk.queries SET updated_at = $1 WHERE id = $2")
            .bind(reply.responded_at)
            .bind(feedback.query_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(feedback))
    }

    async fn feedback_by_id(&self, feedback_id: Uuid) -> StoreResult<Option<Feedback>> {
        let sql = format!("SELECT {FEEDBACK_COLUMNS} FROM helpdesk.feedback f WHERE f.id = $1");
        let row = sqlx::query(&sql)
            .bind(feedback_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(feedback_from_row).transpose()
    }
}

// These run against a scratch database created per test:
// DATABASE_URL=postgres://... cargo test -- --ignored
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn feedback_rows(pool: &PgPool) -> i64 {
        sqlx::query("SELECT COUNT(*) AS n FROM helpdesk.feedback")
            .fetch_one(pool)
            .await
            .unwrap()
            .get("n")
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn flagging_missing_query_rolls_back(pool: PgPool) {
        let store = PgStore::new(pool.clone());
        let flagged = store
            .flag_query(
                Uuid::new_v4(),
                NewFeedback {
                    student_id: Uuid::new_v4(),
                    feedback_text: "Wrong building".to_string(),
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        assert!(flagged.is_none());
        assert_eq!(feedback_rows(&pool).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn flag_and_respond_update_both_tables(pool: PgPool) {
        let store = PgStore::new(pool.clone());
        let query = store
            .insert_query(NewQuery {
                user_id: Uuid::new_v4(),
                query_text: "parking permit".to_string(),
                response_text: "Campus Security sells permits.".to_string(),
                confidence_score: 0.9,
                status: QueryStatus::Answered,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(query.updated_at, Some(query.created_at));

        let feedback = store
            .flag_query(
                query.id,
                NewFeedback {
                    student_id: query.user_id,
                    feedback_text: "Prices are missing".to_string(),
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(feedback_rows(&pool).await, 1);
        assert_eq!(store.pending_feedback().await.unwrap().len(), 1);

        let faculty = Uuid::new_v4();
        let addressed = store
            .respond_to_feedback(
                feedback.id,
                FacultyReply {
                    faculty_id: faculty,
                    response_text: "Forty dollars per term.".to_string(),
                    responded_at: Utc::now(),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(addressed.status, FeedbackStatus::Addressed);
        assert_eq!(addressed.faculty_id, Some(faculty));
        let stored = store.feedback_by_id(feedback.id).await.unwrap().unwrap();
        assert_eq!(stored.faculty_response.as_deref(), Some("Forty dollars per term."));

        let query = store.query_by_id(query.id).await.unwrap().unwrap();
        assert_eq!(query.status, QueryStatus::Flagged);
        assert_eq!(query.updated_at, addressed.updated_at);
        assert!(store.pending_feedback().await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn responding_to_missing_feedback_changes_nothing(pool: PgPool) {
        let store = PgStore::new(pool);
        let result = store
            .respond_to_feedback(
                Uuid::new_v4(),
                FacultyReply {
                    faculty_id: Uuid::new_v4(),
                    response_text: "Noted".to_string(),
                    responded_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
