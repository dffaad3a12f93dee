use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Answered,
    Flagged,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Pending => "pending",
            QueryStatus::Answered => "answered",
            QueryStatus::Flagged => "flagged",
        }
    }
}

impl FromStr for QueryStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(QueryStatus::Pending),
            "answered" => Ok(QueryStatus::Answered),
            "flagged" => Ok(QueryStatus::Flagged),
            other => Err(format!("unknown query status '{other}'")),
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Pending,
    Addressed,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "pending",
            FeedbackStatus::Addressed => "addressed",
        }
    }
}

impl FromStr for FeedbackStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(FeedbackStatus::Pending),
            "addressed" => Ok(FeedbackStatus::Addressed),
            other => Err(format!("unknown feedback status '{other}'")),
        }
    }
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored query row.
#[derive(Debug, Clone)]
pub struct Query {
    pub id: Uuid,
    pub user_id: Uuid,
    pub query_text: String,
    pub response_text: String,
    pub confidence_score: Option<f64>,
    pub status: QueryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewQuery {
    pub user_id: Uuid,
    pub query_text: String,
    pub response_text: String,
    pub confidence_score: f64,
    pub status: QueryStatus,
    pub created_at: DateTime<Utc>,
}

/// A stored feedback row. `Addressed` rows always carry a faculty id and reply.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub id: Uuid,
    pub query_id: Uuid,
    pub student_id: Uuid,
    pub faculty_id: Option<Uuid>,
    pub feedback_text: String,
    pub faculty_response: Option<String>,
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub student_id: Uuid,
    pub feedback_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FacultyReply {
    pub faculty_id: Uuid,
    pub response_text: String,
    pub responded_at: DateTime<Utc>,
}

/// Pending feedback joined with the query it objects to.
#[derive(Debug, Clone)]
pub struct PendingRow {
    pub feedback: Feedback,
    pub query_text: String,
    pub response_text: String,
    pub query_status: QueryStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub response_text: String,
    pub confidence_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord {
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: Uuid,
    pub query_text: String,
    pub response: QueryResponse,
    pub status: QueryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Query> for QueryRecord {
    fn from(query: Query) -> Self {
        Self {
            id: query.id,
            user_id: query.user_id,
            query_text: query.query_text,
            response: QueryResponse {
                response_text: query.response_text,
                confidence_score: query.confidence_score,
            },
            status: query.status,
            created_at: query.created_at,
            updated_at: query.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub query_id: Uuid,
    pub feedback_text: String,
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Feedback> for FeedbackRecord {
    fn from(feedback: Feedback) -> Self {
        Self {
            id: feedback.id,
            query_id: feedback.query_id,
            feedback_text: feedback.feedback_text,
            status: feedback.status,
            created_at: feedback.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkedQuery {
    pub query_text: String,
    pub response_text: String,
    pub status: QueryStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingFeedback {
    pub id: Uuid,
    pub query_id: Uuid,
    pub student_id: Uuid,
    pub feedback_text: String,
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
    pub query: LinkedQuery,
}

impl From<PendingRow> for PendingFeedback {
    fn from(row: PendingRow) -> Self {
        Self {
            id: row.feedback.id,
            query_id: row.feedback.query_id,
            student_id: row.feedback.student_id,
            feedback_text: row.feedback.feedback_text,
            status: row.feedback.status,
            created_at: row.feedback.created_at,
            query: LinkedQuery {
                query_text: row.query_text,
                response_text: row.response_text,
                status: row.query_status,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressedFeedback {
    pub id: Uuid,
    pub query_id: Uuid,
    pub student_id: Uuid,
    pub faculty_id: Option<Uuid>,
    pub feedback_text: String,
    pub faculty_response: Option<String>,
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Feedback> for AddressedFeedback {
    fn from(feedback: Feedback) -> Self {
        Self {
            id: feedback.id,
            query_id: feedback.query_id,
            student_id: feedback.student_id,
            faculty_id: feedback.faculty_id,
            feedback_text: feedback.feedback_text,
            faculty_response: feedback.faculty_response,
            status: feedback.status,
            created_at: feedback.created_at,
            updated_at: feedback.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
        }
    }

    /// Roles come from free-form user metadata; anything but "faculty" is a student.
    pub fn from_metadata(value: Option<&str>) -> Self {
        match value {
            Some("faculty") => Role::Faculty,
            _ => Role::Student,
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub full_name: String,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn is_faculty(&self) -> bool {
        self.role == Role::Faculty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_round_trip_through_text() {
        for status in [QueryStatus::Pending, QueryStatus::Answered, QueryStatus::Flagged] {
            assert_eq!(status.as_str().parse::<QueryStatus>(), Ok(status));
        }
        assert!("closed".parse::<FeedbackStatus>().is_err());
    }

    #[test]
    fn missing_or_unknown_role_metadata_means_student() {
        assert_eq!(Role::from_metadata(None), Role::Student);
        assert_eq!(Role::from_metadata(Some("admin")), Role::Student);
        assert_eq!(Role::from_metadata(Some("faculty")), Role::Faculty);
    }

    #[test]
    fn query_record_hides_owner_and_nests_response() {
        let now = Utc::now();
        let record = QueryRecord::from(Query {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            query_text: "library hours".to_string(),
            response_text: "open late".to_string(),
            confidence_score: Some(0.9),
            status: QueryStatus::Answered,
            created_at: now,
            updated_at: Some(now),
        });

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("user_id").is_none());
        assert_eq!(json["status"], "answered");
        assert_eq!(json["response"]["response_text"], "open late");
        assert_eq!(json["response"]["confidence_score"], 0.9);
    }
}
