use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    auth::{CurrentUser, FacultyUser},
    extract::{ApiJson, ApiPath},
    AppState,
};
use crate::error::Result;
use crate::models::{AddressedFeedback, FeedbackRecord, PendingFeedback};

#[derive(Deserialize)]
pub struct FlagPayload {
    query_id: Uuid,
    feedback_text: String,
}

#[derive(Deserialize)]
pub struct RespondPayload {
    response_text: String,
}

#[derive(Serialize)]
pub struct RespondResult {
    success: bool,
    feedback: Option<AddressedFeedback>,
}

pub async fn flag_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<FlagPayload>,
) -> Result<Json<FeedbackRecord>> {
    let record = state
        .feedback
        .flag(payload.query_id, user.identity.id, &payload.feedback_text)
        .await?;
    Ok(Json(record))
}

pub async fn pending_handler(
    State(state): State<AppState>,
    _faculty: FacultyUser,
) -> Result<Json<Vec<PendingFeedback>>> {
    Ok(Json(state.feedback.list_pending().await?))
}

pub async fn respond_handler(
    State(state): State<AppState>,
    FacultyUser(faculty): FacultyUser,
    ApiPath(feedback_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<RespondPayload>,
) -> Result<Json<RespondResult>> {
    let feedback = state
        .feedback
        .respond(feedback_id, faculty.identity.id, &payload.response_text)
        .await?;

    Ok(Json(RespondResult {
        success: true,
        feedback,
    }))
}
