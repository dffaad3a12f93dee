use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::{
    auth::CurrentUser,
    extract::{ApiJson, ApiPath},
    AppState,
};
use crate::error::Result;
use crate::models::QueryRecord;
use crate::queries::authorize_view;

#[derive(Deserialize)]
pub struct SubmitPayload {
    query_text: String,
}

pub async fn submit_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<SubmitPayload>,
) -> Result<Json<QueryRecord>> {
    let record = state
        .queries
        .submit(user.identity.id, &payload.query_text)
        .await?;
    Ok(Json(record))
}

pub async fn history_handler(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<QueryRecord>>> {
    Ok(Json(state.queries.list_for_user(user.identity.id).await?))
}

pub async fn get_query_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(query_id): ApiPath<Uuid>,
) -> Result<Json<QueryRecord>> {
    let record = state.queries.get_by_id(query_id).await?;
    authorize_view(&user.identity, &record)?;
    Ok(Json(record))
}
