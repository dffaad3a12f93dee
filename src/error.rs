use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::{header::WWW_AUTHENTICATE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// Malformed path parameters, such as an id that is not a UUID.
    #[error("{0}")]
    BadRequest(String),

    /// The identity gateway refused the request (bad registration data, duplicate user).
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Rejected(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Storage(err) = &self {
            error!("Store operation failed: {err}");
        }

        let body = Json(json!({ "detail": self.to_string() }));
        match self {
            AppError::Unauthenticated(_) => {
                (status, [(WWW_AUTHENTICATE, "Bearer")], body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Rejects blank input with a `Validation` error naming the field.
pub fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_http_statuses() {
        assert_eq!(
            AppError::Unauthenticated("Not authenticated".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden("no".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("gone".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Storage(StoreError::Corrupt("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthenticated_response_carries_challenge() {
        let response = AppError::Unauthenticated("Not authenticated".into()).into_response();
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn bad_path_parameters_are_bad_requests() {
        assert_eq!(
            AppError::BadRequest("Invalid URL".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn blank_text_is_a_validation_error() {
        assert!(matches!(
            require_text("query_text", "   "),
            Err(AppError::Validation(msg)) if msg == "query_text must not be empty"
        ));
        assert!(require_text("query_text", "library").is_ok());
    }
}
