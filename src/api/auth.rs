use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap,
    },
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{extract::ApiJson, AppState};
use crate::error::{require_text, AppError, Result};
use crate::identity::NewAccount;
use crate::models::{Identity, Role};

pub const SESSION_COOKIE: &str = "helpdesk-auth-token";
const SESSION_MAX_AGE_SECS: u64 = 3600 * 24 * 7;

/// The authenticated caller and the credential it presented.
pub struct CurrentUser {
    pub identity: Identity,
    pub token: String,
}

/// An authenticated caller holding the faculty role.
pub struct FacultyUser(pub CurrentUser);

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_token(&parts.headers))
            .ok_or_else(|| AppError::Unauthenticated("Not authenticated".to_string()))?;

        let identity = state.identity.user(&token).await.map_err(|err| {
            AppError::Unauthenticated(format!("Invalid authentication credentials: {err}"))
        })?;

        Ok(CurrentUser { identity, token })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for FacultyUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.identity.is_faculty() {
            return Err(AppError::Forbidden(
                "This endpoint requires faculty privileges".to_string(),
            ));
        }
        Ok(FacultyUser(user))
    }
}

fn session_cookie(token: &str, max_age: u64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[derive(Deserialize)]
pub struct RegisterPayload {
    email: String,
    password: String,
    full_name: String,
    #[serde(default)]
    role: Option<String>,
}

pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterPayload>,
) -> Result<Json<Value>> {
    if !payload.email.contains('@') {
        return Err(AppError::Validation("email is not a valid address".to_string()));
    }
    require_text("password", &payload.password)?;
    require_text("full_name", &payload.full_name)?;
    let role = match payload.role.as_deref() {
        None => Role::Student,
        Some(raw) => raw.parse::<Role>().map_err(AppError::Validation)?,
    };

    let identity = state
        .identity
        .sign_up(NewAccount {
            email: payload.email.clone(),
            password: payload.password,
            full_name: payload.full_name,
            role,
        })
        .await
        .map_err(|err| AppError::Rejected(format!("Registration failed: {err}")))?;

    info!(user_id = %identity.id, role = role.as_str(), "User registered");

    if let Some(domain) = state.sessions.auto_confirm_domain.as_deref() {
        let suffix = format!("@{}", domain.to_lowercase());
        if payload.email.to_lowercase().ends_with(&suffix) {
            if let Err(err) = state.identity.confirm_email(identity.id).await {
                warn!(user_id = %identity.id, "Automatic email confirmation failed: {err}");
            }
        }
    }

    Ok(Json(json!({
        "message": "User registered successfully. Please check your email to confirm your account.",
        "status": "success",
    })))
}

#[derive(Deserialize)]
pub struct LoginPayload {
    email: String,
    password: String,
}

pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginPayload>,
) -> Result<impl IntoResponse> {
    let session = state
        .identity
        .sign_in(&payload.email, &payload.password)
        .await
        .map_err(|err| AppError::Unauthenticated(format!("Login failed: {err}")))?;

    info!(user_id = %session.identity.id, "User logged in");

    let cookie = session_cookie(
        &session.access_token,
        SESSION_MAX_AGE_SECS,
        state.sessions.secure_cookies,
    );
    let body = json!({
        "access_token": session.access_token,
        "token_type": "bearer",
        "user": {
            "id": session.identity.id,
            "email": session.identity.email,
            "role": session.identity.role.as_str(),
            "full_name": session.identity.full_name,
        },
    });

    Ok(([(SET_COOKIE, cookie)], Json(body)))
}

pub async fn logout_handler(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    state
        .identity
        .sign_out(&user.token)
        .await
        .map_err(|err| AppError::Upstream(format!("Logout failed: {err}")))?;

    info!(user_id = %user.identity.id, "User logged out");

    let cookie = session_cookie("", 0, state.sessions.secure_cookies);
    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({ "message": "Successfully logged out", "status": "success" })),
    ))
}

pub async fn me_handler(user: CurrentUser) -> Json<Value> {
    let identity = user.identity;
    Json(json!({
        "id": identity.id,
        "email": identity.email,
        "full_name": identity.full_name,
        "role": identity.role.as_str(),
        "last_login": identity.last_sign_in_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; helpdesk-auth-token=tok42; lang=en"),
        );
        assert_eq!(cookie_token(&headers).as_deref(), Some("tok42"));
    }

    #[test]
    fn cookie_attributes_follow_settings() {
        let cookie = session_cookie("tok", 60, true);
        assert!(cookie.starts_with("helpdesk-auth-token=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("; Secure"));
        assert!(!session_cookie("tok", 60, false).contains("Secure"));
    }
}
