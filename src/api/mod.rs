//! HTTP surface of the helpdesk.
//!
//! Routes live under `/api/auth`, `/api/queries` and `/api/feedback`. Callers
//! authenticate with a bearer token or the session cookie set at login; faculty-only
//! routes take a [`auth::FacultyUser`] extractor so the role check runs before the
//! handler body.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::feedback::FeedbackWorkflow;
use crate::identity::IdentityGateway;
use crate::queries::QueryWorkflow;

pub mod auth;
mod extract;
mod feedback;
mod queries;

#[derive(Debug, Clone, Default)]
pub struct SessionPolicy {
    pub secure_cookies: bool,
    pub auto_confirm_domain: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub queries: QueryWorkflow,
    pub feedback: FeedbackWorkflow,
    pub identity: Arc<dyn IdentityGateway>,
    pub sessions: SessionPolicy,
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/logout", post(auth::logout_handler))
        .route("/api/auth/me", get(auth::me_handler))
        .route("/api/queries/submit", post(queries::submit_handler))
        .route("/api/queries/history", get(queries::history_handler))
        .route("/api/queries/:query_id", get(queries::get_query_handler))
        .route("/api/feedback/flag-response", post(feedback::flag_handler))
        .route("/api/feedback/pending", get(feedback::pending_handler))
        .route(
            "/api/feedback/:feedback_id/respond",
            post(feedback::respond_handler),
        )
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            if origin == "*" {
                warn!("Wildcard CORS origin cannot be combined with credentials, ignoring it");
                return None;
            }
            HeaderValue::from_str(origin)
                .map_err(|_| warn!("Ignoring invalid CORS origin {origin}"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .expose_headers([CONTENT_TYPE, AUTHORIZATION, CONTENT_LENGTH])
        .max_age(Duration::from_secs(60 * 60))
}

async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "University Query Resolution System API" }))
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn serve(app: Router, address: &str) -> anyhow::Result<()> {
    info!("Binding to {address}");
    let listener = TcpListener::bind(address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                warn!("Failed to install terminate handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
