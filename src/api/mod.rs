use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::post,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod ingest;

/// Builds the public webhook router: both operations require
/// `X-Webhook-Secret` (spec.md §6).
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/ingest", post(ingest::ingest))
        .route("/simulate-issuance", post(ingest::simulate_issuance))
        .layer(middleware::from_fn_with_state(state, webhook_secret_auth))
        .layer(TraceLayer::new_for_http())
}

/// Middleware: validates the shared `X-Webhook-Secret` header.
async fn webhook_secret_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get("x-webhook-secret")
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(secret) if secret == state.config.webhook_secret => Ok(next.run(req).await),
        _ => {
            tracing::warn!("ingest API: missing or invalid X-Webhook-Secret");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
