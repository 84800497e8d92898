use crate::tools::resolve::{build_response, validate_url};
use crate::types::{ErrorResponse, RefreshRequest, ResolveScanRequest, ResolveScanResponse};
use crate::AppState;
use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Form, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/resolve-scan", post(resolve_scan_handler))
        .route("/refresh-url", post(refresh_url_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "beacon-resolver",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn resolve_scan_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResolveScanRequest>,
) -> Json<ResolveScanResponse> {
    let response = match request {
        ResolveScanRequest::Batch(sightings) => {
            ResolveScanResponse::Batch(build_response(&state.freshness, sightings).await)
        }
        ResolveScanRequest::Envelope { objects } => ResolveScanResponse::Envelope {
            metadata: build_response(&state.freshness, objects).await,
        },
    };
    Json(response)
}

/// `url` may come in the query string or a form body; the query wins.
async fn refresh_url_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshRequest>,
    form: Result<Form<RefreshRequest>, FormRejection>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    let raw = query
        .url
        .or_else(|| form.ok().and_then(|Form(body)| body.url))
        .filter(|u| !u.trim().is_empty());
    let Some(raw) = raw else {
        return Err(bad_request("missing url parameter"));
    };
    let Some(url) = validate_url(&raw) else {
        return Err(bad_request(&format!("invalid url: {raw}")));
    };

    info!("refresh requested for {}", url);
    state.fetcher.refresh(url.as_str()).await;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "url": url.as_str()
    })))
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}
