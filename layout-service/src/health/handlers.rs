//! HTTP bindings for liveness, readiness and status
//!
//! Each request gets its own cancellation token. A client that disconnects
//! drops the handler future, which cancels the token and every probe still
//! running for that request.

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::{CancellationToken, DropGuard};

use super::{aggregator::RequestContext, report::StatusReport};
use crate::{error::Result, state::AppState};

/// Health routes: `/health`, `/ready` and `/status`
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(liveness))
        .route("/ready", get(readiness))
        .route("/status", get(status))
}

fn request_context() -> (RequestContext, DropGuard) {
    let token = CancellationToken::new();
    let ctx = RequestContext::with_cancellation(token.clone());
    (ctx, token.drop_guard())
}

/// Liveness probe; always 200 with an empty object
pub async fn liveness(State(state): State<AppState>) -> Json<Value> {
    state.health().liveness();
    Json(json!({}))
}

/// Readiness probe
///
/// 200 with an empty object when every probe is UP, 503 with the joined
/// failure message otherwise.
pub async fn readiness(State(state): State<AppState>) -> Result<Json<Value>> {
    let (ctx, _guard) = request_context();
    state.health().readiness(&ctx).await?;
    Ok(Json(json!({})))
}

/// Full status report; 200 even when checks are DOWN
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusReport>> {
    let (ctx, _guard) = request_context();
    let report = state.health().status(&ctx).await?;
    Ok(Json(report))
}
