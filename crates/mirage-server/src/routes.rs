//! Route definitions for the HTTP front end.

use crate::error::QueryFailure;
use axum::extract::{ConnectInfo, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use mirage_core::{Query, ResponseEnvelope};
use mirage_runtime::DeceptionRouter;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Body of `POST /query`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Create the HTTP router.
pub fn create_router(router: Arc<DeceptionRouter>) -> Router {
    Router::new()
        .route("/query", post(handle_query))
        .route("/healthz", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(router)
}

async fn handle_query(
    State(router): State<Arc<DeceptionRouter>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<ResponseEnvelope>, QueryFailure> {
    let envelope = router
        .handle(Query::new(request.query), Some(peer.ip()))
        .await?;
    Ok(Json(envelope))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}
