//! HTTP endpoints bridging raw request bodies into the dispatch engine.
//!
//! The engine always produces a well-formed body, so every RPC response is
//! 200 OK; errors travel inside the protocol envelope.

use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// JSON-RPC endpoint: single calls, batches, and notifications.
pub async fn handle_json_rpc(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> impl IntoResponse {
    let response = state.engine.handle_json(&body).await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, crosswire::json::CONTENT_TYPE)],
        response,
    )
}

/// XML-RPC endpoint.
pub async fn handle_xml_rpc(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> impl IntoResponse {
    let response = state.engine.handle_xml(&body).await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, crosswire::xml::CONTENT_TYPE)],
        response,
    )
}
