//! MCP over HTTP
//!
//! One JSON-RPC message per POST; responses are returned inline.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::web::AppState;

pub async fn handle_rpc(State(state): State<AppState>, body: String) -> Response {
    match state.mcp.handle_message(&body).await {
        Ok(Some(response)) => Json(response).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            tracing::error!("Error handling message: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
