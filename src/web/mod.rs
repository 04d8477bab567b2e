//! HTTP front-end
//!
//! Mounts the OAuth redirect endpoints under `/oauth2` and the MCP JSON-RPC
//! endpoint under `/mcp/gmail`.

pub mod mcp;
pub mod oauth;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::post;
use axum::Router;

use crate::error::Result;
use crate::gmail::auth::Authenticator;
use crate::mcp::server::McpServer;

/// Handles shared by every request
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    pub mcp: Arc<McpServer>,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/oauth2", oauth::routes())
        .route("/mcp/gmail", post(mcp::handle_rpc))
        .with_state(state)
}

/// Serve the application on `addr` until the process is stopped
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
