//! HTTP server implementation using Axum.

use crate::handler::{handle_health, handle_json_rpc, handle_xml_rpc};
use axum::{
    routing::{get, post},
    Router,
};
use crosswire::{DispatchConfig, MethodTree, RpcEngine};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Top-level method names the transport claims for itself; a registered
/// method with a colliding name is unreachable via RPC.
const TRANSPORT_RESERVED: &[&str] = &["health", "rpc", "RPC2"];

/// Application state shared across handlers.
pub struct AppState {
    /// Dispatch engine serving both protocols
    pub engine: RpcEngine,
}

/// Start the RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(
    mut tree: MethodTree,
    config: DispatchConfig,
    host: &str,
    port: u16,
) -> anyhow::Result<SocketAddr> {
    tree.reserve(TRANSPORT_RESERVED);
    let state = Arc::new(AppState {
        engine: RpcEngine::new(tree, config),
    });

    // Configure CORS for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router; /RPC2 is the conventional XML-RPC endpoint
    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_json_rpc))
        .route("/RPC2", post(handle_xml_rpc))
        .layer(cors)
        .with_state(state);

    // Parse the address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    // Bind to the address
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("Server error");
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::demo_tree;

    #[tokio::test]
    async fn test_server_starts() {
        let addr = start_server(
            demo_tree(),
            DispatchConfig::default(),
            "127.0.0.1",
            0,
        )
        .await
        .unwrap();
        assert!(addr.port() > 0);
    }
}
