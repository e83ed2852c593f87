//! Main Gateway implementation
//!
//! HTTP front end: a health probe, a status report and a JSON-RPC endpoint
//! that forwards to [`McpServer`].

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::mcp::McpServer;
use crate::{GatewayError, Result};

/// Gateway state shared across handlers
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub config: GatewayConfig,
    pub mcp: Arc<McpServer>,
}

/// Main Gateway
#[derive(Debug)]
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    /// Create a gateway around an existing server
    pub fn new(config: GatewayConfig, mcp: McpServer) -> Self {
        Self {
            state: Arc::new(GatewayState {
                config,
                mcp: Arc::new(mcp),
            }),
        }
    }

    /// Open the database named in `config` and build the gateway over it
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        let mcp = crate::build_server(&config)?;
        Ok(Self::new(config, mcp))
    }

    /// Get gateway state
    pub fn state(&self) -> Arc<GatewayState> {
        self.state.clone()
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/health", get(Self::handle_health))
            .route("/status", get(Self::handle_status))
            .route("/mcp", post(Self::handle_mcp))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve until Ctrl+C
    pub async fn start(&self) -> Result<()> {
        let addr = self.state.config.socket_addr()?;
        let router = self.build_router();

        tracing::info!(
            %addr,
            database = %self.state.config.database_path.display(),
            "Resume gateway starting"
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    // HTTP handlers

    async fn handle_health() -> impl IntoResponse {
        Json(serde_json::json!({
            "status": "ok",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": crate::VERSION
        }))
    }

    async fn handle_status(State(state): State<Arc<GatewayState>>) -> Response {
        let mcp = state.mcp.clone();
        let status = tokio::task::spawn_blocking(move || mcp.service().status())
            .await
            .map_err(GatewayError::from)
            .and_then(|status| status.map_err(GatewayError::from));

        match status {
            Ok(status) => Json(serde_json::json!({
                "version": crate::VERSION,
                "server": state.config.server,
                "authMode": status.auth_mode,
                "snapshots": status.snapshot_count
            }))
            .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Status check failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(serde_json::json!({ "status": "error", "message": e.to_string() })),
                )
                    .into_response()
            }
        }
    }

    async fn handle_mcp(State(state): State<Arc<GatewayState>>, body: String) -> Response {
        let mcp = state.mcp.clone();
        match tokio::task::spawn_blocking(move || mcp.handle_message(&body)).await {
            Ok(Some(response)) => Json(response).into_response(),
            Ok(None) => StatusCode::ACCEPTED.into_response(),
            Err(e) => {
                tracing::error!(error = %e, "MCP handler panicked");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Gateway shutdown initiated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use resume_core::{ApiKeyGuard, Database, ResumeService};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn gateway(key: Option<&str>) -> Gateway {
        let service = ResumeService::new(Database::open_in_memory().unwrap(), ApiKeyGuard::new(key));
        let config = GatewayConfig::default();
        let mcp = McpServer::new(service, config.server.clone());
        Gateway::new(config, mcp)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = gateway(None)
            .build_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], crate::VERSION);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_status_reports_locked_mode() {
        let response = gateway(None)
            .build_router()
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["authMode"], "locked");
        assert_eq!(body["snapshots"], 0);
    }

    #[tokio::test]
    async fn test_mcp_notification_is_accepted() {
        let response = gateway(Some("k"))
            .build_router()
            .oneshot(
                Request::post("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_mcp_parse_error() {
        let response = gateway(Some("k"))
            .build_router()
            .oneshot(Request::post("/mcp").body(Body::from("{")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], crate::mcp::PARSE_ERROR);
        assert_eq!(body["id"], json!(null));
    }
}
