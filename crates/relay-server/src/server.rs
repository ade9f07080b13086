//! Router assembly and listener lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use relay_core::rpc::{Envelope, INVALID_REQUEST, JSONRPC_VERSION, error_body};
use relay_session::SessionStore;

use crate::auth::{BearerAuth, require_bearer};
use crate::origin::{OriginConfig, origin_gate};

/// The application supplies the RPC methods; the server supplies admission,
/// auth, and routing around them.
#[async_trait::async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    /// Turn one request envelope into one response envelope.
    async fn handle(&self, request: Envelope) -> Envelope;
}

/// Listener and admission settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Origin / DNS-rebinding admission policy.
    pub origin: OriginConfig,
    /// Require a live session id as a bearer token on `/rpc`.
    pub require_auth: bool,
    /// Externally visible origin, used in the 401 challenge URL.
    pub public_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            origin: OriginConfig::development(),
            require_auth: false,
            public_origin: "http://127.0.0.1:3000".into(),
        }
    }
}

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// RPC dispatch target.
    pub handler: Arc<dyn RpcHandler>,
    /// Session store consulted by the bearer check and the health report.
    pub sessions: Arc<SessionStore>,
    /// When the server started.
    pub start_time: Instant,
}

/// The relay HTTP server.
pub struct RelayServer {
    config: ServerConfig,
    handler: Arc<dyn RpcHandler>,
    sessions: Arc<SessionStore>,
    start_time: Instant,
}

impl RelayServer {
    /// Create a new server around an RPC handler and a session store.
    pub fn new(
        config: ServerConfig,
        handler: Arc<dyn RpcHandler>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            config,
            handler,
            sessions,
            start_time: Instant::now(),
        }
    }

    /// Build the axum router.
    ///
    /// `POST /rpc` runs gate, then bearer auth when enabled, then dispatch.
    /// `GET /health` bypasses both.
    pub fn router(&self) -> Router {
        let state = AppState {
            handler: Arc::clone(&self.handler),
            sessions: Arc::clone(&self.sessions),
            start_time: self.start_time,
        };

        let mut rpc = Router::new().route("/rpc", post(rpc_handler));
        if self.config.require_auth {
            let auth = BearerAuth::new(
                Arc::clone(&self.sessions),
                self.config.public_origin.clone(),
            );
            rpc = rpc.layer(middleware::from_fn_with_state(auth, require_bearer));
        }
        // Added last so the gate wraps the auth layer and runs first
        let rpc = rpc.layer(middleware::from_fn_with_state(
            Arc::new(self.config.origin.clone()),
            origin_gate,
        ));

        Router::new()
            .merge(rpc)
            .route("/health", get(health_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listener and serve in a background task.
    pub async fn start(self) -> std::io::Result<ServerHandle> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "relay server listening");

        let router = self.router();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "server task exited");
            }
        });

        Ok(ServerHandle { local_addr, task })
    }
}

/// A running server. Aborting or dropping the handle stops it.
pub struct ServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the listener actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_sessions: usize,
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.sessions.len(),
    })
}

/// POST /rpc
async fn rpc_handler(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    let envelope: Envelope = match serde_json::from_value(payload) {
        Ok(envelope) => envelope,
        Err(_) => {
            return Json(error_body(INVALID_REQUEST, "Invalid Request")).into_response();
        }
    };
    if envelope.jsonrpc != JSONRPC_VERSION {
        return Json(error_body(INVALID_REQUEST, "Invalid Request")).into_response();
    }

    let response = state.handler.handle(envelope).await;
    (StatusCode::OK, Json(response)).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
