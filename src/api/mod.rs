//! HTTP front-end for module dispatch
//!
//! Exposes the loaded modules over HTTP against one preconfigured device:
//!
//! - `GET /` lists module names
//! - `GET /run_module/{name}?args=...` runs a module and reports the result
//!
//! Requests may arrive concurrently, so the device sits behind a mutex and
//! dispatches to it run one at a time.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::devices::Connection;
use crate::plugins::{Outcome, PluginSet};
use crate::{Error, Result};

/// Shared front-end state
pub struct ApiState {
    /// Modules available for dispatch
    pub plugins: Arc<PluginSet>,
    /// The device every request targets
    pub device: Mutex<Connection>,
}

/// Module listing
#[derive(Debug, Serialize, Deserialize)]
pub struct ModulesResponse {
    pub modules: Vec<String>,
}

/// Outcome of a module run
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl RunResponse {
    fn success(message: String, output: String) -> Self {
        Self {
            status: "success".to_string(),
            message,
            output: (!output.is_empty()).then_some(output),
        }
    }

    fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            output: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunQuery {
    /// Space-separated module arguments
    #[serde(default)]
    args: Option<String>,
}

/// Build the front-end routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list_modules))
        .route("/run_module/{name}", get(run_module))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// List loaded module names
async fn list_modules(State(state): State<Arc<ApiState>>) -> Json<ModulesResponse> {
    Json(ModulesResponse {
        modules: state.plugins.names().into_iter().map(String::from).collect(),
    })
}

/// Run a module against the configured device
async fn run_module(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
    Query(query): Query<RunQuery>,
) -> (StatusCode, Json<RunResponse>) {
    if !state.plugins.contains(&name) {
        return (
            StatusCode::NOT_FOUND,
            Json(RunResponse::error(Error::UnknownCapability(name).to_string())),
        );
    }

    let args: Vec<String> = query
        .args
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .map(String::from)
        .collect();

    let mut device = state.device.lock().await;
    if !device.is_connected() && !device.connect().await {
        let message = format!("Failed to connect to {}:{}", device.host(), device.port());
        return (StatusCode::OK, Json(RunResponse::error(message)));
    }

    let response = match state.plugins.dispatch(&name, &mut device, &args).await {
        Ok(Outcome::Completed { output }) => {
            RunResponse::success(format!("Module {name} executed successfully."), output)
        }
        Ok(Outcome::Usage(usage)) => RunResponse::error(format!("Usage: {usage}")),
        Err(e) => {
            tracing::warn!(module = %name, error = %e, "module run failed");
            RunResponse::error(e.to_string())
        }
    };

    (StatusCode::OK, Json(response))
}

/// HTTP front-end server
pub struct ApiServer {
    port: u16,
    state: Arc<ApiState>,
}

impl ApiServer {
    #[must_use]
    pub fn new(port: u16, plugins: PluginSet, device: Connection) -> Self {
        Self {
            port,
            state: Arc::new(ApiState {
                plugins: Arc::new(plugins),
                device: Mutex::new(device),
            }),
        }
    }

    #[must_use]
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    /// Serve until `shutdown` resolves, then release the device
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot be bound or the server fails
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(%addr, "API server listening");

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(Error::Io);

        self.state.device.lock().await.disconnect().await;
        served
    }
}
