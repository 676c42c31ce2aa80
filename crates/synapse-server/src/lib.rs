//! # synapse-server
//!
//! HTTP/WebSocket surface of a Synapse process:
//!
//! - `/api/mesh/*`: registry listing and registration
//! - `/api/terminal/{id}/connect`: raw-text terminal over WebSocket
//! - `/api/terminal/{id}/{config,execute,stats}`: JSON node operations
//! - `/health` and `/metrics`
//!
//! JSON responses use the `{ success, data?, error? }` envelope.

pub mod bootstrap;
pub mod metrics;

use axum::{
    Router,
    extract::{
        Path, Request, State,
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use synapse_config::ServerConfig;
use synapse_core::{
    ActorConfig, ActorId, ActorStats, ApiResponse, ConfigPatch, ExecuteRequest, RegisterRequest,
    RegistryEntry, Result, SynapseError,
};
use synapse_mesh::ExecuteResponse;
use synapse_node::render::error_line;
use synapse_node::{ActorDirectory, NodeActor, SessionHandle};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared server state.
pub struct AppState {
    pub directory: Arc<ActorDirectory>,
    pub metrics: metrics::Metrics,
}

impl AppState {
    pub fn new(directory: Arc<ActorDirectory>) -> Arc<Self> {
        Arc::new(Self {
            directory,
            metrics: metrics::Metrics::new(),
        })
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: u64,
    /// Nodes instantiated in this process.
    active_nodes: usize,
}

/// Error leaving a JSON handler, rendered as an envelope with a mapped status.
pub struct ApiError(pub SynapseError);

impl From<SynapseError> for ApiError {
    fn from(e: SynapseError) -> Self {
        Self(e)
    }
}

/// HTTP status for an error crossing the API boundary.
pub fn status_for(e: &SynapseError) -> StatusCode {
    match e {
        SynapseError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        SynapseError::PeerNotFound(_) => StatusCode::NOT_FOUND,
        SynapseError::PeerUnreachable { .. } => StatusCode::BAD_GATEWAY,
        SynapseError::GeneratorUnavailable(_)
        | SynapseError::GeneratorFailure(_)
        | SynapseError::RateLimited { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!(kind = self.0.kind(), error = %self.0, "request failed");
        } else {
            debug!(kind = self.0.kind(), error = %self.0, "request rejected");
        }
        (status, Json(ApiResponse::<()>::err(&self.0))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

fn parse_id(raw: &str) -> Result<ActorId> {
    ActorId::new(raw)
}

/// JSON body rejections become `InvalidConfig` so they share the envelope.
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| SynapseError::InvalidConfig(e.body_text()))
}

/// Build the Axum router.
pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        .route("/api/mesh/nodes", get(list_nodes_handler))
        .route("/api/mesh/register", post(register_handler))
        .route("/api/terminal/{id}/connect", get(connect_handler))
        .route(
            "/api/terminal/{id}/config",
            get(get_config_handler).put(update_config_handler),
        )
        .route("/api/terminal/{id}/execute", post(execute_handler))
        .route("/api/terminal/{id}/stats", get(stats_handler));

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

/// Count every request and every 4xx/5xx answer.
async fn track_requests(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    state.metrics.inc_http_requests();
    let response = next.run(request).await;
    if response.status().is_client_error() || response.status().is_server_error() {
        state.metrics.inc_http_errors();
    }
    response
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: state.metrics.uptime_secs(),
        active_nodes: state.directory.len(),
    })
}

/// Prometheus-compatible metrics endpoint.
async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> (
    StatusCode,
    [(axum::http::header::HeaderName, &'static str); 1],
    String,
) {
    let body = state.metrics.render_prometheus();
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

// ── Mesh ───────────────────────────────────────────────────────

async fn list_nodes_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<RegistryEntry>> {
    ok(state.directory.registry().list_nodes().await?)
}

async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<RegistryEntry> {
    let request = body(payload)?;
    let entry = state.directory.registry().register_request(request).await?;
    state.metrics.inc_registrations();
    ok(entry)
}

// ── Terminal ───────────────────────────────────────────────────

async fn get_config_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ActorConfig> {
    let actor = state.directory.get_or_create(&parse_id(&id)?);
    ok(actor.get_config().await?)
}

async fn update_config_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<ConfigPatch>, JsonRejection>,
) -> ApiResult<ActorConfig> {
    let id = parse_id(&id)?;
    let patch = body(payload)?;
    let actor = state.directory.get_or_create(&id);
    ok(actor.update_config(patch).await?)
}

async fn execute_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<ExecuteRequest>, JsonRejection>,
) -> ApiResult<ExecuteResponse> {
    let id = parse_id(&id)?;
    let request = body(payload)?;
    let actor = state.directory.get_or_create(&id);
    let output = actor.execute(request).await?;
    state.metrics.inc_relay_executions();
    ok(ExecuteResponse { node_id: id, output })
}

async fn stats_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ActorStats> {
    let actor = state.directory.get_or_create(&parse_id(&id)?);
    ok(actor.stats().await?)
}

/// `GET /api/terminal/{id}/connect`: anything but a WebSocket upgrade gets 426.
async fn connect_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    upgrade: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return ApiError(e).into_response(),
    };
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(node = %id, reason = %rejection.body_text(), "connect without upgrade");
            return (
                StatusCode::UPGRADE_REQUIRED,
                Json(ApiResponse::<()>::err("expected a WebSocket upgrade")),
            )
                .into_response();
        }
    };

    let actor = state.directory.get_or_create(&id);
    ws.on_upgrade(move |socket| handle_terminal_socket(socket, actor, state))
}

async fn handle_terminal_socket(mut socket: WebSocket, actor: Arc<NodeActor>, state: Arc<AppState>) {
    let SessionHandle {
        id: session,
        mut output,
    } = match actor.open_session().await {
        Ok(handle) => handle,
        Err(e) => {
            warn!(node = %actor.id(), error = %e, "failed to open session");
            let _ = socket
                .send(Message::Text(format!("{}\r\n", error_line(&e)).into()))
                .await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    state.metrics.session_opened();

    let (mut sender, mut receiver) = socket.split();

    // Drains the session's output queue; ends once the actor drops the
    // session's sender or the socket refuses a write.
    let writer = tokio::spawn(async move {
        while let Some(text) = output.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(msg) = receiver.next().await {
        let chunk = match msg {
            Ok(Message::Text(text)) => text.as_str().to_string(),
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Err(e) => {
                warn!(node = %actor.id(), session = %session, error = ?e, "WebSocket error");
                break;
            }
        };
        if let Err(e) = actor.on_session_data(session, &chunk).await {
            warn!(node = %actor.id(), session = %session, error = %e, "session input failed");
        }
    }

    actor.on_session_close(session).await;
    state.metrics.session_closed();
    let _ = writer.await;
}

/// Start the HTTP server.
pub async fn start_server(config: ServerConfig, directory: Arc<ActorDirectory>) -> Result<()> {
    let listen = config.listen.clone();
    let router = build_router(AppState::new(directory), &config);

    info!(listen = %listen, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .map_err(|e| SynapseError::Config(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, router).await?;

    Ok(())
}
