//! HTTP and WebSocket handlers for the roomcast server.
//!
//! - `POST /room` creates a room from a JSON topic
//! - `GET /room/{id}` returns the topic, or upgrades to a room session
//! - `GET /health` reports liveness and counts

use crate::config::Config;
use crate::metrics::{self, SessionMetricsGuard};
use crate::reaper;
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{ws::WebSocket, DefaultBodyLimit, Path, State, WebSocketUpgrade},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use roomcast_core::{id, RelayError, RoomId, RoomRegistry, SessionController};
use roomcast_transport::websocket;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The room registry.
    pub registry: Arc<RoomRegistry>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            registry: Arc::new(RoomRegistry::with_config(config.registry_config())),
            config,
        }
    }
}

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.limits.max_message_size;

    Router::new()
        .route("/room", post(create_room))
        .route("/room/:room_id", get(get_room))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    if let Some(ttl) = config.unjoined_ttl() {
        let every = Duration::from_secs(config.rooms.reap_interval_secs.max(1));
        reaper::spawn_reaper(Arc::clone(&state.registry), ttl, every);
    }

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("roomcast listening on {}", addr);
    info!("Rooms: POST http://{}/room, join ws://{}/room/{{id}}", addr, addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("roomcast stopped; all rooms discarded");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.registry.stats();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": stats.room_count,
        "clients": stats.client_count,
    }))
}

/// Create a room. The body is the topic, any JSON value.
async fn create_room(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let topic: Value = match serde_json::from_slice(&body) {
        Ok(topic) => topic,
        Err(e) => {
            debug!(error = %e, "Rejected room topic");
            return (StatusCode::BAD_REQUEST, "Topic must be JSON").into_response();
        }
    };

    match state.registry.create(topic) {
        Ok(room_id) => {
            metrics::record_room_created();
            metrics::set_active_rooms(state.registry.room_count());
            (
                StatusCode::CREATED,
                [(header::LOCATION, format!("/room/{}", room_id))],
                room_id.into_string(),
            )
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Room creation refused");
            metrics::record_error("room_limit");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// Read a room's topic, or join it over a WebSocket.
async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    if !id::is_valid_token(&room_id) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let Some(topic) = state.registry.topic(&room_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let Some(ws) = ws else {
        return Json(serde_json::json!({ "topic": topic })).into_response();
    };

    if state.registry.is_full(&room_id) {
        metrics::record_error("room_full");
        return (StatusCode::CONFLICT, "Room is full").into_response();
    }

    let room_id = RoomId::from(room_id);
    ws.max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, state, room_id))
}

/// Run a room session over an upgraded WebSocket.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>, room_id: RoomId) {
    let _metrics_guard = SessionMetricsGuard::new();

    let (handle, source) = websocket::split(socket, &state.config.websocket_config());
    let mut session = SessionController::new(Arc::clone(&state.registry), room_id);

    match session.run(Arc::new(handle), source).await {
        Ok(summary) => {
            debug!(
                room = %summary.room_id,
                client = %summary.client_id,
                messages = summary.messages,
                delivered = summary.deliveries.delivered,
                failed = summary.deliveries.failed,
                reason = ?summary.reason,
                "Session ended"
            );
            metrics::record_session(&summary);
        }
        Err(RelayError::NotFound(room)) => {
            // Deleted between the upgrade check and the join.
            debug!(room = %room, "Room vanished before join");
        }
        Err(e) => {
            debug!(room = %session.room_id(), error = %e, "Join refused");
            metrics::record_error("join");
        }
    }

    metrics::set_active_rooms(state.registry.room_count());
}
