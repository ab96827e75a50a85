use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{commands, health, sessions};
use super::state::AppState;
use super::websocket::ws_handler;

pub fn create_router(state: Arc<AppState>) -> Router {
    // The command surface is local only
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:1420"),
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:1420"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Session lifecycle
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/:session_id", get(sessions::get_session_status))
        .route("/sessions/:session_id/pause", post(sessions::pause_session))
        .route("/sessions/:session_id/resume", post(sessions::resume_session))
        .route("/sessions/:session_id/save", post(sessions::save_session))
        .route("/sessions/:session_id/exit", post(sessions::exit_session))
        // Direct commands against the live page
        .route("/sessions/:session_id/click", post(commands::click))
        .route("/sessions/:session_id/type", post(commands::type_text))
        .route("/sessions/:session_id/press", post(commands::press))
        // WebSocket
        .route("/ws/:client_id", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
