//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::MatchPhase;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origins);

    Router::new()
        .route("/health", get(health_handler))
        .route("/rooms", get(rooms_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// An empty origin list allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();
    cors.allow_origin(allowed)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    rooms: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        rooms: state.rooms.room_count(),
        active_players: state.rooms.total_players(),
    })
}

// ============================================================================
// Room listing
// ============================================================================

#[derive(Debug, Serialize)]
struct RoomSummary {
    room_id: String,
    players: usize,
    max_players: usize,
    phase: MatchPhase,
}

async fn rooms_handler(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    let rooms = state
        .rooms
        .list()
        .into_iter()
        .map(|room| RoomSummary {
            players: room.player_count(),
            max_players: room.max_players,
            phase: room.phase(),
            room_id: room.id,
        })
        .collect();
    Json(rooms)
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::NotFound("room x does not exist".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_room_summary_shape() {
        let json = serde_json::to_value(RoomSummary {
            room_id: "main".to_string(),
            players: 3,
            max_players: 10,
            phase: MatchPhase::Starting,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "room_id": "main",
                "players": 3,
                "max_players": 10,
                "phase": "starting"
            })
        );
    }
}
