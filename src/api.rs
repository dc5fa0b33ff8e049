//! Health/status surface
//!
//! No bearing on game correctness; used by deploy probes and the lobby page.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::ws::ServerContext;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Players currently joined to a room, across all rooms
    pub players: usize,
}

/// GET /
pub async fn health(State(ctx): State<ServerContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "CodeBattles Server Running",
        players: ctx.state.connected_players().await,
    })
}
