mod reward;
mod room;

pub use reward::RewardOutcome;

use crate::catalog::CardFactory;
use crate::config::ServerConfig;
use crate::error::GameError;
use crate::sandbox::Sandbox;
use crate::types::*;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Room codes: 6 uppercase alphanumeric characters
const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 6;

/// Shared application state: the room registry, the connection index, and
/// the process-wide immutable collaborators (catalog, sandbox).
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub rooms: Arc<RwLock<HashMap<RoomCode, Room>>>,
    /// Maps a live connection to the player and room it owns
    pub connections: Arc<RwLock<HashMap<ConnectionId, (PlayerId, RoomCode)>>>,
    pub catalog: Arc<CardFactory>,
    pub sandbox: Arc<Sandbox>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let sandbox = Sandbox::new(config.grading_timeout, config.python_bin.clone());
        Self {
            config,
            rooms: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(RwLock::new(HashMap::new())),
            catalog: Arc::new(CardFactory::new()),
            sandbox: Arc::new(sandbox),
        }
    }

    /// Resolve an existing room code, or create a fresh lobby-phase room
    /// when none was requested. A requested code that does not exist is an
    /// error, never an implicit create.
    pub async fn get_or_create_room(&self, requested: Option<&str>) -> Result<RoomCode, GameError> {
        let mut rooms = self.rooms.write().await;
        match requested {
            Some(code) => {
                if rooms.contains_key(code) {
                    Ok(code.to_string())
                } else {
                    Err(GameError::RoomNotFound(code.to_string()))
                }
            }
            None => {
                let code = generate_room_code(&rooms);
                rooms.insert(code.clone(), Room::new(code.clone()));
                tracing::info!("Created room {}", code);
                Ok(code)
            }
        }
    }

    /// Remove the room iff its player map is empty. Called after every
    /// disconnect/leave and after every grading resumption. Rooms with a
    /// submission still suspended on the sandbox are kept alive.
    pub async fn delete_if_empty(&self, room_code: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let deletable = rooms
            .get(room_code)
            .is_some_and(|room| room.players.is_empty() && room.grading_in_flight == 0);
        if deletable {
            rooms.remove(room_code);
            tracing::info!("Deleted empty room {}", room_code);
        }
        deletable
    }

    pub async fn resolve_connection(&self, conn_id: &ConnectionId) -> Option<(PlayerId, RoomCode)> {
        self.connections.read().await.get(conn_id).cloned()
    }

    /// Players currently joined across all rooms (health surface)
    pub async fn connected_players(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a collision-free code against the live registry. Retries are
/// cheap: 36^6 combinations against a handful of live rooms.
fn generate_room_code(rooms: &HashMap<RoomCode, Room>) -> RoomCode {
    let mut rng = rand::rng();
    loop {
        let code: String = (0..CODE_LENGTH)
            .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
            .collect();
        if !rooms.contains_key(&code) {
            return code;
        }
    }
}
