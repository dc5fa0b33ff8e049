//! Room lifecycle and the game-phase state machine
//!
//! `lobby → playing → ended`, one way. Starting is host-only; ending is the
//! win-condition evaluator's job and never a direct client request.

use super::AppState;
use crate::error::GameError;
use crate::gateway::EventGateway;
use crate::protocol::ServerMessage;
use crate::types::*;

impl AppState {
    /// Create a player inside the room and index its connection
    pub async fn add_player(
        &self,
        room_code: &str,
        conn_id: &ConnectionId,
        username: String,
    ) -> Result<Player, GameError> {
        let player = Player::new(conn_id.clone(), username);
        {
            let mut rooms = self.rooms.write().await;
            let room = rooms
                .get_mut(room_code)
                .ok_or_else(|| GameError::RoomNotFound(room_code.to_string()))?;
            room.add_player(player.clone());
        }
        self.connections
            .write()
            .await
            .insert(conn_id.clone(), (player.id.clone(), room_code.to_string()));
        tracing::info!(
            "Player {} ({}) joined room {}",
            player.username,
            player.id,
            room_code
        );
        Ok(player)
    }

    /// Remove the player owned by a connection (disconnect or re-join).
    /// Returns the departed player together with its room code.
    pub async fn remove_connection(&self, conn_id: &ConnectionId) -> Option<(RoomCode, Player)> {
        let entry = self.connections.write().await.remove(conn_id);
        let (player_id, room_code) = entry?;
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&room_code)?;
        let player = room.remove_player(&player_id)?;
        tracing::info!("Player {} left room {}", player.username, room_code);
        Some((room_code, player))
    }

    /// Host-only `lobby → playing` transition: arm every timer and deal
    /// every hand. One-way; a second start attempt fails.
    pub async fn start_game(
        &self,
        room_code: &str,
        player_id: &PlayerId,
    ) -> Result<Vec<Player>, GameError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(room_code)
            .ok_or_else(|| GameError::RoomNotFound(room_code.to_string()))?;

        if room.players.is_empty() {
            return Err(GameError::EmptyRoom);
        }
        if room.phase != GamePhase::Lobby {
            return Err(GameError::GameAlreadyStarted);
        }
        if room.host_id() != Some(player_id) {
            return Err(GameError::NotHost);
        }

        room.phase = GamePhase::Playing;
        let deadline = now_ms() + (self.config.round_seconds * 1000) as i64;
        for player in room.players.values_mut() {
            player.timer_end_time = Some(deadline);
            player.cards = self.catalog.deal(self.config.hand_size);
        }

        tracing::info!("Game started in room {}", room_code);
        Ok(room.players_in_order())
    }

    /// Mark a card as the player's current selection
    pub async fn select_card(
        &self,
        room_code: &str,
        player_id: &PlayerId,
        card_id: &CardId,
    ) -> Result<Problem, GameError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(room_code)
            .ok_or_else(|| GameError::RoomNotFound(room_code.to_string()))?;
        let player = room.players.get_mut(player_id).ok_or(GameError::NotInRoom)?;

        let card = player
            .cards
            .iter()
            .find(|c| c.id == *card_id)
            .ok_or(GameError::CardNotFound)?;
        let problem = card.problem.clone();
        player.selected_card = Some(card_id.clone());
        Ok(problem)
    }

    /// Flag a player as out of the game. `Ok(None)` when the player was
    /// already eliminated; repeat reports are a no-op.
    pub async fn eliminate_player(
        &self,
        room_code: &str,
        player_id: &PlayerId,
    ) -> Result<Option<Player>, GameError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(room_code)
            .ok_or_else(|| GameError::RoomNotFound(room_code.to_string()))?;
        let player = room.players.get_mut(player_id).ok_or(GameError::NotInRoom)?;

        if player.is_eliminated {
            return Ok(None);
        }
        player.is_eliminated = true;
        player.eliminated_at = Some(now_ms());
        tracing::info!("Player {} eliminated in room {}", player.username, room_code);
        Ok(Some(player.clone()))
    }

    /// Win-condition evaluator. Runs after every elimination and after every
    /// disconnect-driven removal; idempotent on already-ended rooms.
    pub async fn check_win_condition(&self, gateway: &dyn EventGateway, room_code: &str) {
        let ended = {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(room_code) else {
                return;
            };
            if room.phase == GamePhase::Ended {
                return;
            }

            let survivors: Vec<PlayerId> =
                room.active_players().map(|p| p.id.clone()).collect();
            if survivors.len() == 1 {
                let winner = survivors[0].clone();
                room.phase = GamePhase::Ended;
                room.winner = Some(winner.clone());
                let winner_name = room.players.get(&winner).map(|p| p.username.clone());
                Some((Some(winner), winner_name))
            } else if survivors.is_empty() && !room.players.is_empty() {
                room.phase = GamePhase::Ended;
                Some((None, None))
            } else {
                None
            }
        };

        if let Some((winner, winner_name)) = ended {
            tracing::info!("Game ended in room {} (winner: {:?})", room_code, winner);
            gateway
                .broadcast(room_code, ServerMessage::GameEnded { winner, winner_name })
                .await;
        }
    }

    /// Full room snapshot for `game_state` sends
    pub async fn snapshot(&self, room_code: &str) -> Option<ServerMessage> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(room_code)?;
        Some(ServerMessage::GameState {
            players: room.players_in_order(),
            game_status: room.phase,
            room_code: room.code.clone(),
            winner: room.winner.clone(),
        })
    }
}
