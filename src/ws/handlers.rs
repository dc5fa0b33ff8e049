//! Event dispatch
//!
//! Stateless orchestration: each inbound event is resolved to a (player,
//! room) pair through the connection index, validated against current state,
//! routed into the room/reward/sandbox machinery, and answered through the
//! gateway. Connections that never joined a room cannot trigger gameplay
//! effects; their events no-op silently.

use crate::error::GameError;
use crate::gateway::EventGateway;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::*;

/// Handle one inbound client event
pub async fn handle_message(
    state: &AppState,
    gateway: &dyn EventGateway,
    conn_id: &ConnectionId,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::JoinRoom {
            username,
            room_code,
        } => handle_join_room(state, gateway, conn_id, username, room_code).await,
        ClientMessage::StartGame => handle_start_game(state, gateway, conn_id).await,
        ClientMessage::SelectCard { card_id } => {
            handle_select_card(state, gateway, conn_id, card_id).await
        }
        ClientMessage::SubmitSolution { card_id, code } => {
            handle_submit_solution(state, gateway, conn_id, card_id, code).await
        }
        ClientMessage::PlayerEliminated => {
            handle_player_eliminated(state, gateway, conn_id).await
        }
        ClientMessage::ApplyTargetedDebuff { target_player_id } => {
            handle_apply_targeted_debuff(state, gateway, conn_id, target_player_id).await
        }
        ClientMessage::DebugTriggerReward { reward } => {
            handle_debug_trigger_reward(state, gateway, conn_id, reward).await
        }
        ClientMessage::GetGameState => handle_get_game_state(state, gateway, conn_id).await,
    }
}

/// Connection dropped: remove the player, settle the room, reap it if empty
pub async fn handle_disconnect(
    state: &AppState,
    gateway: &dyn EventGateway,
    conn_id: &ConnectionId,
) {
    depart(state, gateway, conn_id).await;
}

/// Shared removal path for disconnects and re-joins
async fn depart(state: &AppState, gateway: &dyn EventGateway, conn_id: &ConnectionId) {
    let Some((room_code, player)) = state.remove_connection(conn_id).await else {
        return;
    };
    gateway.leave_room(conn_id).await;
    gateway
        .broadcast(
            &room_code,
            ServerMessage::PlayerLeft {
                player_id: player.id,
                username: player.username,
            },
        )
        .await;
    state.check_win_condition(gateway, &room_code).await;
    state.delete_if_empty(&room_code).await;
}

async fn send_error(gateway: &dyn EventGateway, conn_id: &ConnectionId, error: GameError) {
    gateway
        .send_to(
            conn_id,
            ServerMessage::Error {
                message: error.to_string(),
            },
        )
        .await;
}

async fn handle_join_room(
    state: &AppState,
    gateway: &dyn EventGateway,
    conn_id: &ConnectionId,
    username: String,
    room_code: Option<String>,
) {
    let username = username.trim().to_string();
    if username.is_empty() {
        gateway
            .send_to(
                conn_id,
                ServerMessage::JoinError {
                    message: GameError::UsernameRequired.to_string(),
                },
            )
            .await;
        return;
    }

    // A connection that joins again abandons the player it owned before
    if state.resolve_connection(conn_id).await.is_some() {
        depart(state, gateway, conn_id).await;
    }

    let requested = room_code
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty());
    let code = match state.get_or_create_room(requested.as_deref()).await {
        Ok(code) => code,
        Err(e) => {
            gateway
                .send_to(
                    conn_id,
                    ServerMessage::JoinError {
                        message: e.to_string(),
                    },
                )
                .await;
            return;
        }
    };

    let player = match state.add_player(&code, conn_id, username).await {
        Ok(player) => player,
        Err(e) => {
            // room vanished between lookup and insert
            gateway
                .send_to(
                    conn_id,
                    ServerMessage::JoinError {
                        message: e.to_string(),
                    },
                )
                .await;
            return;
        }
    };

    gateway.join_room(conn_id, &code).await;
    gateway
        .broadcast(
            &code,
            ServerMessage::PlayerJoined {
                player_id: player.id.clone(),
                username: player.username.clone(),
                room_code: code.clone(),
            },
        )
        .await;
    if let Some(snapshot) = state.snapshot(&code).await {
        gateway.send_to(conn_id, snapshot).await;
    }
}

async fn handle_start_game(state: &AppState, gateway: &dyn EventGateway, conn_id: &ConnectionId) {
    let Some((player_id, room_code)) = state.resolve_connection(conn_id).await else {
        return;
    };
    match state.start_game(&room_code, &player_id).await {
        Ok(players) => {
            gateway
                .broadcast(&room_code, ServerMessage::GameStarted { players })
                .await;
        }
        Err(e) => send_error(gateway, conn_id, e).await,
    }
}

async fn handle_select_card(
    state: &AppState,
    gateway: &dyn EventGateway,
    conn_id: &ConnectionId,
    card_id: CardId,
) {
    let Some((player_id, room_code)) = state.resolve_connection(conn_id).await else {
        return;
    };
    match state.select_card(&room_code, &player_id, &card_id).await {
        Ok(problem) => {
            gateway
                .broadcast(
                    &room_code,
                    ServerMessage::CardSelected {
                        player_id,
                        card_id,
                        problem,
                    },
                )
                .await;
        }
        Err(e) => send_error(gateway, conn_id, e).await,
    }
}

/// What the post-grading re-validation decided
enum Commit {
    Passed {
        reward: Option<Reward>,
        new_card: Card,
    },
    Failed,
    /// Player, card, or selection vanished while grading was suspended
    Stale,
}

async fn handle_submit_solution(
    state: &AppState,
    gateway: &dyn EventGateway,
    conn_id: &ConnectionId,
    card_id: CardId,
    code: String,
) {
    let Some((player_id, room_code)) = state.resolve_connection(conn_id).await else {
        return;
    };

    // Validate and snapshot under the lock. The in-flight marker keeps the
    // registry from reaping the room while grading is suspended.
    let validated: Result<Problem, GameError> = {
        let mut rooms = state.rooms.write().await;
        let Some(room) = rooms.get_mut(&room_code) else {
            return;
        };
        let Some(player) = room.players.get(&player_id) else {
            return;
        };
        let outcome = if player.is_eliminated {
            Err(GameError::PlayerEliminated)
        } else {
            match player.cards.iter().find(|c| c.id == card_id) {
                None => Err(GameError::CardNotFound),
                Some(_) if player.selected_card.as_ref() != Some(&card_id) => {
                    Err(GameError::CardNotSelected)
                }
                Some(card) => Ok(card.problem.clone()),
            }
        };
        if outcome.is_ok() {
            room.grading_in_flight += 1;
        }
        outcome
    };
    let problem = match validated {
        Ok(problem) => problem,
        Err(e) => {
            send_error(gateway, conn_id, e).await;
            return;
        }
    };

    tracing::debug!(
        "Grading submission from {} in room {} ({})",
        player_id,
        room_code,
        problem.title
    );
    let report = state
        .sandbox
        .execute(&code, &problem.signature, &problem.test_cases)
        .await;

    // Re-validate on resume: the submitter may have been eliminated or
    // disconnected and the hand may have changed. A pre-suspension handle is
    // never trusted.
    let commit = {
        let mut rooms = state.rooms.write().await;
        match rooms.get_mut(&room_code) {
            None => Commit::Stale,
            Some(room) => {
                room.grading_in_flight = room.grading_in_flight.saturating_sub(1);
                let still_valid = room.players.get(&player_id).is_some_and(|p| {
                    p.cards.iter().any(|c| c.id == card_id)
                        && p.selected_card.as_ref() == Some(&card_id)
                });
                if !still_valid {
                    Commit::Stale
                } else if report.passed {
                    let new_card = state.catalog.draw();
                    let mut reward = None;
                    if let Some(player) = room.players.get_mut(&player_id) {
                        if let Some(idx) = player.cards.iter().position(|c| c.id == card_id) {
                            reward = player.cards.remove(idx).reward;
                        }
                        player.selected_card = None;
                        player.cards.push(new_card.clone());
                    }
                    Commit::Passed { reward, new_card }
                } else {
                    Commit::Failed
                }
            }
        }
    };

    match commit {
        Commit::Stale => {
            tracing::debug!("Dropping stale grading result for {}", player_id);
        }
        Commit::Passed { reward, new_card } => {
            tracing::info!(
                "Player {} passed {} in room {}",
                player_id,
                problem.title,
                room_code
            );
            if let Some(reward) = reward {
                state
                    .apply_reward(gateway, &room_code, &player_id, reward, false)
                    .await;
            }
            gateway
                .broadcast(
                    &room_code,
                    ServerMessage::SolutionPassed {
                        player_id,
                        card_id,
                        test_results: report.test_results,
                        new_card,
                    },
                )
                .await;
        }
        Commit::Failed => {
            gateway
                .broadcast(
                    &room_code,
                    ServerMessage::SolutionFailed {
                        player_id,
                        card_id,
                        error: report.error,
                        test_results: report.test_results,
                    },
                )
                .await;
        }
    }

    // The submitter may have disconnected mid-grade; with the in-flight
    // marker gone the room is reapable again.
    state.delete_if_empty(&room_code).await;
}

async fn handle_player_eliminated(
    state: &AppState,
    gateway: &dyn EventGateway,
    conn_id: &ConnectionId,
) {
    let Some((player_id, room_code)) = state.resolve_connection(conn_id).await else {
        return;
    };
    match state.eliminate_player(&room_code, &player_id).await {
        Ok(Some(player)) => {
            gateway
                .broadcast(
                    &room_code,
                    ServerMessage::PlayerEliminated {
                        player_id: player.id,
                        username: player.username,
                        eliminated_at: player.eliminated_at.unwrap_or_default(),
                    },
                )
                .await;
            state.check_win_condition(gateway, &room_code).await;
        }
        // repeat report, or the room/player is already gone
        Ok(None) | Err(_) => {}
    }
}

async fn handle_apply_targeted_debuff(
    state: &AppState,
    gateway: &dyn EventGateway,
    conn_id: &ConnectionId,
    target_player_id: PlayerId,
) {
    let Some((player_id, room_code)) = state.resolve_connection(conn_id).await else {
        return;
    };
    if let Err(e) = state
        .resolve_target(gateway, &room_code, &player_id, &target_player_id)
        .await
    {
        send_error(gateway, conn_id, e).await;
    }
}

async fn handle_debug_trigger_reward(
    state: &AppState,
    gateway: &dyn EventGateway,
    conn_id: &ConnectionId,
    reward: Reward,
) {
    let Some((player_id, room_code)) = state.resolve_connection(conn_id).await else {
        return;
    };
    state
        .apply_reward(gateway, &room_code, &player_id, reward, true)
        .await;
}

async fn handle_get_game_state(
    state: &AppState,
    gateway: &dyn EventGateway,
    conn_id: &ConnectionId,
) {
    let Some((_, room_code)) = state.resolve_connection(conn_id).await else {
        return;
    };
    if let Some(snapshot) = state.snapshot(&room_code).await {
        gateway.send_to(conn_id, snapshot).await;
    }
}
