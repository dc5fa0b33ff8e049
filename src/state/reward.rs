//! Reward/effect engine
//!
//! Rewards that need no user input are applied synchronously; the two
//! targeted kinds go through a request/resolve handshake so state only
//! mutates once the target is confirmed. The candidate set always excludes
//! the actor, so self-targeting is impossible by construction. The
//! `is_debug` escape hatch readmits the actor only when nobody else is left.

use super::AppState;
use crate::error::GameError;
use crate::gateway::EventGateway;
use crate::protocol::{AffectedPlayer, ServerMessage, TargetInfo};
use crate::types::*;
use rand::Rng;

/// What `apply_reward` did, so callers need no foreknowledge of which
/// reward kinds are two-phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardOutcome {
    /// Effect fully applied
    Applied,
    /// Stored as the actor's pending targeted reward; resolution pending
    Pending,
    /// No eligible target existed; nothing happened
    NoCandidates,
}

/// Outbound side effect computed under the room lock, emitted after release
enum Emit {
    Broadcast(ServerMessage),
    ToConn(ConnectionId, ServerMessage),
}

impl AppState {
    /// Interpret a card's reward descriptor against room state.
    pub async fn apply_reward(
        &self,
        gateway: &dyn EventGateway,
        room_code: &str,
        actor: &PlayerId,
        reward: Reward,
        is_debug: bool,
    ) -> RewardOutcome {
        let (outcome, emits) = {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get_mut(room_code) else {
                return RewardOutcome::NoCandidates;
            };
            let now = now_ms();
            let mut emits: Vec<Emit> = Vec::new();

            let outcome = match &reward {
                Reward::AddTime { amount } => {
                    match room.players.get_mut(actor) {
                        Some(player) => {
                            // Unbounded in the positive direction
                            if let Some(end) = player.timer_end_time.as_mut() {
                                *end += (*amount * 1000) as i64;
                                emits.push(Emit::Broadcast(ServerMessage::RewardApplied {
                                    effect: RewardKind::AddTime,
                                    value: *amount,
                                    player_id: Some(actor.clone()),
                                    from_player: None,
                                    target_name: None,
                                    affected_players: None,
                                }));
                            }
                            RewardOutcome::Applied
                        }
                        None => RewardOutcome::NoCandidates,
                    }
                }

                Reward::RemoveTimeRandom { amount } => {
                    let candidates = candidate_ids(room, actor, is_debug);
                    if candidates.is_empty() {
                        RewardOutcome::NoCandidates
                    } else {
                        let target_id = {
                            let mut rng = rand::rng();
                            candidates[rng.random_range(0..candidates.len())].clone()
                        };
                        if let Some(target) = room.players.get_mut(&target_id) {
                            clamp_deadline(target, *amount, now);
                        }
                        emits.push(Emit::Broadcast(ServerMessage::RewardApplied {
                            effect: RewardKind::RemoveTimeRandom,
                            value: *amount,
                            player_id: Some(target_id),
                            from_player: Some(actor.clone()),
                            target_name: None,
                            affected_players: None,
                        }));
                        RewardOutcome::Applied
                    }
                }

                Reward::RemoveTimeAll { amount } => {
                    let candidates = candidate_ids(room, actor, is_debug);
                    if candidates.is_empty() {
                        RewardOutcome::NoCandidates
                    } else {
                        let mut affected = Vec::new();
                        for target_id in &candidates {
                            if let Some(target) = room.players.get_mut(target_id) {
                                if clamp_deadline(target, *amount, now) {
                                    affected.push(AffectedPlayer {
                                        player_id: target.id.clone(),
                                        username: target.username.clone(),
                                    });
                                }
                            }
                        }
                        if !affected.is_empty() {
                            emits.push(Emit::Broadcast(ServerMessage::RewardApplied {
                                effect: RewardKind::RemoveTimeAll,
                                value: *amount,
                                player_id: None,
                                from_player: Some(actor.clone()),
                                target_name: None,
                                affected_players: Some(affected),
                            }));
                        }
                        RewardOutcome::Applied
                    }
                }

                Reward::RemoveTimeTargeted { .. } | Reward::FlashbangTargeted => {
                    let candidates = candidate_ids(room, actor, is_debug);
                    if candidates.is_empty() {
                        RewardOutcome::NoCandidates
                    } else {
                        let available_targets: Vec<TargetInfo> = candidates
                            .iter()
                            .filter_map(|id| room.players.get(id))
                            .map(|p| TargetInfo {
                                player_id: p.id.clone(),
                                username: p.username.clone(),
                                time_remaining: p.time_remaining_secs(now),
                            })
                            .collect();
                        match room.players.get_mut(actor) {
                            Some(player) => {
                                // as_targeted is Some by construction of this arm
                                player.pending_targeted_reward = reward.as_targeted();
                                emits.push(Emit::ToConn(
                                    player.conn_id.clone(),
                                    ServerMessage::TargetSelectionRequired {
                                        effect: reward.kind(),
                                        value: reward.amount(),
                                        available_targets,
                                    },
                                ));
                                RewardOutcome::Pending
                            }
                            None => RewardOutcome::NoCandidates,
                        }
                    }
                }
            };
            (outcome, emits)
        };

        for emit in emits {
            match emit {
                Emit::Broadcast(msg) => gateway.broadcast(room_code, msg).await,
                Emit::ToConn(conn_id, msg) => gateway.send_to(&conn_id, msg).await,
            }
        }
        outcome
    }

    /// Phase 2 of a targeted reward. The pending reward is consumed
    /// unconditionally: an invalid target still clears it.
    pub async fn resolve_target(
        &self,
        gateway: &dyn EventGateway,
        room_code: &str,
        actor: &PlayerId,
        target_id: &PlayerId,
    ) -> Result<(), GameError> {
        let emit = {
            let mut rooms = self.rooms.write().await;
            let room = rooms
                .get_mut(room_code)
                .ok_or_else(|| GameError::RoomNotFound(room_code.to_string()))?;

            let actor_player = room.players.get_mut(actor).ok_or(GameError::NotInRoom)?;
            let reward = actor_player
                .pending_targeted_reward
                .take()
                .ok_or(GameError::NoPendingReward)?;
            let actor_name = actor_player.username.clone();

            let target = room
                .players
                .get_mut(target_id)
                .ok_or(GameError::InvalidTarget)?;
            if target.is_eliminated {
                return Err(GameError::TargetEliminated);
            }

            match reward {
                TargetedReward::RemoveTime { amount } => {
                    clamp_deadline(target, amount, now_ms());
                    Emit::Broadcast(ServerMessage::RewardApplied {
                        effect: RewardKind::RemoveTimeTargeted,
                        value: amount,
                        player_id: Some(target_id.clone()),
                        from_player: Some(actor.clone()),
                        target_name: Some(target.username.clone()),
                        affected_players: None,
                    })
                }
                TargetedReward::Flashbang => Emit::ToConn(
                    target.conn_id.clone(),
                    ServerMessage::FlashbangApplied {
                        from_player: actor.clone(),
                        from_username: actor_name,
                    },
                ),
            }
        };

        match emit {
            Emit::Broadcast(msg) => gateway.broadcast(room_code, msg).await,
            Emit::ToConn(conn_id, msg) => gateway.send_to(&conn_id, msg).await,
        }
        Ok(())
    }
}

/// Non-eliminated players other than the actor, in join order. With
/// `is_debug` the actor becomes targetable when nobody else qualifies.
fn candidate_ids(room: &Room, actor: &PlayerId, is_debug: bool) -> Vec<PlayerId> {
    let mut ids: Vec<PlayerId> = room
        .active_players()
        .filter(|p| p.id != *actor)
        .map(|p| p.id.clone())
        .collect();
    if is_debug
        && ids.is_empty()
        && room.players.get(actor).is_some_and(|p| !p.is_eliminated)
    {
        ids.push(actor.clone());
    }
    ids
}

/// Pull a deadline closer by `amount` seconds, clamped so it never drops
/// below `now`. Returns whether a running timer was adjusted.
fn clamp_deadline(player: &mut Player, amount: u64, now: i64) -> bool {
    match player.timer_end_time.as_mut() {
        Some(end) => {
            *end = (*end - (amount * 1000) as i64).max(now);
            true
        }
        None => false,
    }
}
