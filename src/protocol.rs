use crate::sandbox::CaseResult;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinRoom {
        username: String,
        #[serde(default)]
        room_code: Option<String>,
    },
    StartGame,
    SelectCard {
        card_id: CardId,
    },
    SubmitSolution {
        card_id: CardId,
        code: String,
    },
    /// Self-report that the player's timer hit zero
    PlayerEliminated,
    /// Phase 2 of a targeted reward: the actor picked a target
    ApplyTargetedDebuff {
        target_player_id: PlayerId,
    },
    /// Dev tool to trigger rewards without solving a card
    DebugTriggerReward {
        reward: Reward,
    },
    GetGameState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    JoinError {
        message: String,
    },
    PlayerJoined {
        player_id: PlayerId,
        username: String,
        room_code: RoomCode,
    },
    /// Full room snapshot, sent to a single connection on join or request
    GameState {
        players: Vec<Player>,
        game_status: GamePhase,
        room_code: RoomCode,
        winner: Option<PlayerId>,
    },
    GameStarted {
        players: Vec<Player>,
    },
    CardSelected {
        player_id: PlayerId,
        card_id: CardId,
        problem: Problem,
    },
    SolutionPassed {
        player_id: PlayerId,
        card_id: CardId,
        test_results: Vec<CaseResult>,
        new_card: Card,
    },
    SolutionFailed {
        player_id: PlayerId,
        card_id: CardId,
        error: Option<String>,
        test_results: Vec<CaseResult>,
    },
    PlayerEliminated {
        player_id: PlayerId,
        username: String,
        eliminated_at: i64,
    },
    /// Sent to the acting player's connection only: pick a target
    TargetSelectionRequired {
        effect: RewardKind,
        value: u64,
        available_targets: Vec<TargetInfo>,
    },
    RewardApplied {
        effect: RewardKind,
        value: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        player_id: Option<PlayerId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        from_player: Option<PlayerId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        target_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        affected_players: Option<Vec<AffectedPlayer>>,
    },
    /// Sent to the target's connection only; purely cosmetic
    FlashbangApplied {
        from_player: PlayerId,
        from_username: String,
    },
    GameEnded {
        winner: Option<PlayerId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner_name: Option<String>,
    },
    PlayerLeft {
        player_id: PlayerId,
        username: String,
    },
    Error {
        message: String,
    },
}

/// Candidate target listed in a `target_selection_required` event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub player_id: PlayerId,
    pub username: String,
    /// Remaining-time estimate in whole seconds
    pub time_remaining: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedPlayer {
    pub player_id: PlayerId,
    pub username: String,
}
