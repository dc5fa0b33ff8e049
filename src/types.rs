use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type CardId = String;
pub type RoomCode = String;
/// Transport-level identity of one live connection. Distinct from
/// `PlayerId`: a player's connection can change, a player id never does.
pub type ConnectionId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Lobby,
    Playing,
    Ended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Canonical callable shape of a problem: function name plus ordered
/// parameter list. Test case inputs are keyed by parameter name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// JSON object mapping parameter names to argument values
    pub input: serde_json::Value,
    pub expected_output: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub signature: Signature,
    pub test_cases: Vec<TestCase>,
}

/// Buff/debuff granted for solving a card. `amount` is seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Reward {
    AddTime { amount: u64 },
    RemoveTimeRandom { amount: u64 },
    RemoveTimeAll { amount: u64 },
    RemoveTimeTargeted { amount: u64 },
    FlashbangTargeted,
}

/// Discriminant of a [`Reward`], used in outbound events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    AddTime,
    RemoveTimeRandom,
    RemoveTimeAll,
    RemoveTimeTargeted,
    FlashbangTargeted,
}

impl Reward {
    pub fn kind(&self) -> RewardKind {
        match self {
            Reward::AddTime { .. } => RewardKind::AddTime,
            Reward::RemoveTimeRandom { .. } => RewardKind::RemoveTimeRandom,
            Reward::RemoveTimeAll { .. } => RewardKind::RemoveTimeAll,
            Reward::RemoveTimeTargeted { .. } => RewardKind::RemoveTimeTargeted,
            Reward::FlashbangTargeted => RewardKind::FlashbangTargeted,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            Reward::AddTime { amount }
            | Reward::RemoveTimeRandom { amount }
            | Reward::RemoveTimeAll { amount }
            | Reward::RemoveTimeTargeted { amount } => *amount,
            Reward::FlashbangTargeted => 0,
        }
    }

    /// Two-phase rewards need an explicit target before they take effect
    pub fn as_targeted(&self) -> Option<TargetedReward> {
        match self {
            Reward::RemoveTimeTargeted { amount } => {
                Some(TargetedReward::RemoveTime { amount: *amount })
            }
            Reward::FlashbangTargeted => Some(TargetedReward::Flashbang),
            _ => None,
        }
    }
}

/// A two-phase reward as stored on the actor while awaiting target selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetedReward {
    RemoveTime { amount: u64 },
    Flashbang,
}

impl TargetedReward {
    pub fn kind(&self) -> RewardKind {
        match self {
            TargetedReward::RemoveTime { .. } => RewardKind::RemoveTimeTargeted,
            TargetedReward::Flashbang => RewardKind::FlashbangTargeted,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            TargetedReward::RemoveTime { amount } => *amount,
            TargetedReward::Flashbang => 0,
        }
    }
}

/// Display-only constraint attached to a card. Not enforced by grading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Challenge {
    TimeLimit { value: u32 },
    Complexity { value: String },
    LineLimit { value: u32 },
}

/// A single-use instance of a problem dealt into a player's hand
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: CardId,
    pub problem: Problem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<Reward>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<Challenge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    /// Owning connection; never serialized into snapshots
    #[serde(skip)]
    pub conn_id: ConnectionId,
    /// Absolute wall-clock deadline in milliseconds, None until game start
    pub timer_end_time: Option<i64>,
    pub is_eliminated: bool,
    pub eliminated_at: Option<i64>,
    /// Card the player is currently working on
    pub selected_card: Option<CardId>,
    pub cards: Vec<Card>,
    #[serde(skip)]
    pub pending_targeted_reward: Option<TargetedReward>,
}

impl Player {
    pub fn new(conn_id: ConnectionId, username: String) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            username,
            conn_id,
            timer_end_time: None,
            is_eliminated: false,
            eliminated_at: None,
            selected_card: None,
            cards: Vec::new(),
            pending_targeted_reward: None,
        }
    }

    /// Whole seconds left on the clock at `now_ms`, floored at zero
    pub fn time_remaining_secs(&self, now_ms: i64) -> i64 {
        self.timer_end_time
            .map(|end| ((end - now_ms) / 1000).max(0))
            .unwrap_or(0)
    }
}

/// One isolated game session. Owns its players exclusively.
#[derive(Debug)]
pub struct Room {
    pub code: RoomCode,
    pub players: HashMap<PlayerId, Player>,
    /// Player ids in join order; the first entry still present in `players`
    /// is the host
    pub join_order: Vec<PlayerId>,
    pub phase: GamePhase,
    pub winner: Option<PlayerId>,
    /// Submissions for this room currently suspended on a grading
    /// subprocess. The registry refuses to delete the room while nonzero.
    pub grading_in_flight: usize,
}

impl Room {
    pub fn new(code: RoomCode) -> Self {
        Self {
            code,
            players: HashMap::new(),
            join_order: Vec::new(),
            phase: GamePhase::Lobby,
            winner: None,
            grading_in_flight: 0,
        }
    }

    pub fn add_player(&mut self, player: Player) {
        self.join_order.push(player.id.clone());
        self.players.insert(player.id.clone(), player);
    }

    pub fn remove_player(&mut self, player_id: &PlayerId) -> Option<Player> {
        self.join_order.retain(|id| id != player_id);
        self.players.remove(player_id)
    }

    pub fn host_id(&self) -> Option<&PlayerId> {
        self.join_order
            .iter()
            .find(|id| self.players.contains_key(*id))
    }

    /// Players still in the running, in join order
    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.join_order
            .iter()
            .filter_map(|id| self.players.get(id))
            .filter(|p| !p.is_eliminated)
    }

    /// All players in join order
    pub fn players_in_order(&self) -> Vec<Player> {
        self.join_order
            .iter()
            .filter_map(|id| self.players.get(id))
            .cloned()
            .collect()
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_follows_join_order_after_departures() {
        let mut room = Room::new("ABC123".to_string());
        let a = Player::new("c1".into(), "alice".into());
        let b = Player::new("c2".into(), "bob".into());
        let a_id = a.id.clone();
        let b_id = b.id.clone();
        room.add_player(a);
        room.add_player(b);

        assert_eq!(room.host_id(), Some(&a_id));
        room.remove_player(&a_id);
        assert_eq!(room.host_id(), Some(&b_id));
        room.remove_player(&b_id);
        assert_eq!(room.host_id(), None);
    }

    #[test]
    fn reward_serializes_with_effect_tag() {
        let reward = Reward::RemoveTimeTargeted { amount: 50 };
        let json = serde_json::to_value(&reward).unwrap();
        assert_eq!(json["effect"], "remove_time_targeted");
        assert_eq!(json["amount"], 50);

        let flash: Reward =
            serde_json::from_value(serde_json::json!({ "effect": "flashbang_targeted" })).unwrap();
        assert_eq!(flash, Reward::FlashbangTargeted);
    }

    #[test]
    fn time_remaining_floors_at_zero() {
        let mut player = Player::new("c1".into(), "alice".into());
        player.timer_end_time = Some(1_000);
        assert_eq!(player.time_remaining_secs(500_000), 0);
        player.timer_end_time = Some(10_500);
        assert_eq!(player.time_remaining_secs(500), 10);
    }
}
