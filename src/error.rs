use thiserror::Error;

/// Validation failures surfaced to the acting connection as an
/// `error`/`join_error` event. None of these mutate state and none are fatal
/// to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Username required")]
    UsernameRequired,

    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Not connected to a room")]
    NotInRoom,

    #[error("No players in game")]
    EmptyRoom,

    #[error("Only host can start game")]
    NotHost,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Card not found")]
    CardNotFound,

    #[error("Card is not currently selected")]
    CardNotSelected,

    #[error("Player is eliminated")]
    PlayerEliminated,

    #[error("No pending reward")]
    NoPendingReward,

    #[error("Invalid target")]
    InvalidTarget,

    #[error("Cannot target eliminated player")]
    TargetEliminated,
}
