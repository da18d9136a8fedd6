use crate::types::PlayerColor;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("a round needs at least one player")]
    EmptyRoster,
    #[error("too many players: {count} (max {max})")]
    TooManyPlayers { count: usize, max: usize },
    #[error("color {} is used by more than one player", .0.label())]
    DuplicateColor(PlayerColor),
    #[error("duplicate player id '{0}'")]
    DuplicatePlayerId(String),
    #[error("human player '{0}' has no key bindings")]
    MissingKeyBindings(String),
    #[error("arena {width}x{height} with cell size {cell_size} has no cells")]
    EmptyArena {
        width: f32,
        height: f32,
        cell_size: f32,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
