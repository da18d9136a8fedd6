use std::path::PathBuf;

use crate::constants::{
    cell_size_for_width, ALL_POWER_UP_KINDS, DEFAULT_ARENA_HEIGHT, DEFAULT_ARENA_WIDTH,
    PLAYER_BASE_SPEED, ROUND_SECONDS, SLOW_SPEED, SPEED_BOOST_SPEED, SURFACE_MARGIN_X,
    SURFACE_MARGIN_Y, TURN_RATE_DEG,
};
use crate::error::GameError;
use crate::types::PowerUpKind;

/// Tuning for one round. Speeds are per tick, turn rate in degrees per tick.
#[derive(Clone, Debug)]
pub struct GameConfig {
    pub arena_width: f32,
    pub arena_height: f32,
    pub cell_size: f32,
    pub base_speed: f32,
    pub boost_speed: f32,
    pub slow_speed: f32,
    pub turn_rate: f32,
    pub round_seconds: u32,
    pub power_up_kinds: Vec<PowerUpKind>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::from_surface(DEFAULT_ARENA_WIDTH, DEFAULT_ARENA_HEIGHT)
    }
}

impl GameConfig {
    /// Arena matching a drawing surface; cell size is a twentieth of its width.
    pub fn from_surface(width: f32, height: f32) -> Self {
        Self {
            arena_width: width,
            arena_height: height,
            cell_size: cell_size_for_width(width),
            base_speed: PLAYER_BASE_SPEED,
            boost_speed: SPEED_BOOST_SPEED,
            slow_speed: SLOW_SPEED,
            turn_rate: TURN_RATE_DEG,
            round_seconds: ROUND_SECONDS,
            power_up_kinds: ALL_POWER_UP_KINDS.to_vec(),
        }
    }

    pub fn from_viewport(viewport_width: f32, viewport_height: f32) -> Self {
        Self::from_surface(
            (viewport_width - SURFACE_MARGIN_X).max(0.0),
            (viewport_height - SURFACE_MARGIN_Y).max(0.0),
        )
    }

    pub fn grid_cols(&self) -> usize {
        (self.arena_width / self.cell_size).ceil() as usize
    }

    pub fn grid_rows(&self) -> usize {
        (self.arena_height / self.cell_size).ceil() as usize
    }

    pub fn validate(&self) -> Result<(), GameError> {
        let finite = [
            self.arena_width,
            self.arena_height,
            self.cell_size,
            self.base_speed,
            self.boost_speed,
            self.slow_speed,
            self.turn_rate,
        ]
        .iter()
        .all(|value| value.is_finite());
        if !finite {
            return Err(GameError::InvalidConfig(
                "tuning values must be finite".to_string(),
            ));
        }
        if self.cell_size <= 0.0
            || self.arena_width < self.cell_size
            || self.arena_height < self.cell_size
        {
            return Err(GameError::EmptyArena {
                width: self.arena_width,
                height: self.arena_height,
                cell_size: self.cell_size,
            });
        }
        if self.base_speed < 0.0 || self.boost_speed < 0.0 || self.slow_speed < 0.0 {
            return Err(GameError::InvalidConfig(
                "speeds cannot be negative".to_string(),
            ));
        }
        if self.round_seconds == 0 {
            return Err(GameError::InvalidConfig(
                "round_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Host settings for the WebSocket server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: Option<PathBuf>,
    pub arena_width: f32,
    pub arena_height: f32,
    pub round_seconds: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            static_dir: None,
            arena_width: DEFAULT_ARENA_WIDTH,
            arena_height: DEFAULT_ARENA_HEIGHT,
            round_seconds: ROUND_SECONDS,
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(parsed) if parsed > 0 => config.port = parsed,
                _ => tracing::warn!("invalid PORT '{}', using default", port),
            }
        }

        if let Ok(dir) = std::env::var("STATIC_DIR") {
            config.static_dir = Some(PathBuf::from(dir));
        }

        if let Ok(width) = std::env::var("ARENA_WIDTH") {
            match width.parse::<f32>() {
                Ok(parsed) if parsed.is_finite() && parsed > 0.0 => config.arena_width = parsed,
                _ => tracing::warn!("invalid ARENA_WIDTH '{}', using default", width),
            }
        }

        if let Ok(height) = std::env::var("ARENA_HEIGHT") {
            match height.parse::<f32>() {
                Ok(parsed) if parsed.is_finite() && parsed > 0.0 => config.arena_height = parsed,
                _ => tracing::warn!("invalid ARENA_HEIGHT '{}', using default", height),
            }
        }

        if let Ok(secs) = std::env::var("ROUND_SECONDS") {
            match secs.parse::<u32>() {
                Ok(parsed) if (1..=600).contains(&parsed) => config.round_seconds = parsed,
                _ => tracing::warn!("ROUND_SECONDS must be 1-600, got '{}'", secs),
            }
        }

        config
    }

    pub fn game_config(&self) -> GameConfig {
        GameConfig {
            round_seconds: self.round_seconds,
            ..GameConfig::from_surface(self.arena_width, self.arena_height)
        }
    }
}
