use crate::types::PowerUpKind;

pub const TICK_RATE: u32 = 60;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const ROUND_SECONDS: u32 = 30;
pub const COUNTDOWN_INTERVAL_MS: u64 = 1_000;

pub const BLOCK_DURATION_MS: u64 = 3_000;
pub const EFFECT_DURATION_MS: u64 = 5_000;
pub const POWER_UP_TTL_MS: u64 = 10_000;
pub const POWER_UP_SPAWN_INTERVAL_MS: u64 = 7_000;
pub const POWER_UP_SPAWN_ATTEMPTS: usize = 64;

/// Units per tick.
pub const PLAYER_BASE_SPEED: f32 = 0.67;
pub const SPEED_BOOST_SPEED: f32 = 2.0;
pub const SLOW_SPEED: f32 = 0.1;
/// Degrees per tick.
pub const TURN_RATE_DEG: f32 = 0.67;

pub const COLLISION_PUSH_DISTANCE: f32 = 30.0;
pub const AREA_PAINT_RADIUS_CELLS: f32 = 3.0;

pub const BOT_TURN_FLIP_PROBABILITY: f32 = 0.02;
pub const BOT_ATTRACTION_RADIUS: f32 = 50.0;
pub const BOT_PICKUP_RADIUS: f32 = 10.0;

pub const GRID_COLUMNS_ACROSS: f32 = 20.0;
pub const SURFACE_MARGIN_X: f32 = 4.0;
pub const SURFACE_MARGIN_Y: f32 = 304.0;
pub const DEFAULT_ARENA_WIDTH: f32 = 1276.0;
pub const DEFAULT_ARENA_HEIGHT: f32 = 716.0;

pub const MAX_PLAYERS: usize = 6;
pub const DISPLAY_LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub const ALL_POWER_UP_KINDS: [PowerUpKind; 6] = [
    PowerUpKind::SpeedBoost,
    PowerUpKind::Slow,
    PowerUpKind::Invincibility,
    PowerUpKind::ControlReverse,
    PowerUpKind::Invisibility,
    PowerUpKind::AreaPaint,
];

pub fn cell_size_for_width(surface_width: f32) -> f32 {
    (surface_width / GRID_COLUMNS_ACROSS).floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_size_is_floor_of_a_twentieth() {
        assert_eq!(cell_size_for_width(1276.0), 63.0);
        assert_eq!(cell_size_for_width(400.0), 20.0);
        assert_eq!(cell_size_for_width(19.0), 0.0);
    }
}
