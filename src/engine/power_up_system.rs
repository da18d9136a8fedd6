use super::*;
use crate::constants::{
    AREA_PAINT_RADIUS_CELLS, BOT_PICKUP_RADIUS, EFFECT_DURATION_MS, POWER_UP_SPAWN_ATTEMPTS,
};

impl GameEngine {
    /// Lets each unblocked player take the live power-ups it touches. Bots
    /// also take anything within their own contact radius.
    pub(super) fn collect_power_ups(&mut self, now_ms: u64) {
        let cell_size = self.config.cell_size;
        for player_idx in 0..self.players.len() {
            let player = &self.players[player_idx].view;
            if player.blocked {
                continue;
            }
            let reach = match player.control {
                ControlSource::Bot => cell_size.max(BOT_PICKUP_RADIUS),
                ControlSource::Human => cell_size,
            };
            let position = player.position();

            for power_up_idx in 0..self.power_ups.len() {
                let power_up = &self.power_ups[power_up_idx];
                if power_up.consumed
                    || now_ms.saturating_sub(power_up.created_at_ms) >= POWER_UP_TTL_MS
                    || power_up.position().distance_to(position) >= reach
                {
                    continue;
                }
                self.power_ups[power_up_idx].consumed = true;
                let kind = self.power_ups[power_up_idx].kind;
                let power_up_id = self.power_ups[power_up_idx].id.clone();
                self.apply_power_up(player_idx, kind, now_ms);
                self.events.push(RuntimeEvent::PowerUpTaken {
                    power_up_id,
                    kind,
                    by: self.players[player_idx].view.id.clone(),
                });
            }
        }
    }

    pub(super) fn apply_power_up(&mut self, player_idx: usize, kind: PowerUpKind, now_ms: u64) {
        let until = now_ms + EFFECT_DURATION_MS;
        let boost_speed = self.config.boost_speed;
        let slow_speed = self.config.slow_speed;
        let player = &mut self.players[player_idx];
        player.stats.power_ups += 1;
        tracing::debug!(player_id = %player.view.id, ?kind, "power-up taken");

        match kind {
            PowerUpKind::SpeedBoost | PowerUpKind::Slow => {
                player.view.speed = if kind == PowerUpKind::SpeedBoost {
                    boost_speed
                } else {
                    slow_speed
                };
                player.view.speed_effect_until = until;
                player.speed_effect = Some(kind);
            }
            PowerUpKind::Invincibility => {
                player.view.invincible = true;
                player.view.invincible_until = until;
            }
            PowerUpKind::ControlReverse => {
                if !player.view.reversed {
                    std::mem::swap(&mut player.view.turning_left, &mut player.view.turning_right);
                }
                player.view.reversed = true;
                player.view.reversed_until = until;
            }
            PowerUpKind::Invisibility => {
                player.view.invisible = true;
                player.view.invisible_until = until;
            }
            PowerUpKind::AreaPaint => {
                let center = player.view.position();
                let color = player.view.color;
                let radius = AREA_PAINT_RADIUS_CELLS * self.grid.cell_size();
                self.grid.paint_area(center, radius, color);
            }
        }
    }

    /// Drops consumed power-ups and those past their time-to-live.
    pub(super) fn prune_power_ups(&mut self, now_ms: u64) {
        let mut expired = Vec::new();
        self.power_ups.retain(|power_up| {
            if power_up.consumed {
                return false;
            }
            if now_ms.saturating_sub(power_up.created_at_ms) >= POWER_UP_TTL_MS {
                expired.push(power_up.id.clone());
                return false;
            }
            true
        });
        for power_up_id in expired {
            self.events.push(RuntimeEvent::PowerUpExpired { power_up_id });
        }
    }

    pub(super) fn update_spawner(&mut self, now_ms: u64) {
        if now_ms < self.next_spawn_at_ms {
            return;
        }
        self.next_spawn_at_ms = now_ms + POWER_UP_SPAWN_INTERVAL_MS;
        self.spawn_power_up(now_ms);
    }

    fn spawn_power_up(&mut self, now_ms: u64) {
        if self.config.power_up_kinds.is_empty() {
            return;
        }
        let kinds = &self.config.power_up_kinds;
        let kind = kinds[self.rng.pick_index(kinds.len())];
        let Some(spot) = self.pick_spawn_position() else {
            tracing::debug!(?kind, "no free spot for power-up, skipping spawn");
            return;
        };

        let power_up = PowerUpView {
            id: self.make_id("powerup"),
            kind,
            x: spot.x,
            y: spot.y,
            created_at_ms: now_ms,
            consumed: false,
        };
        self.events.push(RuntimeEvent::PowerUpSpawned {
            power_up: power_up.clone(),
        });
        self.power_ups.push(power_up);
    }

    /// Rejection-samples a spot at least one cell away from every player.
    fn pick_spawn_position(&mut self) -> Option<Vec2> {
        let max_x = self.config.arena_width - self.config.cell_size;
        let max_y = self.config.arena_height - self.config.cell_size;
        for _ in 0..POWER_UP_SPAWN_ATTEMPTS {
            let candidate = Vec2::new(
                self.rng.range_f32(0.0, max_x),
                self.rng.range_f32(0.0, max_y),
            );
            let clear = self.players.iter().all(|player| {
                player.view.position().distance_to(candidate) >= self.config.cell_size
            });
            if clear {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GameConfig;
    use crate::constants::TICK_MS;
    use crate::engine::GameEngine;
    use crate::types::{
        ControlSource, KeyBindings, PlayerColor, PowerUpKind, PowerUpView, RuntimeEvent,
        StartPlayer,
    };

    fn make_player(id: &str, color: PlayerColor, control: ControlSource) -> StartPlayer {
        StartPlayer {
            id: id.to_string(),
            color,
            control,
            keys: Some(KeyBindings::new("a", "d")),
        }
    }

    fn human() -> StartPlayer {
        make_player("p1", PlayerColor::Red, ControlSource::Human)
    }

    fn idle_engine(players: Vec<StartPlayer>) -> GameEngine {
        let config = GameConfig::from_surface(400.0, 300.0);
        let mut engine = GameEngine::new(config, players, 3).expect("valid roster");
        engine.start_round();
        engine.next_spawn_at_ms = u64::MAX;
        for (idx, player) in engine.players.iter_mut().enumerate() {
            player.view.moving = false;
            player.view.x = 40.0 + 120.0 * idx as f32;
            player.view.y = 40.0;
        }
        engine
    }

    fn drop_power_up(engine: &mut GameEngine, kind: PowerUpKind, x: f32, y: f32) {
        let id = engine.make_id("powerup");
        engine.power_ups.push(PowerUpView {
            id,
            kind,
            x,
            y,
            created_at_ms: engine.now_ms(),
            consumed: false,
        });
    }

    fn taken_events(engine: &mut GameEngine) -> usize {
        engine
            .build_snapshot(true)
            .events
            .iter()
            .filter(|event| matches!(event, RuntimeEvent::PowerUpTaken { .. }))
            .count()
    }

    #[test]
    fn bot_contact_takes_power_up_only_once() {
        let bot = make_player("bot", PlayerColor::Red, ControlSource::Bot);
        let mut engine = idle_engine(vec![bot]);
        drop_power_up(&mut engine, PowerUpKind::Invincibility, 45.0, 40.0);
        engine.build_snapshot(true);

        engine.step(TICK_MS);
        engine.step(TICK_MS);
        assert_eq!(engine.players[0].stats.power_ups, 1);
        assert_eq!(taken_events(&mut engine), 1);
        assert!(engine.players[0].view.invincible);
        assert!(engine.power_ups.is_empty());
    }

    #[test]
    fn blocked_player_cannot_take_power_up() {
        let mut engine = idle_engine(vec![human()]);
        engine.players[0].view.blocked = true;
        engine.players[0].view.blocked_until = u64::MAX;
        drop_power_up(&mut engine, PowerUpKind::Slow, 45.0, 40.0);
        engine.step(TICK_MS);
        assert_eq!(engine.players[0].stats.power_ups, 0);
        assert_eq!(engine.live_power_ups().count(), 1);
    }

    #[test]
    fn slow_replaces_active_boost() {
        let mut engine = idle_engine(vec![human()]);
        engine.apply_power_up(0, PowerUpKind::SpeedBoost, engine.now_ms());
        engine.step(1_000);
        let now = engine.now_ms();
        engine.apply_power_up(0, PowerUpKind::Slow, now);
        assert_eq!(engine.players[0].view.speed, engine.config.slow_speed);
        assert_eq!(engine.players[0].view.speed_effect_until, now + 5_000);

        engine.step(4_999);
        assert_eq!(engine.players[0].view.speed, engine.config.slow_speed);
        engine.step(1);
        assert_eq!(engine.players[0].view.speed, engine.config.base_speed);
    }

    #[test]
    fn control_reverse_swaps_bindings_until_expiry() {
        let mut engine = idle_engine(vec![human()]);
        engine.apply_power_up(0, PowerUpKind::ControlReverse, engine.now_ms());

        assert!(engine.receive_key("a", true));
        assert!(engine.players[0].view.turning_right);
        assert!(!engine.players[0].view.turning_left);
        engine.receive_key("a", false);

        engine.step(5_000);
        assert!(!engine.players[0].view.reversed);
        assert!(engine.receive_key("a", true));
        assert!(engine.players[0].view.turning_left);
    }

    #[test]
    fn repeated_control_reverse_keeps_held_key_releasable() {
        let mut engine = idle_engine(vec![human()]);
        engine.apply_power_up(0, PowerUpKind::ControlReverse, engine.now_ms());
        assert!(engine.receive_key("a", true));
        assert!(engine.players[0].view.turning_right);

        engine.step(1_000);
        let now = engine.now_ms();
        engine.apply_power_up(0, PowerUpKind::ControlReverse, now);
        assert!(engine.players[0].view.turning_right);
        assert!(!engine.players[0].view.turning_left);
        assert_eq!(engine.players[0].view.reversed_until, now + 5_000);

        assert!(engine.receive_key("a", false));
        assert!(!engine.players[0].view.turning_left);
        assert!(!engine.players[0].view.turning_right);

        engine.step(4_999);
        assert!(engine.players[0].view.reversed);
        engine.step(1);
        assert!(!engine.players[0].view.reversed);
        assert!(!engine.players[0].view.turning_left);
        assert!(!engine.players[0].view.turning_right);
    }

    #[test]
    fn invisibility_and_invincibility_are_timed_flags() {
        let mut engine = idle_engine(vec![human()]);
        let now = engine.now_ms();
        engine.apply_power_up(0, PowerUpKind::Invisibility, now);
        engine.apply_power_up(0, PowerUpKind::Invincibility, now);
        assert!(engine.players[0].view.invisible);
        assert!(engine.players[0].view.invincible);
        engine.step(5_000);
        assert!(!engine.players[0].view.invisible);
        assert!(!engine.players[0].view.invincible);
    }

    #[test]
    fn area_paint_claims_cells_around_player() {
        let mut engine = idle_engine(vec![
            human(),
            make_player("p2", PlayerColor::Blue, ControlSource::Human),
        ]);
        engine.players[0].view.x = 200.0;
        engine.players[0].view.y = 150.0;
        engine.apply_power_up(0, PowerUpKind::AreaPaint, engine.now_ms());
        let cells = engine.grid.owned_by(PlayerColor::Red);
        assert!(cells > 20, "painted {cells} cells");
        assert_eq!(engine.grid.get(10, 7), Some(PlayerColor::Red));
        assert_eq!(engine.grid.get(0, 0), None);
        assert_eq!(engine.players[0].view.speed, engine.config.base_speed);
    }

    #[test]
    fn spawner_skips_when_no_spot_is_free() {
        let config = GameConfig {
            arena_width: 20.0,
            arena_height: 20.0,
            cell_size: 20.0,
            ..GameConfig::default()
        };
        let players = vec![make_player("p1", PlayerColor::Red, ControlSource::Human)];
        let mut engine = GameEngine::new(config, players, 3).expect("valid roster");
        engine.start_round();
        engine.players[0].view.moving = false;
        engine.players[0].view.x = 0.0;
        engine.players[0].view.y = 0.0;
        engine.step(7_000);
        assert_eq!(engine.live_power_ups().count(), 0);
    }
}
