use super::utils::{clamp_to_arena, heading_delta, heading_towards, step_along, wrap_heading};
use super::*;
use crate::constants::{BOT_ATTRACTION_RADIUS, BOT_TURN_FLIP_PROBABILITY};

impl GameEngine {
    pub(super) fn sweep_expired_effects(&mut self, now_ms: u64) {
        for player in &mut self.players {
            let view = &mut player.view;
            if view.blocked && now_ms >= view.blocked_until {
                view.blocked = false;
                view.blocked_until = 0;
                self.events.push(RuntimeEvent::PlayerUnblocked {
                    player_id: view.id.clone(),
                });
            }

            if let Some(kind) = player.speed_effect {
                if now_ms >= view.speed_effect_until {
                    view.speed = player.base_speed;
                    view.speed_effect_until = 0;
                    player.speed_effect = None;
                    self.events.push(RuntimeEvent::EffectExpired {
                        player_id: view.id.clone(),
                        kind,
                    });
                }
            }

            let timed = [
                (
                    &mut view.invincible,
                    &mut view.invincible_until,
                    PowerUpKind::Invincibility,
                ),
                (
                    &mut view.invisible,
                    &mut view.invisible_until,
                    PowerUpKind::Invisibility,
                ),
                (
                    &mut view.reversed,
                    &mut view.reversed_until,
                    PowerUpKind::ControlReverse,
                ),
            ];
            for (active, until, kind) in timed {
                if *active && now_ms >= *until {
                    *active = false;
                    *until = 0;
                    if kind == PowerUpKind::ControlReverse {
                        std::mem::swap(&mut view.turning_left, &mut view.turning_right);
                    }
                    self.events.push(RuntimeEvent::EffectExpired {
                        player_id: view.id.clone(),
                        kind,
                    });
                }
            }
        }
    }

    /// Bots head for a nearby power-up when one is in range and otherwise
    /// flip their turn intents at random.
    pub(super) fn update_bot_intents(&mut self) {
        for idx in 0..self.players.len() {
            if self.players[idx].view.control != ControlSource::Bot {
                continue;
            }
            let position = self.players[idx].view.position();
            if !position.is_finite() {
                tracing::warn!(
                    player_id = %self.players[idx].view.id,
                    "bot has a non-finite position, skipping its intents"
                );
                continue;
            }

            if let Some(target) = self.nearest_power_up_within(position, BOT_ATTRACTION_RADIUS) {
                let view = &mut self.players[idx].view;
                let delta = heading_delta(view.heading, heading_towards(position, target));
                view.turning_left = delta < -self.config.turn_rate;
                view.turning_right = delta > self.config.turn_rate;
                continue;
            }

            let roll = self.rng.next_f32();
            let view = &mut self.players[idx].view;
            if roll < BOT_TURN_FLIP_PROBABILITY {
                view.turning_left = !view.turning_left;
            } else if roll > 1.0 - BOT_TURN_FLIP_PROBABILITY {
                view.turning_right = !view.turning_right;
            }
        }
    }

    fn nearest_power_up_within(&self, position: Vec2, radius: f32) -> Option<Vec2> {
        self.live_power_ups()
            .map(|power_up| {
                let target = power_up.position();
                (target.distance_to(position), target)
            })
            .filter(|(distance, _)| *distance <= radius)
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
            .map(|(_, target)| target)
    }

    /// Applies turn and forward intents. Returns, per player, the position it
    /// moved from this tick.
    pub(super) fn move_players(&mut self) -> Vec<Option<Vec2>> {
        let turn_rate = self.config.turn_rate;
        let (width, height, cell_size) = (
            self.config.arena_width,
            self.config.arena_height,
            self.config.cell_size,
        );
        self.players
            .iter_mut()
            .map(|player| {
                let view = &mut player.view;
                if view.blocked {
                    return None;
                }
                if view.turning_left {
                    view.heading = wrap_heading(view.heading - turn_rate);
                }
                if view.turning_right {
                    view.heading = wrap_heading(view.heading + turn_rate);
                }
                if !view.moving {
                    return None;
                }
                let from = view.position();
                let next = clamp_to_arena(
                    step_along(from, view.heading, view.speed),
                    width,
                    height,
                    cell_size,
                );
                view.x = next.x;
                view.y = next.y;
                Some(from)
            })
            .collect()
    }

    pub(super) fn paint_trails(&mut self, moved_from: &[Option<Vec2>]) {
        let radius = self.grid.cell_size() / 2.0;
        for (player, from) in self.players.iter().zip(moved_from) {
            let Some(from) = from else {
                continue;
            };
            if player.view.blocked {
                continue;
            }
            self.grid.paint_disc(*from, radius, player.view.color);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GameConfig;
    use crate::constants::TICK_MS;
    use crate::engine::GameEngine;
    use crate::types::{
        ControlSource, KeyBindings, PlayerColor, PowerUpKind, PowerUpView, StartPlayer,
    };

    fn make_players(count: usize, control: ControlSource) -> Vec<StartPlayer> {
        PlayerColor::ALL
            .iter()
            .take(count)
            .enumerate()
            .map(|(idx, color)| StartPlayer {
                id: format!("p{}", idx + 1),
                color: *color,
                control,
                keys: Some(KeyBindings::new("a", "d")),
            })
            .collect()
    }

    fn running(count: usize, control: ControlSource, seed: u32) -> GameEngine {
        let config = GameConfig::from_surface(400.0, 300.0);
        let mut engine =
            GameEngine::new(config, make_players(count, control), seed).expect("valid roster");
        engine.start_round();
        engine.next_spawn_at_ms = u64::MAX;
        engine
    }

    #[test]
    fn heading_stays_in_range_while_turning() {
        let mut engine = running(6, ControlSource::Bot, 17);
        for player in &mut engine.players {
            player.view.turning_left = true;
        }
        for _ in 0..5_000 {
            engine.step(TICK_MS);
            for player in engine.players() {
                assert!((0.0..360.0).contains(&player.heading), "heading {}", player.heading);
            }
            if engine.is_ended() {
                break;
            }
        }
    }

    #[test]
    fn players_stay_inside_walls() {
        let mut engine = running(4, ControlSource::Bot, 23);
        for player in &mut engine.players {
            player.base_speed = 9.0;
            player.view.speed = 9.0;
        }
        let max_x = engine.config.arena_width - engine.config.cell_size;
        let max_y = engine.config.arena_height - engine.config.cell_size;
        for _ in 0..1_500 {
            engine.step(TICK_MS);
            for player in engine.players() {
                assert!(player.x >= 0.0 && player.x <= max_x, "x {}", player.x);
                assert!(player.y >= 0.0 && player.y <= max_y, "y {}", player.y);
            }
        }
    }

    #[test]
    fn blocked_player_is_frozen_and_does_not_paint() {
        let mut engine = running(1, ControlSource::Human, 5);
        engine.players[0].view.x = 200.0;
        engine.players[0].view.y = 150.0;
        engine.players[0].view.turning_left = true;
        engine.players[0].view.blocked = true;
        engine.players[0].view.blocked_until = engine.now_ms() + 3_000;

        for _ in 0..100 {
            engine.step(TICK_MS);
            assert_eq!(engine.players[0].view.x, 200.0);
            assert_eq!(engine.players[0].view.y, 150.0);
            assert_eq!(engine.players[0].view.heading, 0.0);
        }
        assert_eq!(engine.grid.owned_by(PlayerColor::Red), 0);
    }

    #[test]
    fn moving_player_paints_disc_at_pre_move_position() {
        let mut engine = running(1, ControlSource::Human, 6);
        engine.players[0].view.x = 105.0;
        engine.players[0].view.y = 105.0;
        engine.step(TICK_MS);
        assert!(engine.players[0].view.x > 105.0);
        assert_eq!(engine.grid.get(5, 5), Some(PlayerColor::Red));
        assert_eq!(engine.grid.get(4, 4), Some(PlayerColor::Red));
        assert_eq!(engine.grid.owned_by(PlayerColor::Red), 4);
    }

    #[test]
    fn bot_never_flips_both_turns_in_one_tick() {
        let mut engine = running(1, ControlSource::Bot, 2024);
        for _ in 0..20_000 {
            let before = (
                engine.players[0].view.turning_left,
                engine.players[0].view.turning_right,
            );
            engine.update_bot_intents();
            let after = (
                engine.players[0].view.turning_left,
                engine.players[0].view.turning_right,
            );
            assert!(!(before.0 != after.0 && before.1 != after.1));
        }
    }

    #[test]
    fn bot_steers_towards_nearby_power_up() {
        let mut engine = running(1, ControlSource::Bot, 8);
        engine.players[0].view.x = 100.0;
        engine.players[0].view.y = 100.0;
        engine.players[0].view.heading = 0.0;
        engine.power_ups.push(PowerUpView {
            id: "powerup_x".to_string(),
            kind: PowerUpKind::Slow,
            x: 100.0,
            y: 140.0,
            created_at_ms: engine.now_ms(),
            consumed: false,
        });
        engine.update_bot_intents();
        assert!(engine.players[0].view.turning_right);
        assert!(!engine.players[0].view.turning_left);
    }

    #[test]
    fn bot_with_non_finite_position_is_skipped() {
        let mut engine = running(1, ControlSource::Bot, 8);
        engine.players[0].view.x = f32::NAN;
        engine.players[0].view.turning_left = false;
        engine.players[0].view.turning_right = false;
        for _ in 0..1_000 {
            engine.update_bot_intents();
        }
        assert!(!engine.players[0].view.turning_left);
        assert!(!engine.players[0].view.turning_right);
    }
}
