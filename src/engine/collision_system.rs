use super::utils::clamp_to_arena;
use super::*;
use crate::constants::{BLOCK_DURATION_MS, COLLISION_PUSH_DISTANCE};

impl GameEngine {
    /// Checks every unordered pair once. Touching players are blocked and
    /// pushed apart along the line between them.
    pub(super) fn resolve_player_collisions(&mut self, now_ms: u64) {
        let cell_size = self.config.cell_size;
        for a in 0..self.players.len() {
            for b in (a + 1)..self.players.len() {
                let pa = self.players[a].view.position();
                let pb = self.players[b].view.position();
                if pa.distance_to(pb) >= cell_size {
                    continue;
                }
                self.separate_pair(a, b, now_ms);
            }
        }
    }

    fn separate_pair(&mut self, a: usize, b: usize, now_ms: u64) {
        let pa = self.players[a].view.position();
        let pb = self.players[b].view.position();
        // Coincident players separate along the x axis.
        let angle = (pb.y - pa.y).atan2(pb.x - pa.x);
        let push = Vec2::new(
            COLLISION_PUSH_DISTANCE * angle.cos(),
            COLLISION_PUSH_DISTANCE * angle.sin(),
        );

        let pushed_a = self.clamp(Vec2::new(pa.x - push.x, pa.y - push.y));
        let pushed_b = self.clamp(Vec2::new(pb.x + push.x, pb.y + push.y));
        for (idx, target) in [(a, pushed_a), (b, pushed_b)] {
            let player = &mut self.players[idx];
            player.view.x = target.x;
            player.view.y = target.y;
            player.view.blocked = true;
            player.view.blocked_until = now_ms + BLOCK_DURATION_MS;
            player.stats.collisions += 1;
        }

        let a_id = self.players[a].view.id.clone();
        let b_id = self.players[b].view.id.clone();
        tracing::debug!(a = %a_id, b = %b_id, "players collided");
        self.events.push(RuntimeEvent::PlayersCollided { a: a_id, b: b_id });
    }

    fn clamp(&self, position: Vec2) -> Vec2 {
        clamp_to_arena(
            position,
            self.config.arena_width,
            self.config.arena_height,
            self.config.cell_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GameConfig;
    use crate::engine::GameEngine;
    use crate::types::{ControlSource, PlayerColor, RuntimeEvent, StartPlayer};

    fn make_players(count: usize) -> Vec<StartPlayer> {
        PlayerColor::ALL
            .iter()
            .take(count)
            .enumerate()
            .map(|(idx, color)| StartPlayer {
                id: format!("bot_{}", idx + 1),
                color: *color,
                control: ControlSource::Bot,
                keys: None,
            })
            .collect()
    }

    fn engine_with(count: usize) -> GameEngine {
        let config = GameConfig::from_surface(400.0, 300.0);
        let mut engine = GameEngine::new(config, make_players(count), 1).expect("valid roster");
        engine.start_round();
        engine
    }

    #[test]
    fn coincident_players_separate_along_x() {
        let mut engine = engine_with(2);
        for idx in 0..2 {
            engine.players[idx].view.x = 200.0;
            engine.players[idx].view.y = 100.0;
        }
        engine.resolve_player_collisions(engine.now_ms());
        assert_eq!(engine.players[0].view.x, 170.0);
        assert_eq!(engine.players[1].view.x, 230.0);
        assert_eq!(engine.players[0].view.y, 100.0);
    }

    #[test]
    fn push_against_wall_is_clamped() {
        let mut engine = engine_with(2);
        engine.players[0].view.x = 5.0;
        engine.players[0].view.y = 50.0;
        engine.players[1].view.x = 15.0;
        engine.players[1].view.y = 50.0;
        engine.resolve_player_collisions(engine.now_ms());
        assert_eq!(engine.players[0].view.x, 0.0);
        assert_eq!(engine.players[1].view.x, 45.0);
    }

    #[test]
    fn distant_players_do_not_collide() {
        let mut engine = engine_with(3);
        let spots = [(0.0, 0.0), (100.0, 0.0), (0.0, 100.0)];
        for (idx, (x, y)) in spots.iter().enumerate() {
            engine.players[idx].view.x = *x;
            engine.players[idx].view.y = *y;
        }
        engine.build_snapshot(true);
        engine.resolve_player_collisions(engine.now_ms());
        assert!(engine.players().all(|player| !player.blocked));
        let snapshot = engine.build_snapshot(true);
        assert!(!snapshot
            .events
            .iter()
            .any(|event| matches!(event, RuntimeEvent::PlayersCollided { .. })));
    }
}
