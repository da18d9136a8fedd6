use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::GameConfig;
use crate::constants::{
    COUNTDOWN_INTERVAL_MS, DISPLAY_LETTERS, MAX_PLAYERS, POWER_UP_SPAWN_INTERVAL_MS,
    POWER_UP_TTL_MS,
};
use crate::error::GameError;
use crate::grid::CoverageGrid;
use crate::rng::Rng;
use crate::types::{
    ArenaView, ControlSource, CoverageEntry, KeyBindings, PlayerColor, PlayerView, PowerUpKind,
    PowerUpView, RoundPhase, RoundSummary, RuntimeEvent, ScoreEntry, Snapshot, StartPlayer,
    Vec2, Winner,
};

mod collision_system;
mod player_system;
mod power_up_system;
mod utils;

#[derive(Clone, Debug, Default)]
struct PlayerStats {
    power_ups: i32,
    collisions: i32,
}

#[derive(Clone, Debug)]
struct PlayerInternal {
    view: PlayerView,
    keys: Option<KeyBindings>,
    base_speed: f32,
    speed_effect: Option<PowerUpKind>,
    stats: PlayerStats,
}

/// One arena and its round. The host calls [`GameEngine::step`] on a fixed
/// cadence; nothing inside schedules itself.
#[derive(Clone, Debug)]
pub struct GameEngine {
    pub config: GameConfig,

    grid: CoverageGrid,
    rng: Rng,
    players: Vec<PlayerInternal>,
    power_ups: Vec<PowerUpView>,
    events: Vec<RuntimeEvent>,

    phase: RoundPhase,
    now_ms: u64,
    round_started_at_ms: u64,
    remaining_secs: u32,
    next_countdown_at_ms: u64,
    next_spawn_at_ms: u64,
    tick_counter: u64,
    winner: Option<Winner>,
    next_id_counter: u64,
}

impl GameEngine {
    pub fn new(
        config: GameConfig,
        start_players: Vec<StartPlayer>,
        seed: u32,
    ) -> Result<Self, GameError> {
        config.validate()?;
        validate_roster(&start_players)?;

        let grid = CoverageGrid::new(config.grid_cols(), config.grid_rows(), config.cell_size);
        let players = start_players
            .into_iter()
            .enumerate()
            .map(|(index, start)| {
                let offset = 100.0 * (index + 1) as f32;
                PlayerInternal {
                    view: PlayerView {
                        id: start.id,
                        letter: '?',
                        color: start.color,
                        control: start.control,
                        x: offset.min(config.arena_width - config.cell_size),
                        y: offset.min(config.arena_height - config.cell_size),
                        heading: 0.0,
                        speed: config.base_speed,
                        moving: true,
                        turning_left: false,
                        turning_right: false,
                        blocked: false,
                        blocked_until: 0,
                        invincible: false,
                        invisible: false,
                        reversed: false,
                        speed_effect_until: 0,
                        invincible_until: 0,
                        invisible_until: 0,
                        reversed_until: 0,
                    },
                    keys: start.keys,
                    base_speed: config.base_speed,
                    speed_effect: None,
                    stats: PlayerStats::default(),
                }
            })
            .collect();

        let mut engine = Self {
            remaining_secs: config.round_seconds,
            config,
            grid,
            rng: Rng::new(seed),
            players,
            power_ups: Vec::new(),
            events: Vec::new(),
            phase: RoundPhase::Idle,
            now_ms: 0,
            round_started_at_ms: 0,
            next_countdown_at_ms: 0,
            next_spawn_at_ms: 0,
            tick_counter: 0,
            winner: None,
            next_id_counter: 1,
        };
        engine.assign_letters();
        Ok(engine)
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == RoundPhase::Running
    }

    pub fn is_ended(&self) -> bool {
        self.phase == RoundPhase::Ended
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn winner(&self) -> Option<&Winner> {
        self.winner.as_ref()
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerView> {
        self.players.iter().map(|player| &player.view)
    }

    /// Power-ups that are neither consumed nor past their time-to-live.
    pub fn live_power_ups(&self) -> impl Iterator<Item = &PowerUpView> {
        let now_ms = self.now_ms;
        self.power_ups.iter().filter(move |power_up| {
            !power_up.consumed && now_ms.saturating_sub(power_up.created_at_ms) < POWER_UP_TTL_MS
        })
    }

    pub fn coverage(&self) -> Vec<CoverageEntry> {
        self.grid.coverage_for(&self.colors())
    }

    /// Resets every player, the grid and the power-ups, then starts a fresh
    /// countdown. Valid from any phase.
    pub fn start_round(&mut self) {
        self.assign_letters();
        for idx in 0..self.players.len() {
            let x = self
                .rng
                .range_f32(0.0, self.config.arena_width - self.config.cell_size);
            let y = self
                .rng
                .range_f32(0.0, self.config.arena_height - self.config.cell_size);
            let player = &mut self.players[idx];
            player.view.x = x;
            player.view.y = y;
            player.view.heading = 0.0;
            player.view.speed = player.base_speed;
            player.view.moving = true;
            player.view.turning_left = false;
            player.view.turning_right = false;
            player.view.blocked = false;
            player.view.blocked_until = 0;
            player.view.invincible = false;
            player.view.invisible = false;
            player.view.reversed = false;
            player.view.speed_effect_until = 0;
            player.view.invincible_until = 0;
            player.view.invisible_until = 0;
            player.view.reversed_until = 0;
            player.speed_effect = None;
            player.stats = PlayerStats::default();
        }

        self.grid.clear();
        self.power_ups.clear();
        self.winner = None;
        self.remaining_secs = self.config.round_seconds;
        self.round_started_at_ms = self.now_ms;
        self.next_countdown_at_ms = self.now_ms + COUNTDOWN_INTERVAL_MS;
        self.next_spawn_at_ms = self.now_ms + POWER_UP_SPAWN_INTERVAL_MS;
        self.phase = RoundPhase::Running;
        self.events.push(RuntimeEvent::RoundStarted {
            remaining_secs: self.remaining_secs,
        });
        tracing::info!(
            players = self.players.len(),
            seconds = self.remaining_secs,
            "round started"
        );
    }

    /// Advances simulated time by `dt_ms` and runs exactly one simulation
    /// tick. No-op unless the round is running.
    pub fn step(&mut self, dt_ms: u64) {
        if self.phase != RoundPhase::Running {
            return;
        }
        self.tick_counter += 1;
        self.now_ms = self.now_ms.saturating_add(dt_ms);
        let now_ms = self.now_ms;

        self.sweep_expired_effects(now_ms);
        self.update_bot_intents();
        let moved_from = self.move_players();
        self.resolve_player_collisions(now_ms);
        self.collect_power_ups(now_ms);
        self.paint_trails(&moved_from);
        self.prune_power_ups(now_ms);
        self.update_spawner(now_ms);
        self.update_countdown(now_ms);
    }

    /// Routes a key-down (`pressed`) or key-up to every human player bound
    /// to it. Returns whether any binding matched.
    pub fn receive_key(&mut self, key: &str, pressed: bool) -> bool {
        if self.phase != RoundPhase::Running {
            return false;
        }
        let key = key.to_lowercase();
        let mut matched = false;
        for player in &mut self.players {
            if player.view.control != ControlSource::Human {
                continue;
            }
            let Some(keys) = player.keys.as_ref() else {
                continue;
            };
            let (left, right) = if player.view.reversed {
                (&keys.right, &keys.left)
            } else {
                (&keys.left, &keys.right)
            };
            if key == left.to_lowercase() {
                player.view.turning_left = pressed;
                matched = true;
            } else if key == right.to_lowercase() {
                player.view.turning_right = pressed;
                matched = true;
            }
        }
        matched
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let snapshot = Snapshot {
            tick: self.tick_counter,
            now_ms: self.now_ms,
            remaining_secs: self.remaining_secs,
            phase: self.phase,
            arena: ArenaView {
                width: self.config.arena_width,
                height: self.config.arena_height,
                cell_size: self.config.cell_size,
                cols: self.grid.cols(),
                rows: self.grid.rows(),
            },
            players: self.players.iter().map(|p| p.view.clone()).collect(),
            power_ups: self.live_power_ups().cloned().collect(),
            cells: self.grid.cells().to_vec(),
            coverage: self.coverage(),
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }

    pub fn build_summary(&self) -> RoundSummary {
        let mut ranking: Vec<ScoreEntry> = self
            .players
            .iter()
            .map(|player| ScoreEntry {
                player_id: player.view.id.clone(),
                letter: player.view.letter,
                color: player.view.color,
                control: player.view.control,
                coverage: self.grid.coverage_percent(player.view.color),
                power_ups: player.stats.power_ups,
                collisions: player.stats.collisions,
            })
            .collect();
        ranking.sort_by(|a, b| b.coverage.partial_cmp(&a.coverage).unwrap_or(Ordering::Equal));

        let winner = if self.phase == RoundPhase::Ended {
            self.winner.clone()
        } else {
            self.compute_winner()
        };
        RoundSummary {
            winner,
            duration_ms: self.now_ms.saturating_sub(self.round_started_at_ms),
            ranking,
        }
    }

    /// Strictly greatest coverage against a running maximum seeded at zero:
    /// the first leader wins ties and nobody wins with zero coverage.
    fn compute_winner(&self) -> Option<Winner> {
        let mut max_coverage = 0.0f32;
        let mut winner = None;
        for player in &self.players {
            let coverage = self.grid.coverage_percent(player.view.color);
            if coverage > max_coverage {
                max_coverage = coverage;
                winner = Some(Winner {
                    player_id: player.view.id.clone(),
                    letter: player.view.letter,
                    color: player.view.color,
                    coverage,
                });
            }
        }
        winner
    }

    fn update_countdown(&mut self, now_ms: u64) {
        while self.phase == RoundPhase::Running && now_ms >= self.next_countdown_at_ms {
            self.next_countdown_at_ms += COUNTDOWN_INTERVAL_MS;
            self.remaining_secs = self.remaining_secs.saturating_sub(1);
            if self.remaining_secs == 0 {
                self.end_round();
            }
        }
    }

    fn end_round(&mut self) {
        self.phase = RoundPhase::Ended;
        self.winner = self.compute_winner();
        match &self.winner {
            Some(winner) => tracing::info!(
                winner = winner.color.label(),
                coverage = winner.coverage,
                "round ended"
            ),
            None => tracing::info!("round ended without a winner"),
        }
        self.events.push(RuntimeEvent::RoundEnded {
            winner: self.winner.clone(),
        });
    }

    fn assign_letters(&mut self) {
        let mut letters: Vec<char> = DISPLAY_LETTERS.chars().collect();
        self.rng.shuffle(&mut letters);
        for (player, letter) in self.players.iter_mut().zip(letters) {
            player.view.letter = letter;
        }
    }

    fn colors(&self) -> Vec<PlayerColor> {
        self.players.iter().map(|player| player.view.color).collect()
    }

    fn make_id(&mut self, prefix: &str) -> String {
        let id = format!("{}_{}", prefix, self.next_id_counter);
        self.next_id_counter = self.next_id_counter.saturating_add(1);
        id
    }
}

fn validate_roster(start_players: &[StartPlayer]) -> Result<(), GameError> {
    if start_players.is_empty() {
        return Err(GameError::EmptyRoster);
    }
    if start_players.len() > MAX_PLAYERS {
        return Err(GameError::TooManyPlayers {
            count: start_players.len(),
            max: MAX_PLAYERS,
        });
    }
    let mut colors = HashSet::new();
    let mut ids = HashSet::new();
    for start in start_players {
        if !colors.insert(start.color) {
            return Err(GameError::DuplicateColor(start.color));
        }
        if !ids.insert(start.id.as_str()) {
            return Err(GameError::DuplicatePlayerId(start.id.clone()));
        }
        if start.control == ControlSource::Human && start.keys.is_none() {
            return Err(GameError::MissingKeyBindings(start.id.clone()));
        }
    }
    Ok(())
}
