use chrono::{SecondsFormat, Utc};
use clap::Parser;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use territory_paint_server::config::GameConfig;
use territory_paint_server::constants::{
    ALL_POWER_UP_KINDS, DEFAULT_ARENA_HEIGHT, DEFAULT_ARENA_WIDTH, MAX_PLAYERS, POWER_UP_TTL_MS,
    TICK_MS, TICK_RATE,
};
use territory_paint_server::engine::GameEngine;
use territory_paint_server::types::{
    ControlSource, PlayerColor, PowerUpKind, RuntimeEvent, ScoreEntry, Snapshot, StartPlayer,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plays bot-only paint rounds and checks invariants")]
struct Cli {
    #[arg(long, default_value_t = 4)]
    players: usize,
    #[arg(long, default_value_t = 30)]
    seconds: u32,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 1)]
    rounds: u32,
    #[arg(long, default_value_t = DEFAULT_ARENA_WIDTH)]
    width: f32,
    #[arg(long, default_value_t = DEFAULT_ARENA_HEIGHT)]
    height: f32,
    /// Comma-separated power-up kinds to enable; all kinds when omitted.
    #[arg(long, value_delimiter = ',')]
    power_ups: Vec<String>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    players: usize,
    seconds: u32,
    width: f32,
    height: f32,
    #[serde(rename = "powerUps")]
    power_ups: Vec<PowerUpKind>,
    seed: u32,
}

#[derive(Clone, Debug, Serialize)]
struct RoundResultLine {
    scenario: String,
    seed: u32,
    players: usize,
    seconds: u32,
    winner: Option<PlayerColor>,
    #[serde(rename = "winnerCoverage")]
    winner_coverage: f32,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    #[serde(rename = "maxTotalCoverage")]
    max_total_coverage: f32,
    #[serde(rename = "powerUpsSpawned")]
    power_ups_spawned: i32,
    #[serde(rename = "powerUpsTaken")]
    power_ups_taken: i32,
    #[serde(rename = "powerUpsExpired")]
    power_ups_expired: i32,
    collisions: i32,
    ranking: Vec<ScoreEntry>,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug)]
struct RoundRun {
    result: RoundResultLine,
    anomaly_records: Vec<AnomalyRecord>,
    finished_tick: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "generatedAt")]
    generated_at: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "roundCount")]
    round_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageWinnerCoverage")]
    average_winner_coverage: f32,
    #[serde(rename = "winCounts")]
    win_counts: BTreeMap<String, usize>,
    rounds: Vec<RoundResultLine>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli)?;
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, run_started_at_ms));
    let mut has_anomaly = false;
    let mut results = Vec::new();
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        tracing::info!(
            match_id = %match_id,
            scenario = %scenario.name,
            seed = scenario.seed,
            players = scenario.players,
            seconds = scenario.seconds,
            "round started"
        );
        let run = run_round(&scenario)?;

        for anomaly in &run.anomaly_records {
            tracing::warn!(
                match_id = %match_id,
                scenario = %scenario.name,
                seed = scenario.seed,
                tick = anomaly.tick,
                "anomaly detected: {}",
                anomaly.message
            );
        }
        if !run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += run.anomaly_records.len();

        tracing::info!(
            match_id = %match_id,
            scenario = %scenario.name,
            tick = run.finished_tick,
            winner = run.result.winner.map(PlayerColor::label).unwrap_or("none"),
            coverage = run.result.winner_coverage,
            "round finished"
        );
        println!("{}", serde_json::to_string(&run.result)?);
        results.push(run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        now_ms(),
        results,
        total_anomalies,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            tracing::error!(
                match_id = %match_id,
                path = %path.display(),
                "failed to write summary: {error}"
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    tracing::info!(
        match_id = %match_id,
        rounds = summary.round_count,
        anomalies = summary.anomaly_count,
        average_winner_coverage = summary.average_winner_coverage,
        summary_out = summary_out_written.as_deref().unwrap_or("-"),
        "run finished"
    );

    if has_anomaly {
        std::process::exit(1);
    }
    Ok(())
}

fn bot_roster(count: usize) -> Vec<StartPlayer> {
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

fn run_round(scenario: &Scenario) -> anyhow::Result<RoundRun> {
    let config = GameConfig {
        round_seconds: scenario.seconds,
        power_up_kinds: scenario.power_ups.clone(),
        ..GameConfig::from_surface(scenario.width, scenario.height)
    };
    let roster = bot_roster(scenario.players);
    let mut engine = GameEngine::new(config.clone(), roster, scenario.seed)?;
    engine.start_round();

    let mut max_total_coverage = 0.0f32;
    let mut power_ups_spawned = 0;
    let mut power_ups_taken = 0;
    let mut power_ups_expired = 0;
    let mut collisions = 0;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let tick_limit = (scenario.seconds as u64 + 5) * TICK_RATE as u64 * 2;
    let mut last_tick = 0u64;

    while !engine.is_ended() {
        engine.step(TICK_MS);
        let snapshot = engine.build_snapshot(true);
        last_tick = snapshot.tick;
        for message in collect_snapshot_anomalies(&snapshot, &config) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }
        if snapshot.tick > tick_limit {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                "tick safety limit exceeded".to_string(),
            );
            break;
        }

        let total: f32 = snapshot.coverage.iter().map(|entry| entry.percent).sum();
        max_total_coverage = max_total_coverage.max(total);

        for event in &snapshot.events {
            match event {
                RuntimeEvent::PowerUpSpawned { .. } => power_ups_spawned += 1,
                RuntimeEvent::PowerUpTaken { .. } => power_ups_taken += 1,
                RuntimeEvent::PowerUpExpired { .. } => power_ups_expired += 1,
                RuntimeEvent::PlayersCollided { .. } => collisions += 1,
                _ => {}
            }
        }
    }

    let summary = engine.build_summary();
    Ok(RoundRun {
        result: RoundResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            players: scenario.players,
            seconds: scenario.seconds,
            winner: summary.winner.as_ref().map(|winner| winner.color),
            winner_coverage: summary
                .winner
                .as_ref()
                .map(|winner| round_tenth(winner.coverage))
                .unwrap_or(0.0),
            duration_ms: summary.duration_ms,
            max_total_coverage: round_tenth(max_total_coverage),
            power_ups_spawned,
            power_ups_taken,
            power_ups_expired,
            collisions,
            ranking: summary.ranking,
            anomalies,
        },
        anomaly_records,
        finished_tick: last_tick,
    })
}

fn collect_snapshot_anomalies(snapshot: &Snapshot, config: &GameConfig) -> Vec<String> {
    let mut anomalies = Vec::new();

    let mut total = 0.0f32;
    for entry in &snapshot.coverage {
        if !entry.percent.is_finite() || entry.percent < 0.0 || entry.percent > 100.0 {
            anomalies.push(format!(
                "coverage out of range: {} {}",
                entry.color.label(),
                entry.percent
            ));
        }
        total += entry.percent;
    }
    if total > 100.0 + 1e-3 {
        anomalies.push(format!("coverage sum exceeds 100: {total}"));
    }

    if snapshot.cells.len() != snapshot.arena.cols * snapshot.arena.rows {
        anomalies.push("grid size does not match arena".to_string());
    }

    let max_x = config.arena_width - config.cell_size;
    let max_y = config.arena_height - config.cell_size;
    for player in &snapshot.players {
        if !(0.0..360.0).contains(&player.heading) {
            anomalies.push(format!("heading out of range: {}", player.id));
        }
        if !(0.0..=max_x).contains(&player.x) || !(0.0..=max_y).contains(&player.y) {
            anomalies.push(format!("player outside arena: {}", player.id));
        }
    }

    for power_up in &snapshot.power_ups {
        if power_up.consumed {
            anomalies.push(format!("consumed power-up still live: {}", power_up.id));
        }
        if snapshot.now_ms.saturating_sub(power_up.created_at_ms) >= POWER_UP_TTL_MS {
            anomalies.push(format!("expired power-up still live: {}", power_up.id));
        }
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli) -> anyhow::Result<Vec<Scenario>> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(rand::random::<u64>));
    let players = cli.players.clamp(1, MAX_PLAYERS);
    let seconds = cli.seconds.clamp(1, 600);
    let rounds = cli.rounds.clamp(1, 100);
    let power_ups = parse_power_ups(&cli.power_ups)?;

    Ok((0..rounds)
        .map(|round| Scenario {
            name: format!("bots{}-round{}", players, round + 1),
            players,
            seconds,
            width: cli.width,
            height: cli.height,
            power_ups: power_ups.clone(),
            seed: seed.wrapping_add(round),
        })
        .collect())
}

fn parse_power_ups(raw: &[String]) -> anyhow::Result<Vec<PowerUpKind>> {
    if raw.is_empty() {
        return Ok(ALL_POWER_UP_KINDS.to_vec());
    }
    raw.iter()
        .map(|tag| {
            PowerUpKind::parse(tag)
                .ok_or_else(|| anyhow::anyhow!("unknown power-up kind '{tag}'"))
        })
        .collect()
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    rounds: Vec<RoundResultLine>,
    anomaly_count: usize,
) -> RunSummary {
    let round_count = rounds.len();
    let average_winner_coverage = if round_count == 0 {
        0.0
    } else {
        let total: f32 = rounds.iter().map(|round| round.winner_coverage).sum();
        round_tenth(total / round_count as f32)
    };
    let mut win_counts = BTreeMap::new();
    for round in &rounds {
        let key = round
            .winner
            .map(|color| color.label().to_ascii_lowercase())
            .unwrap_or_else(|| "none".to_string());
        *win_counts.entry(key).or_insert(0) += 1;
    }
    RunSummary {
        match_id,
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        started_at_ms,
        finished_at_ms,
        round_count,
        anomaly_count,
        average_winner_coverage,
        win_counts,
        rounds,
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, summary_text)
}
