use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use territory_paint_server::config::ServerConfig;
use territory_paint_server::constants::TICK_MS;
use territory_paint_server::engine::GameEngine;
use territory_paint_server::server_protocol::{parse_client_message, ParsedClientMessage};
use territory_paint_server::server_utils::{
    default_slots, normalize_slot_index, roster_from_slots, sanitize_name, LobbySlot,
};
use territory_paint_server::types::ControlSource;
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::EnvFilter;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    name: Option<String>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    config: ServerConfig,
    clients: HashMap<String, ClientContext>,
    slots: Vec<LobbySlot>,
    game: Option<GameEngine>,
}

impl ServerState {
    fn new(config: ServerConfig) -> Self {
        Self {
            config,
            clients: HashMap::new(),
            slots: default_slots(),
            game: None,
        }
    }

    fn is_running(&self) -> bool {
        self.game.as_ref().map(GameEngine::is_running).unwrap_or(false)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::load_or_default();
    config
        .game_config()
        .validate()
        .context("arena settings from the environment are unusable")?;
    let port = config.port;
    let static_dir = resolve_static_dir(&config);

    let state = Arc::new(Mutex::new(ServerState::new(config)));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = static_dir {
        let index_file = static_dir.join("index.html");
        tracing::info!(root = %static_dir.display(), "serving static files");
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        tracing::warn!("static file root not found, serving the WebSocket API only");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(port, "listening");
    axum::serve(listener, app)
        .await
        .context("server runtime failed")?;
    Ok(())
}

fn resolve_static_dir(config: &ServerConfig) -> Option<PathBuf> {
    if let Some(path) = config.static_dir.as_ref() {
        if path.join("index.html").is_file() {
            return Some(path.clone());
        }
        tracing::warn!(path = %path.display(), "STATIC_DIR has no index.html");
    }

    let candidates = [PathBuf::from("public"), PathBuf::from("dist/client")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        guard.clients.insert(
            client_id.clone(),
            ClientContext {
                tx: tx.clone(),
                name: None,
            },
        );
    }
    tracing::debug!(client_id = %client_id, "client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&state, &client_id, raw.as_str()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = std::str::from_utf8(&raw) {
                    handle_client_message(&state, &client_id, text).await;
                } else {
                    let mut guard = state.lock().await;
                    send_error(&mut guard, &client_id, "invalid utf8 message");
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut guard = state.lock().await;
        disconnect_client(&mut guard, &client_id);
    }
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: &SharedState, client_id: &str, raw: &str) {
    let mut guard = state.lock().await;
    let Some(message) = parse_client_message(raw) else {
        send_error(&mut guard, client_id, "invalid message");
        return;
    };

    let greeted = guard
        .clients
        .get(client_id)
        .map(|client| client.name.is_some())
        .unwrap_or(false);
    if !greeted && !matches!(message, ParsedClientMessage::Hello { .. }) {
        send_error(&mut guard, client_id, "send hello first");
        return;
    }

    match message {
        ParsedClientMessage::Hello { name } => handle_hello(&mut guard, client_id, &name),
        ParsedClientMessage::Ping { t } => {
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "pong",
                    "t": t,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        ParsedClientMessage::ConfigureSlot {
            slot,
            enabled,
            control,
            color,
            left,
            right,
        } => {
            if guard.is_running() {
                send_error(&mut guard, client_id, "round is running");
                return;
            }
            let Some(slot) = normalize_slot_index(slot) else {
                send_error(&mut guard, client_id, "unknown slot");
                return;
            };
            let entry = &mut guard.slots[slot];
            if let Some(enabled) = enabled {
                entry.enabled = enabled;
            }
            if let Some(control) = control {
                entry.control = control;
            }
            if let Some(color) = color {
                entry.color = color;
            }
            if let Some(left) = left {
                entry.keys.left = left;
            }
            if let Some(right) = right {
                entry.keys.right = right;
            }
            broadcast_lobby(&mut guard, None);
        }
        ParsedClientMessage::Start => handle_start(&mut guard, client_id),
        ParsedClientMessage::Key { key, pressed } => {
            if let Some(game) = guard.game.as_mut() {
                game.receive_key(&key, pressed);
            }
        }
    }
}

fn handle_hello(state: &mut ServerState, client_id: &str, name: &str) {
    let name = sanitize_name(name);
    let Some(client) = state.clients.get_mut(client_id) else {
        return;
    };
    client.name = Some(name.clone());
    tracing::info!(client_id, name = %name, "client joined");

    send_to_client(
        state,
        client_id,
        &json!({
            "type": "welcome",
            "clientId": client_id,
            "name": name,
        }),
        QueuePolicy::DisconnectOnFull,
    );
    broadcast_lobby(state, None);

    let snapshot = state
        .game
        .as_mut()
        .map(|game| game.build_snapshot(false));
    if let Some(snapshot) = snapshot {
        send_to_client(
            state,
            client_id,
            &json!({
                "type": "state",
                "snapshot": snapshot,
            }),
            QueuePolicy::DisconnectOnFull,
        );
    }
}

fn handle_start(state: &mut ServerState, client_id: &str) {
    if state.is_running() {
        send_error(state, client_id, "round is already running");
        return;
    }

    let roster = roster_from_slots(&state.slots);
    let seed = rand::random::<u32>();
    let mut game = match GameEngine::new(state.config.game_config(), roster, seed) {
        Ok(game) => game,
        Err(err) => {
            tracing::warn!(client_id, error = %err, "rejected round start");
            send_error(state, client_id, &err.to_string());
            return;
        }
    };
    game.start_round();
    tracing::info!(client_id, seed, "round requested");
    state.game = Some(game);
    broadcast_lobby(state, None);
}

fn broadcast_lobby(state: &mut ServerState, note: Option<String>) {
    let humans = state
        .slots
        .iter()
        .filter(|slot| slot.enabled && slot.control == ControlSource::Human)
        .count();
    let mut names: Vec<String> = state
        .clients
        .values()
        .filter_map(|client| client.name.clone())
        .collect();
    names.sort();

    let message = json!({
        "type": "lobby",
        "slots": state.slots,
        "clients": names,
        "humanCount": humans,
        "running": state.is_running(),
        "note": note,
    });
    broadcast(state, &message, QueuePolicy::DisconnectOnFull);
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_game(&mut guard);
        }
    });
}

fn tick_game(state: &mut ServerState) {
    let snapshot = {
        let Some(game) = state.game.as_mut() else {
            return;
        };
        game.step(TICK_MS);
        game.build_snapshot(true)
    };

    broadcast(
        state,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DropOnFull,
    );

    let summary = {
        let Some(game) = state.game.as_ref() else {
            return;
        };
        if game.is_ended() {
            Some(game.build_summary())
        } else {
            None
        }
    };

    if let Some(summary) = summary {
        let winner = summary
            .winner
            .as_ref()
            .map(|winner| winner.color.label())
            .unwrap_or("none");
        tracing::info!(winner, duration_ms = summary.duration_ms, "round over");
        broadcast(
            state,
            &json!({
                "type": "round_over",
                "summary": summary,
            }),
            QueuePolicy::DisconnectOnFull,
        );
        state.game = None;
        broadcast_lobby(state, Some("round over, ready to start again".to_string()));
    }
}

fn disconnect_client(state: &mut ServerState, client_id: &str) {
    let Some(context) = state.clients.remove(client_id) else {
        return;
    };
    tracing::debug!(client_id, "client disconnected");
    if context.name.is_some() {
        broadcast_lobby(state, None);
    }
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        close_slow_client(state, client_id);
    }
}

fn broadcast(state: &mut ServerState, message: &Value, policy: QueuePolicy) {
    let payload = message.to_string();
    let mut failed_clients = Vec::new();
    for (client_id, client) in &state.clients {
        if client.name.is_none() {
            continue;
        }
        if client
            .tx
            .try_send(OutboundMessage::Text(payload.clone()))
            .is_err()
            && policy == QueuePolicy::DisconnectOnFull
        {
            failed_clients.push(client_id.clone());
        }
    }
    for client_id in failed_clients {
        close_slow_client(state, &client_id);
    }
}

fn close_slow_client(state: &mut ServerState, client_id: &str) {
    let Some(client) = state.clients.remove(client_id) else {
        return;
    };
    tracing::warn!(client_id, "outbound queue full, closing client");
    let _ = client.tx.try_send(OutboundMessage::Close {
        code: 1013,
        reason: "outbound queue full".to_string(),
    });
}

fn send_error(state: &mut ServerState, client_id: &str, message: &str) {
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}
