use std::collections::{BTreeMap, HashMap};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::{Clock, MonotonicClock};
use crate::constants::{MAX_LINE_BYTES, OUTBOUND_QUEUE_CAPACITY};
use crate::engine::GameEngine;
use crate::error::ServerError;
use crate::server_protocol::{parse_client_message, ParsedClientMessage};
use crate::server_utils::{floor_occupancy, sanitize_name};
use crate::types::ServerMessage;

pub type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

impl QueuePolicy {
    /// Snapshots and attack visuals are superseded by the next tick; losing
    /// anything else would leave the client out of sync.
    fn for_message(message: &ServerMessage) -> Self {
        match message {
            ServerMessage::State { .. } | ServerMessage::Attack(_) => Self::DropOnFull,
            _ => Self::DisconnectOnFull,
        }
    }
}

struct Session {
    tx: mpsc::Sender<String>,
    kick: Arc<Notify>,
}

pub struct ServerState {
    pub engine: GameEngine,
    sessions: HashMap<u32, Session>,
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
    started_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub tick: Duration,
    pub http_port: Option<u16>,
    pub seed: u32,
}

impl ServerState {
    pub fn new(engine: GameEngine, clock: Arc<dyn Clock>) -> Self {
        let started_ms = clock.now_ms();
        Self {
            engine,
            sessions: HashMap::new(),
            clock,
            started_at: Utc::now(),
            started_ms,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Hands every pending engine message to the sessions it addresses.
    /// Never waits: a full queue either drops the message or kicks the
    /// session, depending on the message.
    fn flush(&mut self) {
        loop {
            let outbound = self.engine.drain_outbox();
            if outbound.is_empty() {
                return;
            }
            let mut overflowed = Vec::new();
            for out in outbound {
                let policy = QueuePolicy::for_message(&out.message);
                let payload = match encode(&out.message) {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping unencodable message");
                        continue;
                    }
                };
                for id in self.engine.recipients(out.audience) {
                    let Some(session) = self.sessions.get(&id) else {
                        continue;
                    };
                    if session.tx.try_send(payload.clone()).is_err()
                        && policy == QueuePolicy::DisconnectOnFull
                    {
                        overflowed.push(id);
                    }
                }
            }
            for id in overflowed {
                if let Some(session) = self.sessions.remove(&id) {
                    tracing::warn!(player_id = id, "outbound queue full, kicking session");
                    session.kick.notify_one();
                    let now = self.now_ms();
                    self.engine.remove_player(id, now);
                }
            }
        }
    }

    fn disconnect(&mut self, player_id: u32) {
        if self.sessions.remove(&player_id).is_none() {
            return;
        }
        let now = self.now_ms();
        self.engine.remove_player(player_id, now);
        self.flush();
    }
}

fn encode(message: &ServerMessage) -> Result<String, ServerError> {
    let mut payload = serde_json::to_string(message)?;
    payload.push('\n');
    Ok(payload)
}

/// Reads one newline-terminated line of at most `MAX_LINE_BYTES`. A final
/// line without a newline is still returned; `None` means the peer closed.
async fn read_line<R>(reader: &mut R) -> Result<Option<String>, ServerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(MAX_LINE_BYTES as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if read == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > MAX_LINE_BYTES {
        return Err(ServerError::LineTooLong {
            limit: MAX_LINE_BYTES,
        });
    }
    let line = String::from_utf8(buf)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    Ok(Some(line))
}

pub fn shared_state(engine: GameEngine, clock: Arc<dyn Clock>) -> SharedState {
    Arc::new(Mutex::new(ServerState::new(engine, clock)))
}

pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let listener = TcpListener::bind(config.addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.addr,
            source,
        })?;
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let state = shared_state(GameEngine::new(config.seed), clock);
    start_tick_loop(state.clone(), config.tick);

    if let Some(port) = config.http_port {
        let addr = SocketAddr::new(config.addr.ip(), port);
        let http = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        tracing::info!(%addr, "status endpoint listening");
        let app = status_router(state.clone());
        tokio::spawn(async move {
            if let Err(err) = axum::serve(http, app).await {
                tracing::error!(error = %err, "status endpoint stopped");
            }
        });
    }

    tracing::info!(addr = %config.addr, seed = config.seed, "game server listening");
    serve(listener, state).await
}

/// Accept loop. A failed accept is logged and the loop keeps going.
pub async fn serve(listener: TcpListener, state: SharedState) -> Result<(), ServerError> {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let state = state.clone();
                tokio::spawn(async move {
                    handle_connection(state, stream, peer).await;
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "accept failed");
            }
        }
    }
}

async fn handle_connection(state: SharedState, stream: TcpStream, peer: SocketAddr) {
    if let Err(err) = stream.set_nodelay(true) {
        tracing::debug!(%peer, error = %err, "set_nodelay failed");
    }
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let hello = match read_line(&mut reader).await {
        Ok(Some(line)) => parse_client_message(&line),
        Ok(None) => return,
        Err(err) => {
            tracing::warn!(%peer, error = %err, "read failed before handshake");
            return;
        }
    };
    let Some(ParsedClientMessage::Hello { name, class }) = hello else {
        tracing::warn!(%peer, "handshake rejected");
        return;
    };

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);
    let kick = Arc::new(Notify::new());
    let player_id = {
        let mut guard = state.lock().await;
        let now = guard.now_ms();
        let id = guard.engine.add_player(sanitize_name(&name), class, now);
        guard.sessions.insert(
            id,
            Session {
                tx,
                kick: kick.clone(),
            },
        );
        guard.flush();
        id
    };
    tracing::info!(player_id, %peer, "session started");

    let writer_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if writer.write_all(payload.as_bytes()).await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    loop {
        let line = tokio::select! {
            _ = kick.notified() => break,
            line = read_line(&mut reader) => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err @ ServerError::LineTooLong { .. }) => {
                tracing::warn!(
                    player_id,
                    %peer,
                    error = %err,
                    "protocol error, dropping connection"
                );
                break;
            }
            Err(err) => {
                tracing::debug!(player_id, error = %err, "read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let Some(ParsedClientMessage::Command(command)) = parse_client_message(&line) else {
            tracing::warn!(player_id, %peer, "protocol error, dropping connection");
            break;
        };
        let mut guard = state.lock().await;
        let now = guard.now_ms();
        guard.engine.handle_command(player_id, command, now);
        guard.flush();
    }

    state.lock().await.disconnect(player_id);
    tracing::info!(player_id, %peer, "session closed");
    let _ = writer_task.await;
}

pub fn start_tick_loop(state: SharedState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            let now = guard.now_ms();
            guard.engine.step(now);
            guard.flush();
        }
    })
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub started_at: String,
    pub uptime_seconds: u64,
    pub players: usize,
    pub floors: BTreeMap<u8, usize>,
}

pub fn status_router(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status", get(status_handler))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn status_handler(State(state): State<SharedState>) -> Json<StatusReport> {
    let guard = state.lock().await;
    Json(status_report(&guard))
}

fn status_report(state: &ServerState) -> StatusReport {
    StatusReport {
        started_at: state.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        uptime_seconds: state.now_ms().saturating_sub(state.started_ms) / 1000,
        players: state.engine.world.players.len(),
        floors: floor_occupancy(&state.engine.world),
    }
}
