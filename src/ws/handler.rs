//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{RoomCommand, RoomHandle};
use crate::http::routes::AppError;
use crate::util::rate_limit::SessionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Replies addressed to this session only
const DIRECT_BUFFER: usize = 32;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Room to join; defaults to the first configured room
    pub room: Option<String>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("room {0} stopped accepting commands")]
    RoomClosed(String),
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let room_id = query
        .room
        .or_else(|| state.config.room_ids.first().cloned())
        .ok_or_else(|| AppError::NotFound("no rooms configured".to_string()))?;

    let room = state
        .rooms
        .get(&room_id)
        .ok_or_else(|| AppError::NotFound(format!("room {} does not exist", room_id)))?;

    info!(room_id = %room.id, "WebSocket upgrade");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, room)))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, room: RoomHandle) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, room_id = %room.id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        session_id,
        room_id: room.id.clone(),
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(session_id = %session_id, error = %e, "Failed to send welcome");
        return;
    }

    // Subscribe before asking for the setup so nothing falls between the two
    let event_rx = room.subscribe();
    let setup = match request_setup(&room).await {
        Ok(setup) => setup,
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to join room");
            return;
        }
    };
    if let Err(e) = send_msg(&mut ws_sink, &setup).await {
        debug!(session_id = %session_id, error = %e, "Failed to send setup");
        return;
    }

    let mut session = Session::new(session_id, room);
    run_session(&mut session, ws_sink, ws_stream, event_rx).await;
    session.close().await;

    info!(session_id = %session_id, "WebSocket connection closed");
}

async fn request_setup(room: &RoomHandle) -> Result<ServerMsg, SessionError> {
    let (reply, reply_rx) = oneshot::channel();
    room.command_tx
        .send(RoomCommand::Join { reply })
        .await
        .map_err(|_| SessionError::RoomClosed(room.id.clone()))?;
    reply_rx
        .await
        .map_err(|_| SessionError::RoomClosed(room.id.clone()))
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session: &mut Session,
    ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    event_rx: broadcast::Receiver<ServerMsg>,
) {
    let session_id = session.id;
    let rate_limiter = SessionRateLimiter::new();
    let (direct_tx, direct_rx) = mpsc::channel::<ServerMsg>(DIRECT_BUFFER);

    let writer_handle = tokio::spawn(write_loop(session_id, ws_sink, event_rx, direct_rx));

    // Reader loop: WebSocket -> room
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(session_id = %session_id, "Rate limited client message");
                    continue;
                }

                let reply = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => match session.handle(msg).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            debug!(session_id = %session_id, error = %e, "Room gone");
                            break;
                        }
                    },
                    Err(e) => {
                        debug!(
                            session_id = %session_id,
                            error = %e,
                            "Failed to parse client message"
                        );
                        Some(ServerMsg::Error {
                            code: "bad_message".to_string(),
                            message: e.to_string(),
                        })
                    }
                };

                if let Some(reply) = reply {
                    if direct_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Forward room broadcasts and direct replies to the socket
async fn write_loop(
    session_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut event_rx: broadcast::Receiver<ServerMsg>,
    mut direct_rx: mpsc::Receiver<ServerMsg>,
) {
    loop {
        let msg = tokio::select! {
            event = event_rx.recv() => match event {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Entities are full snapshots, so the next one resyncs the client
                    warn!(
                        session_id = %session_id,
                        lagged_count = n,
                        "Client lagged, skipping events"
                    );
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(session_id = %session_id, "Event channel closed");
                    break;
                }
            },
            direct = direct_rx.recv() => match direct {
                Some(msg) => msg,
                None => break,
            },
        };

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(session_id = %session_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// One client's view of a room: owns at most one player and speaks for it
pub struct Session {
    pub id: Uuid,
    room: RoomHandle,
    player_id: Option<Uuid>,
}

impl Session {
    pub fn new(id: Uuid, room: RoomHandle) -> Self {
        Self {
            id,
            room,
            player_id: None,
        }
    }

    /// Turn a client message into room commands. Returns the reply meant for
    /// this client alone, if any.
    pub async fn handle(&mut self, msg: ClientMsg) -> Result<Option<ServerMsg>, SessionError> {
        match msg {
            ClientMsg::SpawnPlayer { name } => {
                if self.player_id.is_some() {
                    debug!(session_id = %self.id, "Spawn rejected, session already has a player");
                    return Ok(Some(ServerMsg::PlayerSpawned { player_id: None }));
                }

                let (reply, reply_rx) = oneshot::channel();
                self.send(RoomCommand::Spawn { name, reply }).await?;
                let player_id = reply_rx
                    .await
                    .map_err(|_| SessionError::RoomClosed(self.room.id.clone()))?;
                self.player_id = player_id;
                Ok(Some(ServerMsg::PlayerSpawned { player_id }))
            }
            ClientMsg::DeletePlayer => {
                if let Some(player_id) = self.player_id.take() {
                    self.send(RoomCommand::Delete { player_id }).await?;
                }
                Ok(None)
            }
            ClientMsg::MoveKey { key, pressed } => {
                if let Some(player_id) = self.player_id {
                    self.send(RoomCommand::MoveKey {
                        player_id,
                        key,
                        pressed,
                    })
                    .await?;
                }
                Ok(None)
            }
            ClientMsg::Attack { target } => {
                if let Some(player_id) = self.player_id {
                    self.send(RoomCommand::Attack { player_id, target }).await?;
                }
                Ok(None)
            }
            ClientMsg::Ping { t } => Ok(Some(ServerMsg::Pong { t })),
        }
    }

    /// Release the session's player, if it still has one
    pub async fn close(&mut self) {
        if let Some(player_id) = self.player_id.take() {
            let _ = self.room.command_tx.send(RoomCommand::Delete { player_id }).await;
        }
    }

    async fn send(&self, command: RoomCommand) -> Result<(), SessionError> {
        self.room
            .command_tx
            .send(command)
            .await
            .map_err(|_| SessionError::RoomClosed(self.room.id.clone()))
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
