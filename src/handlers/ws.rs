use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};

use crate::domain::Actor;
use crate::error::AppError;
use crate::services::realtime::Session;
use crate::AppState;

const HEARTBEAT_SECS: u64 = 30;
const MAX_ROOM_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Messages a client may send.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom { room: String },
    LeaveRoom { room: String },
}

/// WebSocket upgrade handler. The access token travels in the query string because browsers
/// cannot set headers on the upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("missing token".to_string()))?;
    let actor = state.auth.authenticate(&token).await.map_err(|err| {
        tracing::warn!("Invalid WebSocket authentication token");
        err
    })?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, actor)))
}

async fn handle_socket(socket: WebSocket, state: AppState, actor: Actor) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.hub.subscribe();
    let (commands, mut command_rx) = mpsc::channel::<ClientMessage>(16);
    let user_id = actor.user_id;

    tracing::info!(user_id, role = %actor.role, "WebSocket connected");

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(command) => {
                        if commands.send(command).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::debug!(user_id, error = %e, "Ignoring client message"),
                },
                Message::Close(_) => {
                    tracing::info!(user_id, "Client closed connection");
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        let mut session = Session::new(actor.user_id, actor.role);
        let mut heartbeat_interval =
            tokio::time::interval(tokio::time::Duration::from_secs(HEARTBEAT_SECS));

        let hello = json!({
            "event": "connected",
            "payload": { "userId": actor.user_id, "role": actor.role },
        });
        if sender.send(Message::Text(hello.to_string())).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = heartbeat_interval.tick() => {
                    if sender.send(Message::Ping(vec![])).await.is_err() {
                        tracing::info!(user_id, "Client disconnected during heartbeat");
                        break;
                    }
                }
                Some(command) = command_rx.recv() => {
                    let reply = apply(&mut session, command);
                    if sender.send(Message::Text(reply.to_string())).await.is_err() {
                        break;
                    }
                }
                result = rx.recv() => {
                    match result {
                        Ok(envelope) => {
                            if !session.reaches(&envelope.audience) {
                                continue;
                            }
                            let json = match serde_json::to_string(&envelope.frame()) {
                                Ok(j) => j,
                                Err(e) => {
                                    tracing::error!("Failed to serialize event: {}", e);
                                    continue;
                                }
                            };
                            if sender.send(Message::Text(json)).await.is_err() {
                                tracing::info!(user_id, "Client disconnected");
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(user_id, "Client lagged behind by {} events", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Real-time hub closed");
                            break;
                        }
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    tracing::info!(user_id, "WebSocket connection closed");
}

fn apply(session: &mut Session, command: ClientMessage) -> serde_json::Value {
    match command {
        ClientMessage::JoinRoom { room } => {
            let room = room.trim();
            if room.is_empty() || room.len() > MAX_ROOM_LEN {
                return json!({ "event": "error", "payload": { "message": "invalid room name" } });
            }
            session.join(room);
            json!({ "event": "room_joined", "payload": { "room": room } })
        }
        ClientMessage::LeaveRoom { room } => {
            let left = session.leave(room.trim());
            json!({ "event": "room_left", "payload": { "room": room.trim(), "wasMember": left } })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::Audience;
    use crate::domain::Role;

    #[test]
    fn parses_room_commands() {
        let join: ClientMessage =
            serde_json::from_str(r#"{"type":"join_room","room":"tx-42"}"#).unwrap();
        assert_eq!(join, ClientMessage::JoinRoom { room: "tx-42".into() });
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn joining_a_room_extends_reach() {
        let mut session = Session::new(5, Role::Agent);
        let room = Audience::Room("tx-42".into());
        assert!(!session.reaches(&room));

        let reply = apply(&mut session, ClientMessage::JoinRoom { room: " tx-42 ".into() });
        assert_eq!(reply["event"], "room_joined");
        assert!(session.reaches(&room));

        let reply = apply(&mut session, ClientMessage::LeaveRoom { room: "tx-42".into() });
        assert_eq!(reply["payload"]["wasMember"], true);
        assert!(!session.reaches(&room));
    }

    #[test]
    fn rejects_blank_room() {
        let mut session = Session::new(1, Role::Admin);
        let reply = apply(&mut session, ClientMessage::JoinRoom { room: "  ".into() });
        assert_eq!(reply["event"], "error");
    }
}
