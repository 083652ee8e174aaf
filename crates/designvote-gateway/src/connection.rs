use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{info, trace, warn};
use uuid::Uuid;

use designvote_auth::validate_token;
use designvote_types::events::{GatewayCommand, GatewayEvent};

use crate::Gateway;
use crate::votes::handle_vote;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long an unauthenticated socket may stay open waiting for `identify`.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of one socket: `Connecting -> Open` or `Connecting -> Rejected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open { user_id: Uuid, username: String },
    Rejected,
}

impl ConnectionState {
    /// Present a token. Only `Connecting` moves; `Open` and `Rejected` stay put.
    pub fn identify(self, jwt_secret: &str, token: &str) -> Self {
        match self {
            ConnectionState::Connecting => match validate_token(jwt_secret, token) {
                Ok(claims) => ConnectionState::Open {
                    user_id: claims.sub,
                    username: claims.username,
                },
                Err(e) => {
                    trace!("Gateway token rejected: {}", e);
                    ConnectionState::Rejected
                }
            },
            other => other,
        }
    }

    /// Anything other than a valid identify while connecting is fatal.
    pub fn reject(self) -> Self {
        match self {
            ConnectionState::Connecting => ConnectionState::Rejected,
            other => other,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open { .. })
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// GET /gateway. A `?token=` is checked before upgrading; without one the
/// client must send `identify` as its first frame.
pub async fn ws_upgrade(
    State(gateway): State<Gateway>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let initial = match query.token.as_deref() {
        Some(token) => {
            let state = ConnectionState::Connecting.identify(&gateway.jwt_secret, token);
            if !state.is_open() {
                warn!("Rejected gateway upgrade with an invalid token");
                return StatusCode::UNAUTHORIZED.into_response();
            }
            state
        }
        None => ConnectionState::Connecting,
    };

    ws.on_upgrade(move |socket| handle_connection(socket, gateway, initial))
}

/// Handle a single WebSocket connection from upgrade to close.
pub async fn handle_connection(socket: WebSocket, gateway: Gateway, initial: ConnectionState) {
    let (mut sender, mut receiver) = socket.split();

    let state = match initial {
        ConnectionState::Connecting => wait_for_identify(&mut receiver, &gateway.jwt_secret).await,
        other => other,
    };

    let (user_id, username) = match state {
        ConnectionState::Open { user_id, username } => (user_id, username),
        _ => {
            warn!("Gateway client failed to identify, closing");
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: Utf8Bytes::from_static("unauthorized"),
                })))
                .await;
            return;
        }
    };

    info!("{} ({}) connected to gateway", username, user_id);

    run_connection_loop(sender, receiver, gateway, user_id, username).await;
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    gateway: Gateway,
    user_id: Uuid,
    username: String,
) {
    let dispatcher = gateway.dispatcher.clone();
    let (conn_id, mut conn_rx) = dispatcher.register_connection(user_id).await;
    let mut broadcast_rx = dispatcher.subscribe();
    info!(
        "{} opened connection {} ({} for this user, {} open)",
        username,
        conn_id,
        dispatcher.connections_for_user(user_id).await,
        dispatcher.connection_count().await
    );

    // Ready goes out only once this connection can see broadcasts
    let ready = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    let sent = match text_frame(&ready) {
        Some(frame) => sender.send(frame).await.is_ok(),
        None => false,
    };
    if !sent {
        dispatcher.unregister_connection(conn_id).await;
        return;
    }

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            let event = tokio::select! {
                result = broadcast_rx.recv() => match result {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Broadcast receiver lagged by {} messages", n);
                        continue;
                    }
                    Err(_) => break,
                },
                result = conn_rx.recv() => match result {
                    Some(event) => event,
                    None => break,
                },
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            if let Some(frame) = text_frame(&event) {
                if sender.send(frame).await.is_err() {
                    break;
                }
            }
        }
    });

    // Read commands from client
    let recv_gateway = gateway.clone();
    let recv_username = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&recv_gateway, conn_id, &recv_username, cmd).await,
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            recv_username,
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister_connection(conn_id).await;
    info!(
        "{} ({}) disconnected from gateway ({} open)",
        username,
        user_id,
        dispatcher.connection_count().await
    );
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>, jwt_secret: &str) -> ConnectionState {
    let handshake = async {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    return match serde_json::from_str::<GatewayCommand>(&text) {
                        Ok(GatewayCommand::Identify { token }) => {
                            ConnectionState::Connecting.identify(jwt_secret, &token)
                        }
                        _ => ConnectionState::Connecting.reject(),
                    };
                }
                Message::Ping(_) | Message::Pong(_) => continue,
                _ => break,
            }
        }
        ConnectionState::Connecting.reject()
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, handshake)
        .await
        .unwrap_or(ConnectionState::Rejected)
}

async fn handle_command(gateway: &Gateway, conn_id: Uuid, username: &str, cmd: GatewayCommand) {
    match cmd {
        GatewayCommand::Identify { .. } => {
            trace!("{} sent identify on an open connection, ignoring", username);
        }
        GatewayCommand::Vote { design_id } => {
            trace!("{} voting for {}", username, design_id);
            handle_vote(gateway, conn_id, &design_id).await;
        }
    }
}

fn text_frame(event: &GatewayEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            warn!("Failed to serialize gateway event: {}", e);
            None
        }
    }
}
