use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use hearth_types::events::{GatewayCommand, GatewayError, GatewayEvent};
use hearth_types::models::Identity;

use crate::error::ChatError;
use crate::service::ChatService;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle an authenticated WebSocket connection. The identity was bound at
/// the HTTP upgrade and stays fixed until the socket closes.
pub async fn handle_connection(socket: WebSocket, service: ChatService, identity: Identity) {
    let (mut sender, mut receiver) = socket.split();
    let dispatcher = service.dispatcher().clone();

    let (conn_id, mut direct_rx) = dispatcher.register(identity.clone()).await;
    info!(
        "{} ({}) connected to gateway [conn={}, online={}]",
        identity.username(),
        identity.user_id(),
        conn_id,
        dispatcher.connection_count().await
    );

    // Subscribe before Ready so nothing published after the handshake is missed
    let mut broadcast_rx = dispatcher.receiver();

    match serde_json::to_string(&GatewayEvent::Ready(identity.clone())) {
        Ok(ready) => {
            if sender.send(Message::Text(ready.into())).await.is_err() {
                dispatcher.unregister(conn_id).await;
                return;
            }
        }
        Err(e) => error!("Failed to serialize ready event: {}", e),
    }

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + direct replies -> client, with heartbeat
    let send_dispatcher = dispatcher.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let msg = match result {
                        Ok(msg) => msg,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Connection {} lagged by {} events", conn_id, n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if !send_dispatcher.delivers(conn_id, msg.topic).await {
                        continue;
                    }

                    if sender.send(Message::Text(msg.json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                result = direct_rx.recv() => {
                    let Some(event) = result else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to serialize {} event: {}", event.name(), e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection {}", missed_heartbeats, conn_id);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_service = service.clone();
    let recv_identity = identity.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let cmd = match serde_json::from_str::<GatewayCommand>(&text) {
                        Ok(cmd) => cmd,
                        Err(e) => {
                            warn!(
                                "{} ({}) bad command: {} -- raw: {}",
                                recv_identity.username(),
                                recv_identity.user_id(),
                                e,
                                text.chars().take(200).collect::<String>()
                            );
                            reject(&recv_service, conn_id, format!("malformed command: {}", e)).await;
                            continue;
                        }
                    };

                    // Handlers run on their own task: a disconnect aborts this
                    // loop but never a half-applied command. Awaiting the handle
                    // keeps one connection's commands in order.
                    let service = recv_service.clone();
                    let identity = recv_identity.clone();
                    let handler = tokio::spawn(async move {
                        handle_command(&service, conn_id, &identity, cmd).await;
                    });
                    if let Err(e) = handler.await {
                        error!("Command handler for connection {} panicked: {}", conn_id, e);
                    }
                }
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

    dispatcher.unregister(conn_id).await;
    info!(
        "{} ({}) disconnected from gateway [conn={}, online={}]",
        identity.username(),
        identity.user_id(),
        conn_id,
        dispatcher.connection_count().await
    );
}

/// Apply one inbound command as `identity`. Malformed input is answered on
/// this connection only; authorization failures stay silent; store failures
/// are logged and the command is dropped.
pub async fn handle_command(service: &ChatService, conn_id: Uuid, identity: &Identity, cmd: GatewayCommand) {
    let result = match cmd {
        GatewayCommand::Identify(claimed) => {
            debug!(
                "{} ({}) sent identify as {:?}; keeping the handshake identity",
                identity.username(),
                identity.user_id(),
                claimed.username
            );
            Ok(())
        }
        GatewayCommand::JoinChannel(join) => service.join_channel(conn_id, join).await,
        GatewayCommand::SendMessage(send) => service.send_message(identity, send).await.map(|_| ()),
        GatewayCommand::ToggleReaction(toggle) => service.toggle_reaction(identity, toggle).await.map(|_| ()),
        GatewayCommand::EditMessage(edit) => service.edit_message(identity, edit).await.map(|_| ()),
        GatewayCommand::DeleteMessage(delete) => service.delete_message(identity, delete).await.map(|_| ()),
    };

    match result {
        Ok(()) => {}
        Err(ChatError::InvalidInput(field)) => {
            debug!(
                "{} ({}) sent a command without {}",
                identity.username(),
                identity.user_id(),
                field
            );
            reject(service, conn_id, format!("missing or empty field: {}", field)).await;
        }
        Err(ChatError::StoreFailure(e)) => {
            error!(
                "Store failure handling command from {} ({}): {:#}",
                identity.username(),
                identity.user_id(),
                e
            );
        }
        Err(e) => {
            debug!("Command from {} ({}) dropped: {}", identity.username(), identity.user_id(), e);
        }
    }
}

async fn reject(service: &ChatService, conn_id: Uuid, message: String) {
    service
        .dispatcher()
        .send_to(
            conn_id,
            GatewayEvent::Error(GatewayError {
                code: "invalid_input".to_string(),
                message,
            }),
        )
        .await;
}
