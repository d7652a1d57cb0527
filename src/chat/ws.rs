use axum::{
    debug_handler,
    extract::{ws::WebSocket, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    chat::{
        event::{ClientEvent, ServerEvent},
        pipeline,
    },
    AppState,
};

const OUTBOUND_QUEUE: usize = 32;

#[derive(Deserialize)]
pub(crate) struct ConnectParams {
    user_id: Option<String>,
}

#[debug_handler]
pub(crate) async fn chat_ws(
    Query(ConnectParams { user_id }): Query<ConnectParams>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    // a connection that names no user would be invisible to presence and
    // unreachable for pushes, so it is turned away at the door
    let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing user_id").into_response();
    };

    ws.on_upgrade(move |stream| handle_connection(stream, state, user_id))
}

async fn handle_connection(stream: WebSocket, state: AppState, user_id: String) {
    let conn_id = Uuid::now_v7();
    info!(%conn_id, %user_id, "chat connection opened");

    let mut all_rx = state.tx.subscribe();
    let mut user_rx = state.presence.register(conn_id, &user_id);
    broadcast_online_users(&state);

    let (mut ws_sender, mut ws_receiver) = stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_QUEUE);

    // single writer: everything bound for this socket funnels through out_rx
    let send_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_sender.send(text.into()).await.is_err() {
                break;
            }
        }
    });

    let forward_tx = out_tx.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                event = all_rx.recv() => event,
                event = user_rx.recv() => event,
            };
            match event {
                Ok(event) => {
                    if forward_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%conn_id, skipped, "connection fell behind on pushes");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let Ok(event) = serde_json::from_slice::<ClientEvent>(&msg.into_data()) else {
            continue;
        };

        let result = match event {
            ClientEvent::RequestThread { peer_id } => {
                pipeline::load_thread(&state.db_pool, &user_id, &peer_id, &out_tx).await
            }
            ClientEvent::SendMessage(msg) => pipeline::send_message(&state, msg).await,
        };

        if let Err(err) = result {
            warn!(%conn_id, %user_id, "chat request failed: {}", err.0);
            let _ = out_tx
                .send(ServerEvent::Error {
                    message: err.0.to_string(),
                })
                .await;
        }
    }

    send_task.abort();
    forward_task.abort();
    state.presence.unregister(conn_id);
    broadcast_online_users(&state);
    info!(%conn_id, %user_id, "chat connection closed");
}

fn broadcast_online_users(state: &AppState) {
    let _ = state
        .tx
        .send(ServerEvent::OnlineUsers(state.presence.online_user_ids()));
}
