use anyhow::anyhow;
use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::{
    chat::event::{SendMessage, ServerEvent},
    conversations, profiles, AppResult, AppState,
};

/// Resolves the peer's profile and the current thread, replying only to the
/// requesting connection.
pub(crate) async fn load_thread(
    db_pool: &SqlitePool,
    user_id: &str,
    peer_id: &str,
    out_tx: &mpsc::Sender<ServerEvent>,
) -> AppResult<()> {
    let profile = profiles::find_by_user_id(db_pool, peer_id).await?;
    let thread = conversations::find_between(db_pool, user_id, peer_id)
        .await?
        .map(|conversation| conversation.messages)
        .unwrap_or_default();

    let _ = out_tx.send(ServerEvent::PeerProfile(profile)).await;
    let _ = out_tx.send(ServerEvent::Thread(thread)).await;
    Ok(())
}

/// Persists the message and pushes the identical reloaded thread to both
/// participants' channels.
pub(crate) async fn send_message(state: &AppState, msg: SendMessage) -> AppResult<()> {
    if msg.sender_id.is_empty() || msg.receiver_id.is_empty() {
        return Err(anyhow!("message needs a sender and a receiver").into());
    }

    let thread = conversations::append_message(&state.db_pool, &msg).await?;

    // two targeted pushes rather than one shared room, so every open tab
    // of either participant gets the update
    state
        .presence
        .send_to_user(&msg.receiver_id, ServerEvent::Thread(thread.clone()));
    state
        .presence
        .send_to_user(&msg.sender_id, ServerEvent::Thread(thread));
    Ok(())
}
