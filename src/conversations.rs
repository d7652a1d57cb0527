use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{chat::event::SendMessage, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub updated_at: i64,
    pub messages: Vec<Message>,
}

// participants are stored directionally but the relationship is symmetric,
// so lookups go through the sorted pair
fn pair_key(user_a: &str, user_b: &str) -> String {
    if user_a <= user_b {
        format!("{user_a}:{user_b}")
    } else {
        format!("{user_b}:{user_a}")
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub async fn find_between(
    db_pool: &SqlitePool,
    user_a: &str,
    user_b: &str,
) -> AppResult<Option<Conversation>> {
    let Some((id, sender_id, receiver_id, updated_at)) =
        sqlx::query_as::<_, (String, String, String, i64)>(
            "SELECT id,sender_id,receiver_id,updated_at FROM conversations WHERE pair_key=?",
        )
        .bind(pair_key(user_a, user_b))
        .fetch_optional(db_pool)
        .await?
    else {
        return Ok(None);
    };

    let messages = thread_of(db_pool, &id).await?;
    Ok(Some(Conversation {
        id,
        sender_id,
        receiver_id,
        updated_at,
        messages,
    }))
}

/// Appends the message to the pair's conversation, creating it on first
/// contact, and returns the full reloaded thread.
pub async fn append_message(db_pool: &SqlitePool, msg: &SendMessage) -> AppResult<Vec<Message>> {
    let conversation_id = find_or_create(db_pool, &msg.sender_id, &msg.receiver_id).await?;
    let now = now_millis();

    sqlx::query(
        "INSERT INTO messages (id,conversation_id,sender_id,text,image_url,video_url,created_at)
         VALUES (?,?,?,?,?,?,?)",
    )
    .bind(Uuid::now_v7().to_string())
    .bind(&conversation_id)
    .bind(&msg.sender_id)
    .bind(msg.text.as_deref())
    .bind(msg.image_url.as_deref())
    .bind(msg.video_url.as_deref())
    .bind(now)
    .execute(db_pool)
    .await?;

    sqlx::query("UPDATE conversations SET updated_at=? WHERE id=?")
        .bind(now)
        .bind(&conversation_id)
        .execute(db_pool)
        .await?;

    thread_of(db_pool, &conversation_id).await
}

async fn find_or_create(
    db_pool: &SqlitePool,
    sender_id: &str,
    receiver_id: &str,
) -> AppResult<String> {
    let key = pair_key(sender_id, receiver_id);

    // the unique pair_key collapses the race between two simultaneous
    // first messages into a single conversation
    sqlx::query(
        "INSERT OR IGNORE INTO conversations (id,pair_key,sender_id,receiver_id,updated_at)
         VALUES (?,?,?,?,?)",
    )
    .bind(Uuid::now_v7().to_string())
    .bind(&key)
    .bind(sender_id)
    .bind(receiver_id)
    .bind(now_millis())
    .execute(db_pool)
    .await?;

    let (id,): (String,) = sqlx::query_as("SELECT id FROM conversations WHERE pair_key=?")
        .bind(&key)
        .fetch_one(db_pool)
        .await?;
    Ok(id)
}

async fn thread_of(db_pool: &SqlitePool, conversation_id: &str) -> AppResult<Vec<Message>> {
    // v7 ids are time-ordered, so they break created_at ties
    Ok(sqlx::query_as::<_, Message>(
        "SELECT id,sender_id,text,image_url,video_url,created_at
         FROM messages WHERE conversation_id=? ORDER BY created_at,id",
    )
    .bind(conversation_id)
    .fetch_all(db_pool)
    .await?)
}
