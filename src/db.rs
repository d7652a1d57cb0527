use sqlx::SqlitePool;

use crate::AppResult;

// profiles is owned by the rest of the marketplace; the chat service only
// ever reads it. pair_key is the sorted participant pair, so one
// conversation per unordered pair survives concurrent first messages.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS profiles (
    user_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    location TEXT,
    bio TEXT,
    image TEXT
);

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    pair_key TEXT NOT NULL UNIQUE,
    sender_id TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id),
    sender_id TEXT NOT NULL,
    text TEXT,
    image_url TEXT,
    video_url TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(conversation_id, created_at);
";

pub async fn init(db_pool: &SqlitePool) -> AppResult<()> {
    sqlx::raw_sql(SCHEMA).execute(db_pool).await?;
    Ok(())
}
