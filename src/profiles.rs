use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::AppResult;

// owned by the marketplace's profile service; read-only here
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub user_id: String,
    pub title: String,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

pub async fn find_by_user_id(db_pool: &SqlitePool, user_id: &str) -> AppResult<Option<Profile>> {
    Ok(
        sqlx::query_as::<_, Profile>(
            "SELECT user_id,title,location,bio,image FROM profiles WHERE user_id=?",
        )
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?,
    )
}
