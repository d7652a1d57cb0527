use std::sync::Arc;

use axum::{debug_handler, extract::State, response::IntoResponse, routing::get, Json, Router};
use nestlink::{chat, db, presence::Presence, AppResult, AppState};
use serde_json::json;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nestlink=info".into()),
        )
        .init();

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(dotenv::var("DATABASE_URL").unwrap().as_str())
        .await
        .unwrap();
    db::init(&db_pool).await.unwrap();

    let app_state = AppState {
        db_pool,
        presence: Arc::new(Presence::new()),
        tx: broadcast::channel(64).0,
    };

    let app = Router::new()
        .route("/health", get(health))
        .nest("/chat", chat::router())
        .with_state(app_state)
        .layer(CorsLayer::permissive());

    let addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:4000".to_owned());
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    tracing::info!("listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}

#[debug_handler(state = AppState)]
async fn health(State(db_pool): State<SqlitePool>) -> AppResult<impl IntoResponse> {
    sqlx::query("SELECT 1").execute(&db_pool).await?;
    Ok(Json(json!({ "message": "health OK!" })))
}
