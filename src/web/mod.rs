pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use rusqlite::Connection;
use tokio::sync::{Mutex, broadcast};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::error::{Result, WrittenError};
use crate::llm::Generator;
use crate::taiga::TaigaClient;

/// State shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Arc<Mutex<Connection>>,
    pub generator: Arc<Generator>,
    pub taiga: Arc<TaigaClient>,
}

pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/health", get(handlers::health))
        .route("/api/generate-activity", post(handlers::generate_activity))
        .route("/api/generate-task", post(handlers::generate_task))
        .route("/api/submit-activity", post(handlers::submit_activity))
        .route("/api/projects", get(handlers::get_projects))
        .route("/api/taiga-activities", get(handlers::get_taiga_activities))
        .route("/api/user-positions", get(handlers::get_user_positions))
        .route("/api/set-user-position", post(handlers::set_user_position))
        .route("/api/add-position", post(handlers::add_position))
        .route("/api/current-user", get(handlers::get_current_user))
        .route("/api/activities", get(handlers::get_activities))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let bind = state.config.server_bind.clone();
    let app = build(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| WrittenError::Config(format!("failed to bind {bind}: {e}")))?;

    info!(bind = %bind, "web server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(|e| WrittenError::Config(format!("web server error: {e}")))?;

    Ok(())
}
