use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::{RuntimeConfig, RuntimeConfigManager};
use crate::live::{BotController, BotState};
use crate::notifications::{Notification, NotificationManager};

/// Shared state for the read-only status/control surface. Out of core scope: the pipeline
/// runs whether or not anything is listening on this router.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<BotController>,
    pub notifications: Arc<NotificationManager>,
    pub config_manager: Arc<RuntimeConfigManager>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/notifications", get(notifications))
        .route("/config", get(get_config))
        .route("/control/pause", post(pause))
        .route("/control/resume", post(resume))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("web surface listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn status(State(state): State<AppState>) -> Json<BotState> {
    Json(state.controller.get_state().await)
}

async fn notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.notifications.get_recent(100).await)
}

async fn get_config(State(state): State<AppState>) -> Json<RuntimeConfig> {
    Json(state.config_manager.get_config().await)
}

async fn pause(State(state): State<AppState>) -> Result<StatusCode, (StatusCode, String)> {
    state.controller.pause().await.map_err(|e| (StatusCode::CONFLICT, e))?;
    state.notifications.notify(crate::notifications::AlertType::BotPaused).await;
    Ok(StatusCode::OK)
}

async fn resume(State(state): State<AppState>) -> Result<StatusCode, (StatusCode, String)> {
    state.controller.resume().await.map_err(|e| (StatusCode::CONFLICT, e))?;
    state.notifications.notify(crate::notifications::AlertType::BotResumed).await;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_route_responds() {
        let state = AppState {
            controller: Arc::new(BotController::new()),
            notifications: Arc::new(NotificationManager::new()),
            config_manager: Arc::new(RuntimeConfigManager::new(RuntimeConfig::default())),
        };
        let app = router(state);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
