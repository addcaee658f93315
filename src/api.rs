// src/api.rs
use axum::{extract::State, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::scheduler::{ArchiverTask, TaskStatus};

#[derive(Clone)]
pub struct AppState {
    pub task: ArchiverTask,
}

/// Routes: `/health`, `/status`, and `/metrics` when a recorder handle is given.
pub fn router(task: ArchiverTask, metrics: Option<PrometheusHandle>) -> Router {
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/status", get(status))
        .with_state(AppState { task });

    match metrics {
        Some(handle) => app.merge(crate::metrics::Metrics { handle }.router()),
        None => app,
    }
}

async fn status(State(state): State<AppState>) -> Json<TaskStatus> {
    Json(state.task.status())
}
