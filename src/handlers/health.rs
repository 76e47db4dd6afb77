use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppContext;
use crate::tasks::TaskStatus;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub authenticated: bool,
    pub task_status: TaskStatus,
    pub uptime_seconds: u64,
}

/// Health check endpoint
pub async fn health_check(
    State(ctx): State<Arc<AppContext>>,
) -> (StatusCode, Json<HealthResponse>) {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        authenticated: ctx.session.is_authenticated(),
        task_status: ctx.tasks.status(),
        uptime_seconds: ctx.uptime_seconds(),
    };

    (StatusCode::OK, Json(response))
}
