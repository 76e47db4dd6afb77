use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{bad_request, ApiError};
use crate::logs::LogEntry;
use crate::state::AppContext;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// Only the newest `limit` entries
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub success: bool,
    pub error: String,
    pub logs: Vec<LogEntry>,
}

/// In-memory journal, oldest entry first
pub async fn get_logs(
    State(ctx): State<Arc<AppContext>>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<LogsResponse>, ApiError> {
    let Query(query) = query.map_err(|r| bad_request(r.body_text()))?;
    Ok(Json(LogsResponse {
        success: true,
        error: String::new(),
        logs: ctx.logs.entries(query.limit),
    }))
}
