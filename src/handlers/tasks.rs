use axum::{
    extract::{rejection::JsonRejection, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::warn;

use super::{bad_request, start_failure, ApiError, ApiResponse};
use crate::state::AppContext;
use crate::tasks::{Progress, TaskStatus};

/// Request to start a task
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTaskRequest {
    /// `brain_burst` or `away_from_keyboard`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub unit_index: usize,
    #[serde(default)]
    pub params: Value,
}

/// Status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: TaskStatus,
    pub progress: Progress,
    pub active_threads: usize,
}

/// Start a task; returns as soon as the worker is spawned
pub async fn start_task(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<StartTaskRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, ApiError> {
    let Json(request) = payload.map_err(|r| bad_request(r.body_text()))?;
    ctx.runner
        .start(&request.kind, request.unit_index, &request.params)
        .map_err(|e| {
            warn!("start rejected: {}", e);
            start_failure(e)
        })?;
    Ok(Json(ApiResponse::ok()))
}

/// Stop the running task; always succeeds once the state has been reset
pub async fn stop_tasks(State(ctx): State<Arc<AppContext>>) -> Json<ApiResponse> {
    let summary = ctx.runner.stop().await;
    if summary.timed_out > 0 {
        Json(ApiResponse::ok_with_message(format!(
            "{} worker(s) did not exit in time; state was reset anyway",
            summary.timed_out
        )))
    } else {
        Json(ApiResponse::ok())
    }
}

/// Current status snapshot
pub async fn get_status(State(ctx): State<Arc<AppContext>>) -> Json<StatusResponse> {
    let snapshot = ctx.runner.status();
    Json(StatusResponse {
        status: snapshot.status,
        progress: snapshot.progress,
        active_threads: snapshot.active_workers,
    })
}

/// SSE endpoint for status and progress changes
pub async fn progress_stream(
    State(ctx): State<Arc<AppContext>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut receiver = ctx.tasks.subscribe();
    let initial = ctx.runner.status();
    let shutdown = ctx.shutdown.clone();

    let stream = async_stream::stream! {
        let data = serde_json::to_string(&initial).unwrap_or_default();
        yield Ok(Event::default().data(data).event("status"));

        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = receiver.recv() => received,
            };
            match received {
                Ok(event) => {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().data(data).event("progress"));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("SSE client lagged, missed {} events", n);
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
