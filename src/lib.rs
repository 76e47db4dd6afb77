pub mod cli;
pub mod config;
pub mod handlers;
pub mod logs;
pub mod middleware;
pub mod portal;
pub mod session;
pub mod state;
pub mod tasks;

pub use config::ServerConfig;
pub use logs::{LogCategory, LogEntry, LogSink};
pub use middleware::access_log_middleware;
pub use state::AppContext;
pub use tasks::{TaskKind, TaskRunner, TaskState, TaskStatus};

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use handlers::{
    get_courses, get_lessons, get_logs, get_status, get_user_info, health_check, login, logout,
    progress_stream, start_task, stop_tasks,
};

/// Cookie text and task parameters are tiny; anything larger is rejected
const MAX_API_BODY_SIZE: usize = 64 * 1024;

/// Build the HTTP control surface around a shared context
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let cors_origins: Vec<HeaderValue> = ctx
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(cors_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/getUserInfo", get(get_user_info))
        .route("/api/getCourses", get(get_courses))
        .route("/api/getLessons", get(get_lessons))
        .route("/api/startTask", post(start_task))
        .route("/api/stop", post(stop_tasks))
        .route("/api/status", get(get_status))
        .route("/api/progress/stream", get(progress_stream))
        .route("/api/logs", get(get_logs))
        .layer(axum::middleware::from_fn_with_state(
            ctx.logs.clone(),
            access_log_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_API_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}
