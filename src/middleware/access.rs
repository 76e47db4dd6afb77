use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::logs::LogSink;

/// Render one access-log line:
/// `<ip> "<METHOD> <path>" <status> <latency>ms "<user agent>"`
pub fn format_access_line(
    ip: &str,
    method: &str,
    path: &str,
    status: u16,
    latency: Duration,
    user_agent: &str,
) -> String {
    format!(
        "{} \"{} {}\" {} {}ms \"{}\"",
        ip,
        method,
        path,
        status,
        latency.as_millis(),
        user_agent
    )
}

/// Records every HTTP request in the journal under the ACCESS category
pub async fn access_log_middleware(
    State(log): State<LogSink>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();

    // Absent when the router is driven without a listener (tests)
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(request).await;

    log.access(format_access_line(
        &ip,
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed(),
        &user_agent,
    ));

    response
}
