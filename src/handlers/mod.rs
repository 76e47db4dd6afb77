mod auth;
mod courses;
mod health;
mod logs;
mod tasks;

pub use auth::*;
pub use courses::*;
pub use health::*;
pub use logs::*;
pub use tasks::*;

use axum::{http::StatusCode, Json};
use serde::Serialize;

use crate::session::SessionError;
use crate::tasks::StartError;

/// Outcome envelope shared by every control endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: String::new(),
            message: None,
        }
    }

    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok()
        }
    }
}

/// Error response: status code plus `{success: false, error, message}`
pub type ApiError = (StatusCode, Json<ApiResponse>);

fn failure(status: StatusCode, error: impl Into<String>, message: Option<String>) -> ApiError {
    (
        status,
        Json(ApiResponse {
            success: false,
            error: error.into(),
            message,
        }),
    )
}

/// Malformed body or query string, answered in the same envelope as domain errors
pub(crate) fn bad_request(detail: String) -> ApiError {
    failure(StatusCode::BAD_REQUEST, "InvalidRequest", Some(detail))
}

pub(crate) fn session_failure(err: SessionError) -> ApiError {
    let status = match &err {
        SessionError::Parse(_) => StatusCode::BAD_REQUEST,
        SessionError::Auth(_) | SessionError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        SessionError::Portal(_) => StatusCode::BAD_GATEWAY,
        SessionError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    failure(status, err.to_string(), None)
}

pub(crate) fn start_failure(err: StartError) -> ApiError {
    let status = match &err {
        StartError::AlreadyRunning => StatusCode::CONFLICT,
        StartError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        StartError::UnknownKind(_) | StartError::InvalidParams(_) => StatusCode::BAD_REQUEST,
    };
    failure(status, err.code(), Some(err.to_string()))
}
