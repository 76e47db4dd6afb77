use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{bad_request, session_failure, ApiError, ApiResponse};
use crate::portal::UserInfo;
use crate::state::AppContext;

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Raw `name=value; name=value` cookie text copied from the browser
    #[serde(default)]
    pub cookies: String,
}

/// Login endpoint
pub async fn login(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse>, ApiError> {
    let Json(request) = payload.map_err(|r| bad_request(r.body_text()))?;
    match ctx.session.login(&request.cookies).await {
        Ok(user) => {
            info!("session established for {:?}", user.username);
            Ok(Json(ApiResponse::ok_with_message(format!(
                "Login succeeded: welcome back, {} ({})",
                user.name.as_deref().unwrap_or("-"),
                user.student_id.as_deref().unwrap_or("-")
            ))))
        }
        Err(e) => {
            warn!("login failed: {}", e);
            Err(session_failure(e))
        }
    }
}

/// Logout endpoint: stops any task, then drops the session
pub async fn logout(State(ctx): State<Arc<AppContext>>) -> Json<ApiResponse> {
    ctx.runner.stop().await;
    ctx.session.reset();
    Json(ApiResponse::ok())
}

/// Profile of the logged-in account, all fields null when unavailable
pub async fn get_user_info(State(ctx): State<Arc<AppContext>>) -> Json<UserInfo> {
    Json(ctx.session.user_info().await)
}
