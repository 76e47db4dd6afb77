use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{bad_request, session_failure, ApiError};
use crate::portal::{CourseInfo, UnitInfo};
use crate::state::AppContext;

#[derive(Debug, Serialize)]
pub struct CoursesResponse {
    pub success: bool,
    pub error: String,
    pub courses: Vec<CourseInfo>,
}

#[derive(Debug, Deserialize)]
pub struct LessonsQuery {
    pub cid: String,
}

#[derive(Debug, Serialize)]
pub struct LessonsResponse {
    pub success: bool,
    pub error: String,
    pub lessons: Vec<UnitInfo>,
}

/// List enrolled courses
pub async fn get_courses(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<CoursesResponse>, ApiError> {
    let courses = ctx.session.courses().await.map_err(session_failure)?;
    Ok(Json(CoursesResponse {
        success: true,
        error: String::new(),
        courses,
    }))
}

/// List the units of one course
pub async fn get_lessons(
    State(ctx): State<Arc<AppContext>>,
    query: Result<Query<LessonsQuery>, QueryRejection>,
) -> Result<Json<LessonsResponse>, ApiError> {
    let Query(query) = query.map_err(|r| bad_request(r.body_text()))?;
    let lessons = ctx
        .session
        .lessons(&query.cid)
        .await
        .map_err(session_failure)?;
    Ok(Json(LessonsResponse {
        success: true,
        error: String::new(),
        lessons,
    }))
}
