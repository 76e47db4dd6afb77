mod http;
mod types;

pub use http::{parse_course_context, parse_user_info, HttpPortal, PROFILE_MARKER};
pub use types::{CourseContext, CourseInfo, CourseUnits, UnitInfo, UserInfo};

use async_trait::async_trait;

use crate::session::Credentials;

/// Result type for portal operations
pub type PortalResult<T> = Result<T, PortalError>;

/// Errors talking to the remote course portal
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("Portal request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Portal returned HTTP {0}")]
    Status(u16),

    #[error("Unexpected portal response: {0}")]
    Parse(String),
}

/// Authenticated calls against the course portal
#[async_trait]
pub trait PortalClient: Send + Sync {
    /// Whether the portal accepts these cookies as a logged-in session
    async fn validate(&self, credentials: &Credentials) -> PortalResult<bool>;

    /// Profile of the logged-in account
    async fn user_info(&self, credentials: &Credentials) -> PortalResult<UserInfo>;

    /// Courses the account is enrolled in
    async fn courses(&self, credentials: &Credentials) -> PortalResult<Vec<CourseInfo>>;

    /// Units of course `cid` plus the identifiers found on its page
    async fn lessons(&self, credentials: &Credentials, cid: &str) -> PortalResult<CourseUnits>;
}
