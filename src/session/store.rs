use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::cookies::{Credentials, ParseError};
use super::file::{SessionFile, SessionFileError};
use crate::logs::LogSink;
use crate::portal::{CourseContext, CourseInfo, PortalClient, PortalError, UnitInfo, UserInfo};
use crate::tasks::{TaskState, TaskStatus};

/// The portal refused the cookies or could not be asked
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Cookie validation failed")]
    Rejected,
    #[error("Cookie validation failed: {0}")]
    Unavailable(String),
}

/// Errors surfaced by session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Please log in first")]
    NotAuthenticated,
    #[error("Failed to persist session: {0}")]
    Persist(#[from] SessionFileError),
    #[error(transparent)]
    Portal(#[from] PortalError),
}

/// Holds the validated portal cookies and the course last opened.
///
/// Only `login`, `restore` and `reset` mutate it; workers read snapshots.
pub struct SessionStore {
    credentials: RwLock<Option<Credentials>>,
    course: RwLock<Option<CourseContext>>,
    portal: Arc<dyn PortalClient>,
    session_file: PathBuf,
    tasks: Arc<TaskState>,
    log: LogSink,
    /// One login at a time, so validation, persistence and swap stay paired
    login_lock: tokio::sync::Mutex<()>,
}

impl SessionStore {
    pub fn new(
        portal: Arc<dyn PortalClient>,
        session_file: impl Into<PathBuf>,
        tasks: Arc<TaskState>,
        log: LogSink,
    ) -> Self {
        Self {
            credentials: RwLock::new(None),
            course: RwLock::new(None),
            portal,
            session_file: session_file.into(),
            tasks,
            log,
            login_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn session_file(&self) -> &Path {
        &self.session_file
    }

    pub fn portal(&self) -> &Arc<dyn PortalClient> {
        &self.portal
    }

    /// Parse, validate remotely, persist, then swap in the new cookies.
    ///
    /// Any failure leaves the stored session and the session file untouched.
    /// The profile is fetched after the swap; failing to read it yields an
    /// all-empty `UserInfo`, not a login failure.
    pub async fn login(&self, raw_cookie_text: &str) -> Result<UserInfo, SessionError> {
        let credentials = Credentials::parse(raw_cookie_text)?;
        let _guard = self.login_lock.lock().await;

        self.validate(&credentials).await?;
        SessionFile::new(raw_cookie_text.trim())
            .save(&self.session_file)
            .await?;
        self.install(credentials.clone());

        let user = self.fetch_user_info(&credentials).await;
        info!(user = ?user.name, "login succeeded");
        self.log.system(format!(
            "login succeeded: {} ({})",
            user.name.as_deref().unwrap_or("-"),
            user.student_id.as_deref().unwrap_or("-")
        ));
        Ok(user)
    }

    /// Re-login from persisted cookie text at startup; does not rewrite the file
    pub async fn restore(&self, raw_cookie_text: &str) -> Result<(), SessionError> {
        let credentials = Credentials::parse(raw_cookie_text)?;
        let _guard = self.login_lock.lock().await;

        self.validate(&credentials).await?;
        self.install(credentials);
        Ok(())
    }

    async fn validate(&self, credentials: &Credentials) -> Result<(), AuthError> {
        match self.portal.validate(credentials).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!("portal rejected cookies");
                Err(AuthError::Rejected)
            }
            Err(e) => {
                self.log.system(format!("cookie validation failed: {}", e));
                Err(AuthError::Unavailable(e.to_string()))
            }
        }
    }

    fn install(&self, credentials: Credentials) {
        *self.credentials.write() = Some(credentials);
        *self.course.write() = None;
        self.tasks.mark_authenticated();
    }

    /// Cookies are set and the task slot is not `not_authenticated`
    pub fn is_authenticated(&self) -> bool {
        self.has_credentials() && self.tasks.status() != TaskStatus::NotAuthenticated
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.read().is_some()
    }

    /// Snapshot of the current cookies
    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.read().clone()
    }

    fn require_credentials(&self) -> Result<Credentials, SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        self.credentials().ok_or(SessionError::NotAuthenticated)
    }

    /// Course recorded by the last successful `lessons` call
    pub fn course_context(&self) -> Option<CourseContext> {
        self.course.read().clone()
    }

    /// Drop the session and force the task slot to `not_authenticated`
    pub fn reset(&self) {
        *self.credentials.write() = None;
        *self.course.write() = None;
        self.tasks.force_not_authenticated();
        self.log.system("session cleared");
    }

    pub async fn user_info(&self) -> UserInfo {
        match self.credentials() {
            Some(credentials) => self.fetch_user_info(&credentials).await,
            None => UserInfo::default(),
        }
    }

    async fn fetch_user_info(&self, credentials: &Credentials) -> UserInfo {
        match self.portal.user_info(credentials).await {
            Ok(user) => user,
            Err(e) => {
                self.log.system(format!("failed to read user info: {}", e));
                UserInfo::default()
            }
        }
    }

    pub async fn courses(&self) -> Result<Vec<CourseInfo>, SessionError> {
        let credentials = self.require_credentials()?;
        Ok(self.portal.courses(&credentials).await?)
    }

    /// Units of course `cid`; remembers the course for later tasks
    pub async fn lessons(&self, cid: &str) -> Result<Vec<UnitInfo>, SessionError> {
        let credentials = self.require_credentials()?;
        self.log.system(format!("fetching units of course {}", cid));

        let course = self.portal.lessons(&credentials, cid).await?;
        *self.course.write() = Some(course.context);
        Ok(course.units)
    }
}
