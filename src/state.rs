use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::ServerConfig;
use crate::logs::LogSink;
use crate::portal::PortalClient;
use crate::session::{SessionFile, SessionStore};
use crate::tasks::{TaskRunner, TaskState};

/// Orchestration context shared across all handlers, built once per process
pub struct AppContext {
    pub config: ServerConfig,
    pub logs: LogSink,
    pub tasks: Arc<TaskState>,
    pub session: Arc<SessionStore>,
    pub runner: Arc<TaskRunner>,
    pub start_time: Instant,
    /// Cancelled once the server begins shutting down; ends long-lived streams
    pub shutdown: CancellationToken,
}

impl AppContext {
    pub fn new(config: ServerConfig, portal: Arc<dyn PortalClient>) -> Self {
        let logs = LogSink::new(config.log_buffer_capacity);
        let tasks = Arc::new(TaskState::new());
        let session = Arc::new(SessionStore::new(
            portal,
            config.session_config_path.clone(),
            Arc::clone(&tasks),
            logs.clone(),
        ));
        let runner = Arc::new(TaskRunner::new(
            Arc::clone(&tasks),
            Arc::clone(&session),
            logs.clone(),
            config.runner_config(),
        ));

        Self {
            config,
            logs,
            tasks,
            session,
            runner,
            start_time: Instant::now(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Try to log in again with the cookies persisted by an earlier run.
    /// Returns whether a session is active afterwards.
    pub async fn auto_login(&self) -> bool {
        let path = self.session.session_file();
        match SessionFile::load(path).await {
            Ok(Some(file)) if !file.cookies.trim().is_empty() => {
                self.logs.system("session file loaded, attempting automatic login");
                match self.session.restore(&file.cookies).await {
                    Ok(()) => {
                        self.logs.system("automatic login succeeded");
                        true
                    }
                    Err(e) => {
                        self.logs
                            .system(format!("automatic login failed, please update the cookies: {}", e));
                        false
                    }
                }
            }
            Ok(_) => {
                self.logs
                    .system(format!("no saved session found at {}", path.display()));
                false
            }
            Err(e) => {
                self.logs.system(format!("failed to load session file: {}", e));
                false
            }
        }
    }

    /// Stop the active task, then end every open event stream so
    /// graceful shutdown can drain the remaining connections
    pub async fn begin_shutdown(&self) {
        let summary = self.runner.stop().await;
        if summary.timed_out > 0 {
            warn!("{} worker(s) still running at shutdown", summary.timed_out);
        }
        self.shutdown.cancel();
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
