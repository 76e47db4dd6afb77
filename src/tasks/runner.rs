use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::state::TaskState;
use super::types::{RunnerConfig, StatusSnapshot, TaskKind};
use super::worker::{supervise, Worker, WorkerContext};
use super::{StartError, StopError};
use crate::logs::LogSink;
use crate::session::SessionStore;

/// Result of a stop request
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StopSummary {
    /// Workers that exited within the join timeout
    pub joined: usize,
    /// Workers still running when the state was force-reset
    pub timed_out: usize,
}

/// Owns the worker lifecycle: single-flight start, cooperative stop, status.
pub struct TaskRunner {
    state: Arc<TaskState>,
    session: Arc<SessionStore>,
    log: LogSink,
    config: RunnerConfig,
    /// Serializes stop requests
    stop_lock: tokio::sync::Mutex<()>,
}

impl TaskRunner {
    pub fn new(
        state: Arc<TaskState>,
        session: Arc<SessionStore>,
        log: LogSink,
        config: RunnerConfig,
    ) -> Self {
        Self {
            state,
            session,
            log,
            config,
            stop_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Start a task of `kind` and return without waiting for it.
    ///
    /// Refused with `NotAuthenticated` without a session and with
    /// `AlreadyRunning` unless the slot is `idle`; requests are never queued
    /// and a running task is never preempted. Must be called inside a Tokio
    /// runtime.
    pub fn start(&self, kind: &str, unit_index: usize, params: &Value) -> Result<(), StartError> {
        let kind: TaskKind = kind.parse()?;

        if !self.session.is_authenticated() {
            return Err(StartError::NotAuthenticated);
        }

        let worker = Worker::from_request(
            kind,
            unit_index,
            params,
            &self.config,
            &mut rand::thread_rng(),
        )?;
        let total = worker.total();
        let course = self.session.course_context();

        let epoch = self.state.launch(kind, |ticket| {
            let ctx = WorkerContext {
                state: Arc::clone(&self.state),
                ticket,
                log: self.log.clone(),
                course,
            };
            tokio::spawn(supervise(ctx.clone(), kind, worker.run(ctx)))
        })?;

        info!(%kind, unit_index, total, epoch, "task started");
        self.log.system(format!(
            "started {} task for unit {} ({} steps)",
            kind, unit_index, total
        ));
        Ok(())
    }

    /// Signal cancellation, wait up to the join timeout for each worker,
    /// then reset the task state whether or not the workers exited.
    ///
    /// Cancellation is cooperative: a worker that ignores the signal keeps
    /// running after this returns, its later writes are discarded.
    pub async fn stop(&self) -> StopSummary {
        let _guard = self.stop_lock.lock().await;

        let handles = self.state.begin_stop();
        let mut summary = StopSummary::default();

        for mut handle in handles {
            match tokio::time::timeout(self.config.join_timeout, &mut handle).await {
                Ok(Ok(())) => summary.joined += 1,
                Ok(Err(e)) => {
                    let err = StopError::Join(e.to_string());
                    warn!("{}", err);
                    self.log.system(err.to_string());
                    summary.joined += 1;
                }
                Err(_) => {
                    let err = StopError::JoinTimeout(self.config.join_timeout);
                    warn!("{}", err);
                    self.log.system(err.to_string());
                    summary.timed_out += 1;
                }
            }
        }

        self.reset();
        info!(joined = summary.joined, timed_out = summary.timed_out, "tasks stopped");
        self.log.system("all tasks stopped");
        summary
    }

    /// Return the slot to `idle` (or `not_authenticated` without a session)
    pub fn reset(&self) {
        self.state.reset(self.session.has_credentials());
    }

    /// Non-blocking snapshot of status, progress and active worker count
    pub fn status(&self) -> StatusSnapshot {
        self.state.snapshot()
    }
}
