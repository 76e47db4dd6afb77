use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::types::{Progress, StatusSnapshot, TaskEvent, TaskKind, TaskStatus};
use super::StartError;

/// Identity of one accepted task run.
///
/// Every reset bumps the epoch, so writes from a worker that outlived its
/// run are discarded instead of landing on a later task.
#[derive(Debug, Clone)]
pub struct RunTicket {
    pub epoch: u64,
    pub token: CancellationToken,
}

struct Inner {
    status: TaskStatus,
    progress: Progress,
    epoch: u64,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl Inner {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.status.is_running()
    }

    fn event(&self) -> TaskEvent {
        TaskEvent {
            status: self.status,
            progress: self.progress,
        }
    }
}

/// Shared record of status, progress, cancellation signal and active workers.
///
/// All four live behind one lock, which is never held across an await.
pub struct TaskState {
    inner: Mutex<Inner>,
    events: broadcast::Sender<TaskEvent>,
}

impl TaskState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Mutex::new(Inner {
                status: TaskStatus::NotAuthenticated,
                progress: Progress::default(),
                epoch: 0,
                cancel: CancellationToken::new(),
                workers: Vec::new(),
            }),
            events,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.inner.lock().status
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.inner.lock();
        StatusSnapshot {
            status: inner.status,
            progress: inner.progress,
            active_workers: inner.workers.iter().filter(|h| !h.is_finished()).count(),
        }
    }

    /// Subscribe to status and progress changes
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    fn publish(&self, inner: &Inner) {
        // No subscribers is fine
        let _ = self.events.send(inner.event());
    }

    /// Claim the idle slot for `kind` and register the worker `spawn` returns.
    ///
    /// The check, the transition and the registration happen under one lock,
    /// so two racing starts can never both succeed.
    pub(crate) fn launch<F>(&self, kind: TaskKind, spawn: F) -> Result<u64, StartError>
    where
        F: FnOnce(RunTicket) -> JoinHandle<()>,
    {
        let mut inner = self.inner.lock();
        match inner.status {
            TaskStatus::Idle => {}
            TaskStatus::NotAuthenticated => return Err(StartError::NotAuthenticated),
            _ => return Err(StartError::AlreadyRunning),
        }

        inner.epoch += 1;
        inner.cancel = CancellationToken::new();
        inner.progress = Progress::default();
        inner.status = TaskStatus::Running(kind);
        inner.workers.clear();

        let ticket = RunTicket {
            epoch: inner.epoch,
            token: inner.cancel.clone(),
        };
        let epoch = ticket.epoch;
        inner.workers.push(spawn(ticket));

        self.publish(&inner);
        Ok(epoch)
    }

    /// Record a progress step; returns `false` once the run is no longer current
    pub(crate) fn report_progress(&self, epoch: u64, current: u64, total: u64) -> bool {
        let mut inner = self.inner.lock();
        if !inner.is_current(epoch) {
            return false;
        }

        let next = Progress::new(current.min(total), total);
        if next.total == inner.progress.total && next.current < inner.progress.current {
            return true;
        }
        inner.progress = next;
        self.publish(&inner);
        true
    }

    /// Write the terminal status of a run; ignored if the run was reset meanwhile
    pub(crate) fn finish(&self, epoch: u64, status: TaskStatus) -> bool {
        debug_assert!(status.is_terminal());
        let mut inner = self.inner.lock();
        if !inner.is_current(epoch) {
            return false;
        }
        inner.status = status;
        self.publish(&inner);
        true
    }

    pub(crate) fn progress(&self) -> Progress {
        self.inner.lock().progress
    }

    /// Raise the cancellation signal and hand over the registered workers for joining
    pub(crate) fn begin_stop(&self) -> Vec<JoinHandle<()>> {
        let mut inner = self.inner.lock();
        inner.cancel.cancel();
        std::mem::take(&mut inner.workers)
    }

    /// Return to `idle` (or `not_authenticated`), clear progress and forget all workers
    pub fn reset(&self, authenticated: bool) {
        let mut inner = self.inner.lock();
        inner.cancel.cancel();
        inner.epoch += 1;
        inner.status = if authenticated {
            TaskStatus::Idle
        } else {
            TaskStatus::NotAuthenticated
        };
        inner.progress = Progress::default();
        // Dropping a handle detaches the task, it does not abort it
        inner.workers.clear();
        self.publish(&inner);
    }

    /// Leave `not_authenticated` after a successful login
    pub(crate) fn mark_authenticated(&self) {
        let mut inner = self.inner.lock();
        if inner.status == TaskStatus::NotAuthenticated {
            inner.status = TaskStatus::Idle;
            self.publish(&inner);
        }
    }

    /// Session revoked: signal the active worker and force `not_authenticated`.
    /// Registered workers stay listed so a later `stop` can still join them.
    pub(crate) fn force_not_authenticated(&self) {
        let mut inner = self.inner.lock();
        inner.cancel.cancel();
        inner.epoch += 1;
        inner.status = TaskStatus::NotAuthenticated;
        inner.progress = Progress::default();
        self.publish(&inner);
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::new()
    }
}
