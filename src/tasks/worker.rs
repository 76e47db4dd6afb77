use futures::FutureExt;
use rand::Rng;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::state::{RunTicket, TaskState};
use super::types::{BrainBurstParams, DurationSpec, RunnerConfig, TaskKind, TaskStatus};
use super::StartError;
use crate::logs::LogSink;
use crate::portal::CourseContext;

/// Failure inside a worker body. Caught by the supervisor, logged, and
/// surfaced only as the `error` status.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("{0}")]
    Failed(String),
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// How a worker body ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed,
    Cancelled,
}

/// A task body, resolved from a start request before any state changes
#[derive(Debug, Clone)]
pub enum Worker {
    /// Drives progress from 0 to `steps`, one step per `step_delay`
    BoundedProgress {
        unit_index: usize,
        steps: u64,
        step_delay: Duration,
    },
    /// Drives progress from 0 to `ticks`, one step per `tick`
    Duration {
        unit_index: usize,
        ticks: u64,
        tick: Duration,
    },
}

impl Worker {
    /// Build the worker for `kind`. A duration range is rolled here, once.
    pub fn from_request<R: Rng + ?Sized>(
        kind: TaskKind,
        unit_index: usize,
        params: &Value,
        config: &RunnerConfig,
        rng: &mut R,
    ) -> Result<Self, StartError> {
        match kind {
            TaskKind::BrainBurst => {
                let params: BrainBurstParams = if params.is_null() {
                    BrainBurstParams::default()
                } else {
                    serde_json::from_value(params.clone())
                        .map_err(|e| StartError::InvalidParams(e.to_string()))?
                };
                let steps = params.steps.unwrap_or(config.bounded_steps);
                if steps == 0 {
                    return Err(StartError::InvalidParams(
                        "steps must be at least 1".to_string(),
                    ));
                }
                Ok(Worker::BoundedProgress {
                    unit_index,
                    steps,
                    step_delay: config.bounded_step_delay,
                })
            }
            TaskKind::AwayFromKeyboard => {
                let spec: DurationSpec = serde_json::from_value(params.clone()).map_err(|_| {
                    StartError::InvalidParams(
                        "duration must be a number or a [min, max] pair".to_string(),
                    )
                })?;
                spec.validate()?;
                Ok(Worker::Duration {
                    unit_index,
                    ticks: spec.resolve(rng),
                    tick: config.duration_tick,
                })
            }
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Worker::BoundedProgress { .. } => TaskKind::BrainBurst,
            Worker::Duration { .. } => TaskKind::AwayFromKeyboard,
        }
    }

    /// Number of progress steps this worker will report
    pub fn total(&self) -> u64 {
        match self {
            Worker::BoundedProgress { steps, .. } => *steps,
            Worker::Duration { ticks, .. } => *ticks,
        }
    }

    /// Run to completion or cancellation
    pub async fn run(self, ctx: WorkerContext) -> Result<WorkerOutcome, WorkerError> {
        match self {
            Worker::BoundedProgress {
                unit_index,
                steps,
                step_delay,
            } => {
                ctx.log.system(format!(
                    "brain burst started: unit {}{}, {} steps",
                    unit_index,
                    ctx.course_suffix(),
                    steps
                ));
                ctx.step_through(steps, step_delay).await
            }
            Worker::Duration {
                unit_index,
                ticks,
                tick,
            } => {
                ctx.log.system(format!(
                    "away from keyboard started: unit {}{}, {} ticks of {:?}",
                    unit_index,
                    ctx.course_suffix(),
                    ticks,
                    tick
                ));
                ctx.step_through(ticks, tick).await
            }
        }
    }
}

/// Everything a worker may touch: its run ticket, the shared task state
/// and the journal. Session data arrives as a read-only snapshot.
#[derive(Clone)]
pub struct WorkerContext {
    pub(crate) state: Arc<TaskState>,
    pub(crate) ticket: RunTicket,
    pub(crate) log: LogSink,
    pub(crate) course: Option<CourseContext>,
}

impl WorkerContext {
    pub fn is_cancelled(&self) -> bool {
        self.ticket.token.is_cancelled()
    }

    fn course_suffix(&self) -> String {
        match &self.course {
            Some(course) => format!(" of course {}", course.cid),
            None => String::new(),
        }
    }

    /// Report `(current, total)`; `false` means this run was reset and must end
    pub fn report(&self, current: u64, total: u64) -> bool {
        self.state.report_progress(self.ticket.epoch, current, total)
    }

    /// Shared loop: the signal is checked at every step boundary and the
    /// sleep between steps is the only suspension point.
    async fn step_through(&self, total: u64, delay: Duration) -> Result<WorkerOutcome, WorkerError> {
        if !self.report(0, total) {
            return Ok(WorkerOutcome::Cancelled);
        }

        for step in 1..=total {
            if self.is_cancelled() {
                return Ok(WorkerOutcome::Cancelled);
            }

            tokio::select! {
                _ = self.ticket.token.cancelled() => return Ok(WorkerOutcome::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            if !self.report(step, total) {
                return Ok(WorkerOutcome::Cancelled);
            }
            debug!(step, total, "task progress");
        }

        Ok(WorkerOutcome::Completed)
    }
}

/// Drive a worker body and write its terminal status.
///
/// Errors and panics stay inside this task: they are logged and become the
/// `error` status. A cancelled body leaves status and progress untouched.
pub(crate) async fn supervise<F>(ctx: WorkerContext, kind: TaskKind, body: F)
where
    F: Future<Output = Result<WorkerOutcome, WorkerError>> + Send,
{
    let result = AssertUnwindSafe(body)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(WorkerError::Panicked(panic_message(panic.as_ref()))));

    let epoch = ctx.ticket.epoch;
    match result {
        Ok(WorkerOutcome::Completed) => {
            if ctx.state.finish(epoch, TaskStatus::Completed) {
                ctx.log.system(format!("{} task completed", kind));
            }
        }
        Ok(WorkerOutcome::Cancelled) => {
            let progress = ctx.state.progress();
            ctx.log.system(format!(
                "{} task cancelled at {}/{}",
                kind, progress.current, progress.total
            ));
        }
        Err(e) => {
            warn!("{} task failed: {}", kind, e);
            ctx.log.system(format!("{} task failed: {}", kind, e));
            ctx.state.finish(epoch, TaskStatus::Error);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
