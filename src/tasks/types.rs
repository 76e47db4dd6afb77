use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::StartError;

/// Kind of background study task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Bounded-progress task: a fixed number of steps known up front
    BrainBurst,
    /// Duration task: one step per elapsed tick
    AwayFromKeyboard,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::BrainBurst => "brain_burst",
            TaskKind::AwayFromKeyboard => "away_from_keyboard",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = StartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brain_burst" => Ok(TaskKind::BrainBurst),
            "away_from_keyboard" => Ok(TaskKind::AwayFromKeyboard),
            other => Err(StartError::UnknownKind(other.to_string())),
        }
    }
}

/// Lifecycle status of the task slot.
///
/// `idle -> running(kind) -> completed | error`, with `not_authenticated`
/// as the initial state and the state forced by a session reset. Terminal
/// states only go back to `idle` through an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Idle,
    Running(TaskKind),
    Completed,
    Error,
    NotAuthenticated,
}

impl TaskStatus {
    /// Wire label; a running task reports its kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Idle => "idle",
            TaskStatus::Running(kind) => kind.as_str(),
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
            TaskStatus::NotAuthenticated => "not_authenticated",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, TaskStatus::Running(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Progress of the current task as `(current, total)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
}

impl Progress {
    pub fn new(current: u64, total: u64) -> Self {
        Self { current, total }
    }
}

/// Read-only view of the task slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub status: TaskStatus,
    pub progress: Progress,
    pub active_workers: usize,
}

/// Change notification published on every transition and progress step
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TaskEvent {
    pub status: TaskStatus,
    pub progress: Progress,
}

/// Duration of an away-from-keyboard task: a fixed tick count or an
/// inclusive `[min, max]` range resolved once when the task starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    Fixed(u64),
    Range(u64, u64),
}

impl DurationSpec {
    pub fn validate(&self) -> Result<(), StartError> {
        match *self {
            DurationSpec::Range(min, max) if min > max => Err(StartError::InvalidParams(format!(
                "duration range minimum {} exceeds maximum {}",
                min, max
            ))),
            _ => Ok(()),
        }
    }

    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match *self {
            DurationSpec::Fixed(ticks) => ticks,
            DurationSpec::Range(min, max) => rng.gen_range(min..=max),
        }
    }
}

/// Parameters accepted by a brain-burst task
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrainBurstParams {
    pub steps: Option<u64>,
}

/// Task timing policy
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Steps of a brain-burst task when the request names none
    pub bounded_steps: u64,
    /// Delay between two brain-burst steps
    pub bounded_step_delay: Duration,
    /// Length of one away-from-keyboard tick
    pub duration_tick: Duration,
    /// Per-worker wait inside `stop` before the forced reset
    pub join_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            bounded_steps: 100,
            bounded_step_delay: Duration::from_millis(100),
            duration_tick: Duration::from_secs(1),
            join_timeout: Duration::from_secs(5),
        }
    }
}
