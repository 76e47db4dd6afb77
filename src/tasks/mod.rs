mod runner;
mod state;
mod types;
mod worker;

pub use runner::{StopSummary, TaskRunner};
pub use state::{RunTicket, TaskState};
pub use types::{
    BrainBurstParams, DurationSpec, Progress, RunnerConfig, StatusSnapshot, TaskEvent, TaskKind,
    TaskStatus,
};
pub use worker::{Worker, WorkerContext, WorkerError, WorkerOutcome};

use std::time::Duration;

/// Reasons a start request is refused. A refused start never touches task state.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("A task is already in progress")]
    AlreadyRunning,
    #[error("Please log in first")]
    NotAuthenticated,
    #[error("Unknown task type: {0}")]
    UnknownKind(String),
    #[error("Invalid task parameters: {0}")]
    InvalidParams(String),
}

impl StartError {
    /// Stable code reported in the `error` field of API responses
    pub fn code(&self) -> &'static str {
        match self {
            StartError::AlreadyRunning => "AlreadyRunning",
            StartError::NotAuthenticated => "NotAuthenticated",
            StartError::UnknownKind(_) => "UnknownKind",
            StartError::InvalidParams(_) => "InvalidParams",
        }
    }
}

/// Problems met while stopping. Logged only; the forced reset happens anyway.
#[derive(Debug, thiserror::Error)]
pub enum StopError {
    #[error("worker did not exit within {0:?}, state reset anyway")]
    JoinTimeout(Duration),
    #[error("worker ended abnormally: {0}")]
    Join(String),
}
