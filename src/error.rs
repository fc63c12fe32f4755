use thiserror::Error;

use crate::core::{TaskId, TaskStatus, UserId};
use crate::invariants::Violation;

/// Broad category of an error, used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing or insufficient credentials. The caller can re-authenticate
    /// or pick a task they own.
    Authorization,
    /// A business rule rejected the request. Surfaced verbatim, never retried.
    Precondition,
    /// A postcondition check failed after an accepted mutation.
    InvariantViolation,
    /// Configuration, I/O, or counter faults.
    Internal,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("User {user} does not have access to task {task}")]
    NotOwner { task: TaskId, user: UserId },

    #[error("User {0} already has an active session")]
    SessionExists(UserId),

    #[error("No current session for user {0}")]
    NoSession(UserId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("User already exists: {0}")]
    UserExists(UserId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Cannot start task {task}: dependency {dependency} is not completed")]
    DependencyIncomplete { task: TaskId, dependency: TaskId },

    #[error("Dependency task {0} does not exist")]
    DependencyNotFound(TaskId),

    #[error("Cannot depend on cancelled task {0}")]
    DependencyCancelled(TaskId),

    #[error("Cyclic dependency detected: {}", format_path(.path))]
    CycleDetected { path: Vec<TaskId> },

    #[error("Maximum number of tasks ({max}) reached")]
    CapacityExceeded { max: usize },

    #[error("Task {task} is {status}; only completed or cancelled tasks can be deleted")]
    NotTerminal { task: TaskId, status: TaskStatus },

    #[error("Cannot delete task {task}: {} task(s) depend on it", .dependents.len())]
    HasDependents { task: TaskId, dependents: Vec<TaskId> },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(Violation),
}

impl Error {
    /// Classify this error into one of the caller-facing categories.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::NotAuthenticated
            | Error::NotOwner { .. }
            | Error::SessionExists(_)
            | Error::NoSession(_)
            | Error::UserNotFound(_) => ErrorClass::Authorization,
            Error::UserExists(_)
            | Error::TaskNotFound(_)
            | Error::InvalidTransition { .. }
            | Error::DependencyIncomplete { .. }
            | Error::DependencyNotFound(_)
            | Error::DependencyCancelled(_)
            | Error::CycleDetected { .. }
            | Error::CapacityExceeded { .. }
            | Error::NotTerminal { .. }
            | Error::HasDependents { .. }
            | Error::Validation(_) => ErrorClass::Precondition,
            Error::InvariantViolation(_) => ErrorClass::InvariantViolation,
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::NoHomeDir
            | Error::Internal(_) => ErrorClass::Internal,
        }
    }
}

fn format_path(path: &[TaskId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, Error>;
