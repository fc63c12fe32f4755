//! Task data model.
//!
//! Tasks carry ownership (assignee and creator), a priority, tags from a
//! fixed vocabulary, and a set of dependency ids. Identifiers are assigned
//! by the store and never reused.

use crate::core::user::UserId;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Unique identifier for a task.
///
/// Ids start at 1 and are handed out sequentially by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// The first id ever assigned.
    pub const FIRST: TaskId = TaskId(1);

    /// Return the id following this one, or `None` on overflow.
    pub fn next(self) -> Option<TaskId> {
        self.0.checked_add(1).map(TaskId)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Task status in its lifecycle.
///
/// `Completed` and `Cancelled` are terminal; see `core::transitions` for
/// the legal moves between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task created and ready to be picked up.
    #[default]
    Pending,
    /// Task is being worked on.
    InProgress,
    /// Task finished successfully.
    Completed,
    /// Task abandoned.
    Cancelled,
    /// Task waiting on incomplete dependencies (or parked manually).
    Blocked,
}

impl TaskStatus {
    /// Every legal status value.
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
        TaskStatus::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Blocked => "blocked",
        }
    }

    /// Check if no further transition is possible from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("invalid task status: {}", s)))
    }
}

/// Task priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("invalid task priority: {}", s)))
    }
}

/// Task category drawn from a fixed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Bug,
    Feature,
    Enhancement,
    Documentation,
}

impl Tag {
    pub const ALL: [Tag; 4] = [Tag::Bug, Tag::Feature, Tag::Enhancement, Tag::Documentation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Bug => "bug",
            Tag::Feature => "feature",
            Tag::Enhancement => "enhancement",
            Tag::Documentation => "documentation",
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Tag::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("invalid tag: {}", s)))
    }
}

/// A single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned identifier.
    pub id: TaskId,
    /// Short human-readable title.
    pub title: String,
    /// Detailed description.
    pub description: String,
    /// Current lifecycle status.
    pub status: TaskStatus,
    pub priority: Priority,
    /// User currently responsible for the task. The task lives in this
    /// user's task index.
    pub assignee: UserId,
    /// Authenticated user who created the task.
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: BTreeSet<Tag>,
    /// Ids of tasks that must complete before this one can start.
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
}

impl Task {
    /// Build a task in `Pending` status with both timestamps set to `now`.
    ///
    /// Callers set `status`, `due_date`, `tags` and `dependencies` as needed.
    pub fn new(
        id: TaskId,
        title: &str,
        description: &str,
        assignee: UserId,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.to_string(),
            description: description.to_string(),
            status: TaskStatus::Pending,
            priority: Priority::default(),
            assignee,
            created_by,
            created_at: now,
            updated_at: now,
            due_date: None,
            tags: BTreeSet::new(),
            dependencies: BTreeSet::new(),
        }
    }

    /// Check structural rules of a single task record.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("task title cannot be empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(Error::Validation(
                "task description cannot be empty".to_string(),
            ));
        }
        if self.assignee.is_empty() {
            return Err(Error::Validation("task must have an assignee".to_string()));
        }
        if self.created_by.is_empty() {
            return Err(Error::Validation("task must have a creator".to_string()));
        }
        if self.created_at > self.updated_at {
            return Err(Error::Validation(
                "created time cannot be after updated time".to_string(),
            ));
        }
        Ok(())
    }

    /// Record a modification at `now`. `updated_at` never moves backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Check if the task is in a terminal state (Completed or Cancelled).
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Only terminal tasks may be deleted.
    pub fn can_delete(&self) -> bool {
        self.is_terminal()
    }

    pub fn depends_on(&self, id: TaskId) -> bool {
        self.dependencies.contains(&id)
    }
}
