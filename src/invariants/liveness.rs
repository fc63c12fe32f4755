//! Non-fatal liveness diagnostics.
//!
//! These never fail an operation. They flag work that is not progressing.

use crate::core::dag;
use crate::core::{Priority, TaskId, TaskStatus};
use crate::state::SystemSnapshot;
use chrono::{DateTime, Duration, Utc};

/// Thresholds for [`liveness_warnings`].
#[derive(Debug, Clone, Copy)]
pub struct LivenessPolicy {
    /// Pending tasks older than this are reported as stale.
    pub stale_pending: Duration,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            stale_pending: Duration::days(7),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessWarning {
    /// Pending for longer than the policy allows.
    StalePending { task: TaskId, age: Duration },
    /// Past its due date and not yet terminal.
    Overdue { task: TaskId, due: DateTime<Utc> },
    /// Still blocked although every dependency has completed.
    UnblockedButBlocked { task: TaskId },
    /// Critical tasks sitting in pending.
    CriticalPending { count: usize },
}

impl LivenessWarning {
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            LivenessWarning::StalePending { task, .. }
            | LivenessWarning::Overdue { task, .. }
            | LivenessWarning::UnblockedButBlocked { task } => Some(*task),
            LivenessWarning::CriticalPending { .. } => None,
        }
    }
}

impl std::fmt::Display for LivenessWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LivenessWarning::StalePending { task, age } => write!(
                f,
                "task {} has been pending for {} days",
                task,
                age.num_days()
            ),
            LivenessWarning::Overdue { task, due } => {
                write!(f, "task {} is overdue (due {})", task, due)
            }
            LivenessWarning::UnblockedButBlocked { task } => write!(
                f,
                "task {} is blocked but all dependencies are completed",
                task
            ),
            LivenessWarning::CriticalPending { count } => {
                write!(f, "{} critical tasks are still pending", count)
            }
        }
    }
}

/// Collect liveness warnings, measured against the snapshot clock.
pub fn liveness_warnings(snapshot: &SystemSnapshot, policy: &LivenessPolicy) -> Vec<LivenessWarning> {
    let now = snapshot.clock;
    let mut warnings = Vec::new();
    let mut critical_pending = 0;

    for task in snapshot.tasks.values() {
        if task.status == TaskStatus::Pending {
            let age = now - task.created_at;
            if age > policy.stale_pending {
                warnings.push(LivenessWarning::StalePending { task: task.id, age });
            }
            if task.priority == Priority::Critical {
                critical_pending += 1;
            }
        }

        if let Some(due) = task.due_date {
            if now > due && !task.is_terminal() {
                warnings.push(LivenessWarning::Overdue { task: task.id, due });
            }
        }

        if task.status == TaskStatus::Blocked && dag::should_unblock(task, &snapshot.tasks) {
            warnings.push(LivenessWarning::UnblockedButBlocked { task: task.id });
        }
    }

    if critical_pending > 0 {
        warnings.push(LivenessWarning::CriticalPending {
            count: critical_pending,
        });
    }

    warnings
}
