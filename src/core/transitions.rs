//! Task lifecycle state machine.
//!
//! The legal moves are:
//!
//! ```text
//! pending     -> in_progress | cancelled | blocked
//! in_progress -> completed | cancelled | blocked | pending
//! blocked     -> pending | in_progress | cancelled
//! ```
//!
//! Everything else is illegal, including self-transitions and any move out
//! of `completed` or `cancelled`.

use crate::core::task::TaskStatus;
use crate::error::{Error, Result};

/// Every legal `(from, to)` pair.
pub const LEGAL_TRANSITIONS: [(TaskStatus, TaskStatus); 10] = [
    (TaskStatus::Pending, TaskStatus::InProgress),
    (TaskStatus::Pending, TaskStatus::Cancelled),
    (TaskStatus::Pending, TaskStatus::Blocked),
    (TaskStatus::InProgress, TaskStatus::Completed),
    (TaskStatus::InProgress, TaskStatus::Cancelled),
    (TaskStatus::InProgress, TaskStatus::Blocked),
    (TaskStatus::InProgress, TaskStatus::Pending),
    (TaskStatus::Blocked, TaskStatus::Pending),
    (TaskStatus::Blocked, TaskStatus::InProgress),
    (TaskStatus::Blocked, TaskStatus::Cancelled),
];

/// Check if moving from `from` to `to` is allowed.
pub fn is_legal(from: TaskStatus, to: TaskStatus) -> bool {
    LEGAL_TRANSITIONS.contains(&(from, to))
}

/// Reject an illegal transition with `Error::InvalidTransition`.
pub fn check_transition(from: TaskStatus, to: TaskStatus) -> Result<()> {
    if is_legal(from, to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition { from, to })
    }
}

/// All states reachable in one step from `from`.
pub fn successors(from: TaskStatus) -> Vec<TaskStatus> {
    LEGAL_TRANSITIONS
        .iter()
        .filter(|(f, _)| *f == from)
        .map(|(_, to)| *to)
        .collect()
}
