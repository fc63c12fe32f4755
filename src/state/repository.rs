//! Capability traits over the store's contents.
//!
//! The operation layer only talks to these traits, so a different backend
//! can be dropped in behind [`Store`]. [`InMemoryStore`](super::InMemoryStore)
//! is the reference implementation.

use crate::core::dag;
use crate::core::{Session, Task, TaskId, TaskMap, TaskStatus, User, UserId};
use crate::error::Result;
use crate::state::SystemSnapshot;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Task records and their assignee index.
pub trait TaskRepository {
    fn task(&self, id: TaskId) -> Option<&Task>;

    fn tasks(&self) -> &TaskMap;

    /// Store a new task and add it to its assignee's index.
    ///
    /// Fails if a task with the same id already exists.
    fn insert_task(&mut self, task: Task) -> Result<()>;

    /// Replace an existing task, moving it between user indexes when the
    /// assignee changed.
    fn update_task(&mut self, task: Task) -> Result<()>;

    /// Remove a task and its index entry, returning the removed record.
    fn remove_task(&mut self, id: TaskId) -> Result<Task>;

    fn tasks_with_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks().values().filter(|t| t.status == status).collect()
    }

    fn dependents_of(&self, id: TaskId) -> Vec<TaskId> {
        dag::dependents_of(id, self.tasks())
    }
}

/// Registered users.
pub trait UserRepository {
    fn user(&self, id: &UserId) -> Option<&User>;

    fn users(&self) -> Vec<&User>;

    /// Register a user. Fails if the id is taken.
    fn insert_user(&mut self, user: User) -> Result<()>;
}

/// Authentication sessions.
pub trait SessionRepository {
    fn insert_session(&mut self, session: Session) -> Result<()>;

    fn session(&self, token: &str) -> Option<&Session>;

    /// The session of `user` that is valid at `now`, if any.
    fn valid_session_for(&self, user: &UserId, now: DateTime<Utc>) -> Option<&Session>;

    /// Drop every session of `user`. Returns how many were removed.
    fn remove_sessions_for(&mut self, user: &UserId) -> usize;

    /// Drop every session that is expired or inactive at `now`.
    fn prune_expired_sessions(&mut self, now: DateTime<Utc>) -> usize;

    fn sessions(&self) -> Vec<&Session>;
}

/// Counters, clock, authentication context and the per-user index.
pub trait SystemStateRepository {
    fn next_task_id(&self) -> TaskId;

    /// Hand out the next id and advance the counter.
    fn allocate_task_id(&mut self) -> Result<TaskId>;

    fn current_user(&self) -> Option<&UserId>;

    fn set_current_user(&mut self, user: Option<UserId>);

    fn user_tasks(&self, user: &UserId) -> Option<&BTreeSet<TaskId>>;

    fn add_user_task(&mut self, user: &UserId, id: TaskId);

    fn remove_user_task(&mut self, user: &UserId, id: TaskId);

    fn clock(&self) -> DateTime<Utc>;

    /// Move the clock forward to `now` (never backwards) and return it.
    fn advance_clock(&mut self, now: DateTime<Utc>) -> DateTime<Utc>;

    /// Copy the full state out for verification.
    fn snapshot(&self) -> SystemSnapshot;
}

/// Everything the operation layer needs from a backend.
///
/// `Clone` is required so a unit of work can checkpoint and restore state.
pub trait Repository:
    TaskRepository + UserRepository + SessionRepository + SystemStateRepository + Clone + Send + Sync
{
}

impl<T> Repository for T where
    T: TaskRepository
        + UserRepository
        + SessionRepository
        + SystemStateRepository
        + Clone
        + Send
        + Sync
{
}

/// A shared store guarded by a single readers-writer lock.
///
/// Readers run concurrently; each `write` call has exclusive access for its
/// whole closure, so a read-modify-verify sequence is never observed half done.
pub trait Store: Send + Sync {
    type State: Repository;

    fn read<R>(&self, f: impl FnOnce(&Self::State) -> R) -> R;

    fn write<R>(&self, f: impl FnOnce(&mut Self::State) -> R) -> R;
}
