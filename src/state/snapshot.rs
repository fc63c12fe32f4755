//! Owned copy of the whole store.

use crate::core::{Session, Task, TaskId, TaskMap, User, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Immutable copy of the store's state.
///
/// Snapshots are produced by cloning under the store lock, so verification
/// and audits never observe another operation's in-flight mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub tasks: TaskMap,
    /// Per-user task index.
    pub user_tasks: BTreeMap<UserId, BTreeSet<TaskId>>,
    /// Id the next created task will receive.
    pub next_task_id: TaskId,
    pub current_user: Option<UserId>,
    /// Logical clock of the store at snapshot time.
    pub clock: DateTime<Utc>,
    #[serde(default)]
    pub users: BTreeMap<UserId, User>,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl SystemSnapshot {
    /// An empty system at `clock`: no tasks, next id 1, nobody logged in.
    pub fn empty(clock: DateTime<Utc>) -> Self {
        Self {
            tasks: TaskMap::new(),
            user_tasks: BTreeMap::new(),
            next_task_id: TaskId::FIRST,
            current_user: None,
            clock,
            users: BTreeMap::new(),
            sessions: Vec::new(),
        }
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Task ids in `user`'s index, empty if the user has none.
    pub fn user_task_ids(&self, user: &UserId) -> impl Iterator<Item = TaskId> + '_ {
        self.user_tasks
            .get(user)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Sessions valid at the snapshot clock.
    pub fn valid_sessions(&self) -> impl Iterator<Item = &Session> + '_ {
        self.sessions.iter().filter(|s| s.is_valid_at(self.clock))
    }
}
