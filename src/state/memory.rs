//! In-memory reference store.

use crate::core::{Session, Task, TaskId, TaskMap, User, UserId};
use crate::error::{Error, Result};
use crate::state::repository::{
    SessionRepository, Store, SystemStateRepository, TaskRepository, UserRepository,
};
use crate::state::SystemSnapshot;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

/// The complete mutable state of the in-memory backend.
#[derive(Debug, Clone)]
pub struct MemoryState {
    tasks: TaskMap,
    user_tasks: BTreeMap<UserId, BTreeSet<TaskId>>,
    users: BTreeMap<UserId, User>,
    /// Live sessions keyed by token. Ended and expired ones are removed.
    sessions: BTreeMap<String, Session>,
    next_task_id: TaskId,
    current_user: Option<UserId>,
    clock: DateTime<Utc>,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            tasks: TaskMap::new(),
            user_tasks: BTreeMap::new(),
            users: BTreeMap::new(),
            sessions: BTreeMap::new(),
            next_task_id: TaskId::FIRST,
            current_user: None,
            clock: Utc::now(),
        }
    }
}

impl TaskRepository for MemoryState {
    fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    fn tasks(&self) -> &TaskMap {
        &self.tasks
    }

    fn insert_task(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.id) {
            return Err(Error::Internal(format!(
                "task with ID {} already exists",
                task.id
            )));
        }
        self.add_user_task(&task.assignee, task.id);
        self.tasks.insert(task.id, task);
        Ok(())
    }

    fn update_task(&mut self, task: Task) -> Result<()> {
        let previous = self
            .tasks
            .get(&task.id)
            .map(|t| t.assignee.clone())
            .ok_or(Error::TaskNotFound(task.id))?;
        if previous != task.assignee {
            self.remove_user_task(&previous, task.id);
            self.add_user_task(&task.assignee, task.id);
        }
        self.tasks.insert(task.id, task);
        Ok(())
    }

    fn remove_task(&mut self, id: TaskId) -> Result<Task> {
        let task = self.tasks.remove(&id).ok_or(Error::TaskNotFound(id))?;
        self.remove_user_task(&task.assignee, id);
        Ok(task)
    }
}

impl UserRepository for MemoryState {
    fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    fn users(&self) -> Vec<&User> {
        self.users.values().collect()
    }

    fn insert_user(&mut self, user: User) -> Result<()> {
        if self.users.contains_key(&user.id) {
            return Err(Error::UserExists(user.id));
        }
        self.users.insert(user.id.clone(), user);
        Ok(())
    }
}

impl SessionRepository for MemoryState {
    fn insert_session(&mut self, session: Session) -> Result<()> {
        if self.sessions.contains_key(&session.token) {
            return Err(Error::Internal(
                "session with token already exists".to_string(),
            ));
        }
        self.sessions.insert(session.token.clone(), session);
        Ok(())
    }

    fn session(&self, token: &str) -> Option<&Session> {
        self.sessions.get(token)
    }

    fn valid_session_for(&self, user: &UserId, now: DateTime<Utc>) -> Option<&Session> {
        self.sessions
            .values()
            .find(|s| &s.user_id == user && s.is_valid_at(now))
    }

    fn remove_sessions_for(&mut self, user: &UserId) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| &s.user_id != user);
        before - self.sessions.len()
    }

    fn prune_expired_sessions(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.is_valid_at(now));
        before - self.sessions.len()
    }

    fn sessions(&self) -> Vec<&Session> {
        self.sessions.values().collect()
    }
}

impl SystemStateRepository for MemoryState {
    fn next_task_id(&self) -> TaskId {
        self.next_task_id
    }

    fn allocate_task_id(&mut self) -> Result<TaskId> {
        let id = self.next_task_id;
        self.next_task_id = id
            .next()
            .ok_or_else(|| Error::Internal("task id counter overflow".to_string()))?;
        Ok(id)
    }

    fn current_user(&self) -> Option<&UserId> {
        self.current_user.as_ref()
    }

    fn set_current_user(&mut self, user: Option<UserId>) {
        self.current_user = user;
    }

    fn user_tasks(&self, user: &UserId) -> Option<&BTreeSet<TaskId>> {
        self.user_tasks.get(user)
    }

    fn add_user_task(&mut self, user: &UserId, id: TaskId) {
        self.user_tasks.entry(user.clone()).or_default().insert(id);
    }

    fn remove_user_task(&mut self, user: &UserId, id: TaskId) {
        if let Some(ids) = self.user_tasks.get_mut(user) {
            ids.remove(&id);
            if ids.is_empty() {
                self.user_tasks.remove(user);
            }
        }
    }

    fn clock(&self) -> DateTime<Utc> {
        self.clock
    }

    fn advance_clock(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        if now > self.clock {
            self.clock = now;
        }
        self.clock
    }

    fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot {
            tasks: self.tasks.clone(),
            user_tasks: self.user_tasks.clone(),
            next_task_id: self.next_task_id,
            current_user: self.current_user.clone(),
            clock: self.clock,
            users: self.users.clone(),
            sessions: self.sessions.values().cloned().collect(),
        }
    }
}

/// In-memory [`Store`] backed by a single `parking_lot` readers-writer lock.
///
/// Not durable: state lives for the lifetime of the instance.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an existing state, e.g. one restored from a snapshot.
    pub fn with_state(state: MemoryState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }
}

impl Store for InMemoryStore {
    type State = MemoryState;

    fn read<R>(&self, f: impl FnOnce(&Self::State) -> R) -> R {
        let guard = self.state.read();
        f(&*guard)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Self::State) -> R) -> R {
        let mut guard = self.state.write();
        f(&mut *guard)
    }
}
