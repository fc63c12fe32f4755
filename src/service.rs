//! Operation layer.
//!
//! Every mutation runs inside one exclusive section of the store as a
//! [`UnitOfWork`]: resolve the caller, check preconditions, mutate, then
//! verify the whole snapshot. A failed verification restores the checkpoint
//! taken at the start of the section.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::dag;
use crate::core::{Priority, Session, Tag, Task, TaskId, TaskStatus, User, UserId};
use crate::error::{Error, Result};
use crate::invariants::{
    liveness_warnings, InvariantChecker, LivenessPolicy, LivenessWarning, Violation,
};
use crate::state::{
    InMemoryStore, Repository, SessionRepository, Store, SystemSnapshot, SystemStateRepository,
    TaskRepository, UnitOfWork, UserRepository,
};

/// Request to create a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    pub assignee: UserId,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: BTreeSet<Tag>,
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
}

impl NewTask {
    pub fn new(title: &str, description: &str, assignee: impl Into<UserId>) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            priority: Priority::default(),
            assignee: assignee.into(),
            due_date: None,
            tags: BTreeSet::new(),
            dependencies: BTreeSet::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies.extend(deps);
        self
    }
}

/// Editable descriptive fields of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDetails {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

/// Task lifecycle operations over a shared [`Store`].
///
/// Cloning is cheap and every clone operates on the same store.
#[derive(Debug)]
pub struct TaskService<S: Store = InMemoryStore> {
    store: Arc<S>,
    checker: InvariantChecker,
    config: Config,
}

impl<S: Store> Clone for TaskService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            checker: self.checker,
            config: self.config.clone(),
        }
    }
}

impl TaskService<InMemoryStore> {
    /// A service over a fresh in-memory store.
    pub fn new(config: Config) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), config)
    }
}

impl Default for TaskService<InMemoryStore> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<S: Store> TaskService<S> {
    pub fn with_store(store: Arc<S>, config: Config) -> Self {
        Self {
            store,
            checker: InvariantChecker::with_clock_bound(config.enforce_clock_bound),
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `f` as one verified unit of work under the write lock.
    ///
    /// The clock is advanced before `f` runs and `f` receives the new value.
    /// Any error, including a failed invariant check, leaves the store as it
    /// was before the call.
    fn mutate<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut S::State, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let checker = self.checker;
        self.store.write(|state| {
            let mut uow = UnitOfWork::begin(state);
            let now = uow.advance_clock(Utc::now());

            let output = match f(&mut *uow, now) {
                Ok(output) => output,
                Err(e) => {
                    debug!(operation, error = %e, "operation rejected");
                    return Err(e);
                }
            };

            let snapshot = uow.snapshot();
            if let Err(violation) = checker.check_all(&snapshot) {
                error!(
                    operation,
                    invariant = %violation.invariant,
                    task_ids = ?violation.task_ids,
                    detail = %violation.detail,
                    "invariant violated after mutation, rolling back"
                );
                return Err(Error::InvariantViolation(violation));
            }

            uow.commit();
            Ok(output)
        })
    }

    /// Register a user. Needs no authentication.
    pub fn register_user(&self, user: User) -> Result<User> {
        debug!(user = %user.id, "register_user");
        user.validate()?;
        let registered = self.mutate("register_user", move |state, _| {
            state.insert_user(user.clone())?;
            Ok(user)
        })?;
        info!(user = %registered.id, "user registered");
        Ok(registered)
    }

    /// Open a session for `user_id` and make it the current user.
    pub fn authenticate(&self, user_id: &UserId) -> Result<Session> {
        debug!(user = %user_id, "authenticate");
        let ttl = self.config.session_ttl()?;
        let session = self.mutate("authenticate", |state, now| {
            if state.user(user_id).is_none() {
                return Err(Error::UserNotFound(user_id.clone()));
            }
            let pruned = state.prune_expired_sessions(now);
            if pruned > 0 {
                debug!(pruned, "expired sessions removed");
            }
            if state.valid_session_for(user_id, now).is_some() {
                return Err(Error::SessionExists(user_id.clone()));
            }
            let session = Session::open(user_id.clone(), now, ttl)?;
            state.insert_session(session.clone())?;
            state.set_current_user(Some(user_id.clone()));
            Ok(session)
        })?;
        info!(user = %user_id, expires_at = %session.expires_at, "authenticated");
        Ok(session)
    }

    /// End the session of the current user and drop its session records.
    pub fn logout(&self, user_id: &UserId) -> Result<()> {
        debug!(user = %user_id, "logout");
        self.mutate("logout", |state, _| {
            if state.current_user() != Some(user_id) {
                return Err(Error::NoSession(user_id.clone()));
            }
            state.remove_sessions_for(user_id);
            state.set_current_user(None);
            Ok(())
        })?;
        info!(user = %user_id, "logged out");
        Ok(())
    }

    pub fn create_task(&self, request: NewTask) -> Result<Task> {
        debug!(
            title = %request.title,
            assignee = %request.assignee,
            dependencies = ?request.dependencies,
            "create_task"
        );
        let max_tasks = self.config.max_tasks;
        let task = self.mutate("create_task", move |state, now| {
            let creator = authenticated_user(state, now)?;

            if state.tasks().len() >= max_tasks {
                return Err(Error::CapacityExceeded { max: max_tasks });
            }
            if state.user(&request.assignee).is_none() {
                return Err(Error::UserNotFound(request.assignee.clone()));
            }

            let tasks = state.tasks();
            dag::validate_dependencies(&request.dependencies, tasks)?;
            let id = state.next_task_id();
            dag::ensure_acyclic(id, &request.dependencies, tasks)?;
            let status = dag::initial_status(&request.dependencies, tasks);

            let mut task = Task::new(
                id,
                &request.title,
                &request.description,
                request.assignee,
                creator,
                now,
            );
            task.status = status;
            task.priority = request.priority;
            task.due_date = request.due_date;
            task.tags = request.tags;
            task.dependencies = request.dependencies;
            task.validate()?;

            let allocated = state.allocate_task_id()?;
            if allocated != id {
                return Err(Error::Internal(format!(
                    "task id counter moved from {} to {} during creation",
                    id, allocated
                )));
            }
            state.insert_task(task.clone())?;
            Ok(task)
        })?;
        info!(task = %task.id, status = %task.status, assignee = %task.assignee, "task created");
        Ok(task)
    }

    pub fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<Task> {
        debug!(task = %id, status = %status, "update_status");
        let checker = self.checker;
        let task = self.mutate("update_status", |state, now| {
            let user = authenticated_user(state, now)?;
            let mut task = owned_task(state, id, &user)?;
            ensure_can_enter(&checker, &task, status, state.tasks())?;
            task.status = status;
            task.touch(now);
            state.update_task(task.clone())?;
            Ok(task)
        })?;
        info!(task = %id, status = %status, "task status updated");
        Ok(task)
    }

    pub fn update_priority(&self, id: TaskId, priority: Priority) -> Result<Task> {
        debug!(task = %id, priority = %priority, "update_priority");
        let task = self.mutate("update_priority", |state, now| {
            let user = authenticated_user(state, now)?;
            let mut task = owned_task(state, id, &user)?;
            task.priority = priority;
            task.touch(now);
            state.update_task(task.clone())?;
            Ok(task)
        })?;
        info!(task = %id, priority = %priority, "task priority updated");
        Ok(task)
    }

    /// Hand a task to another registered user. Only the assignee may do this.
    pub fn reassign(&self, id: TaskId, assignee: &UserId) -> Result<Task> {
        debug!(task = %id, assignee = %assignee, "reassign");
        let task = self.mutate("reassign", |state, now| {
            let user = authenticated_user(state, now)?;
            let mut task = owned_task(state, id, &user)?;
            if state.user(assignee).is_none() {
                return Err(Error::UserNotFound(assignee.clone()));
            }
            task.assignee = assignee.clone();
            task.touch(now);
            state.update_task(task.clone())?;
            Ok(task)
        })?;
        info!(task = %id, assignee = %assignee, "task reassigned");
        Ok(task)
    }

    pub fn update_details(&self, id: TaskId, details: TaskDetails) -> Result<Task> {
        debug!(task = %id, "update_details");
        let task = self.mutate("update_details", move |state, now| {
            let user = authenticated_user(state, now)?;
            let mut task = owned_task(state, id, &user)?;
            task.title = details.title;
            task.description = details.description;
            task.due_date = details.due_date;
            task.touch(now);
            task.validate()?;
            state.update_task(task.clone())?;
            Ok(task)
        })?;
        info!(task = %id, "task details updated");
        Ok(task)
    }

    /// Delete a terminal task that nothing depends on.
    pub fn delete_task(&self, id: TaskId) -> Result<Task> {
        debug!(task = %id, "delete_task");
        let removed = self.mutate("delete_task", |state, now| {
            let user = authenticated_user(state, now)?;
            let task = owned_task(state, id, &user)?;
            if !task.can_delete() {
                return Err(Error::NotTerminal {
                    task: id,
                    status: task.status,
                });
            }
            let dependents = state.dependents_of(id);
            if !dependents.is_empty() {
                return Err(Error::HasDependents {
                    task: id,
                    dependents,
                });
            }
            state.remove_task(id)
        })?;
        info!(task = %id, "task deleted");
        Ok(removed)
    }

    /// Move several tasks to `status` at once.
    ///
    /// Every task is checked before any is changed; one failing precondition
    /// rejects the whole batch. Duplicate ids are applied once.
    pub fn bulk_update_status(&self, ids: &[TaskId], status: TaskStatus) -> Result<Vec<Task>> {
        debug!(tasks = ?ids, status = %status, "bulk_update_status");
        let checker = self.checker;
        let unique: BTreeSet<TaskId> = ids.iter().copied().collect();
        let updated = self.mutate("bulk_update_status", |state, now| {
            let user = authenticated_user(state, now)?;

            let mut batch = Vec::with_capacity(unique.len());
            for id in &unique {
                let task = owned_task(state, *id, &user)?;
                ensure_can_enter(&checker, &task, status, state.tasks())?;
                batch.push(task);
            }

            for task in &mut batch {
                task.status = status;
                task.touch(now);
                state.update_task(task.clone())?;
            }
            Ok(batch)
        })?;
        info!(count = updated.len(), status = %status, "bulk status update applied");
        Ok(updated)
    }

    /// Move every blocked task whose dependencies have completed back to
    /// pending. Returns how many were unblocked.
    pub fn check_dependencies(&self) -> Result<usize> {
        debug!("check_dependencies");
        let count = self.mutate("check_dependencies", |state, now| {
            let ready: Vec<Task> = state
                .tasks_with_status(TaskStatus::Blocked)
                .into_iter()
                .filter(|task| dag::should_unblock(task, state.tasks()))
                .cloned()
                .collect();

            for mut task in ready.iter().cloned() {
                task.status = TaskStatus::Pending;
                task.touch(now);
                state.update_task(task)?;
            }
            Ok(ready.len())
        })?;
        if count > 0 {
            info!(count, "tasks unblocked");
        }
        Ok(count)
    }

    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        self.store.read(|state| state.task(id).cloned())
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.store
            .read(|state| state.tasks().values().cloned().collect())
    }

    /// Tasks in `user`'s index, in id order.
    pub fn tasks_for_user(&self, user: &UserId) -> Vec<Task> {
        self.store.read(|state| {
            state
                .user_tasks(user)
                .into_iter()
                .flatten()
                .filter_map(|id| state.task(*id).cloned())
                .collect()
        })
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.store.read(|state| state.current_user().cloned())
    }

    pub fn snapshot(&self) -> SystemSnapshot {
        self.store.read(|state| state.snapshot())
    }

    /// Evaluate every invariant against the current state.
    pub fn audit(&self) -> Vec<Violation> {
        let violations = self.checker.audit(&self.snapshot());
        for violation in &violations {
            error!(
                invariant = %violation.invariant,
                task_ids = ?violation.task_ids,
                "audit: {}",
                violation.detail
            );
        }
        violations
    }

    /// Liveness warnings for the current state. Never fails.
    pub fn diagnostics(&self) -> Vec<LivenessWarning> {
        let policy = self.config.liveness_policy().unwrap_or_else(|e| {
            warn!("{}, using the default liveness policy", e);
            LivenessPolicy::default()
        });
        let warnings = liveness_warnings(&self.snapshot(), &policy);
        for warning in &warnings {
            warn!(task = ?warning.task_id(), "{}", warning);
        }
        warnings
    }
}

/// The current user, provided their session is still valid at `now`.
fn authenticated_user<R: Repository>(state: &R, now: DateTime<Utc>) -> Result<UserId> {
    let user = state.current_user().cloned().ok_or(Error::NotAuthenticated)?;
    if state.valid_session_for(&user, now).is_none() {
        debug!(user = %user, "session expired or inactive");
        return Err(Error::NotAuthenticated);
    }
    Ok(user)
}

/// A copy of task `id`, provided `user` is its assignee.
fn owned_task<R: Repository>(state: &R, id: TaskId, user: &UserId) -> Result<Task> {
    let task = state.task(id).cloned().ok_or(Error::TaskNotFound(id))?;
    if &task.assignee != user {
        return Err(Error::NotOwner {
            task: id,
            user: user.clone(),
        });
    }
    Ok(task)
}

/// Transition legality plus the dependency rule for entering `in_progress`.
fn ensure_can_enter(
    checker: &InvariantChecker,
    task: &Task,
    status: TaskStatus,
    tasks: &crate::core::TaskMap,
) -> Result<()> {
    checker.check_transition(task.status, status)?;
    if status == TaskStatus::InProgress {
        if let Some(dependency) = dag::first_incomplete_dependency(task, tasks) {
            return Err(Error::DependencyIncomplete {
                task: task.id,
                dependency,
            });
        }
    }
    Ok(())
}
