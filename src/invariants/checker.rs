//! Safety invariant evaluation over a [`SystemSnapshot`].

use crate::core::dag;
use crate::core::transitions;
use crate::core::{Task, TaskId, TaskStatus, UserId};
use crate::error::{Error, Result};
use crate::state::SystemSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The safety invariants, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Invariant {
    /// Every task appears in exactly one user's task index.
    NoOrphanTasks,
    /// Every task is indexed under its recorded assignee, and every index
    /// entry points at a task assigned to that user.
    TaskOwnership,
    /// Every id is at least 1 and below the next-id counter.
    ValidTaskIds,
    /// Every map key equals the stored id of its task.
    NoDuplicateTaskIds,
    /// Every status is one of the five legal values.
    ValidStatus,
    /// `created_at <= updated_at`, and optionally `updated_at <= clock`.
    ConsistentTimestamps,
    /// No task reaches itself through its dependencies.
    AcyclicDependencies,
    /// Every task records the authenticated user who created it.
    AuthenticatedProvenance,
    /// Every dependency id refers to an existing task.
    DependencyIntegrity,
    /// At most one valid session per user.
    SingleActiveSession,
}

impl Invariant {
    pub const ALL: [Invariant; 10] = [
        Invariant::NoOrphanTasks,
        Invariant::TaskOwnership,
        Invariant::ValidTaskIds,
        Invariant::NoDuplicateTaskIds,
        Invariant::ValidStatus,
        Invariant::ConsistentTimestamps,
        Invariant::AcyclicDependencies,
        Invariant::AuthenticatedProvenance,
        Invariant::DependencyIntegrity,
        Invariant::SingleActiveSession,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Invariant::NoOrphanTasks => "NoOrphanTasks",
            Invariant::TaskOwnership => "TaskOwnership",
            Invariant::ValidTaskIds => "ValidTaskIds",
            Invariant::NoDuplicateTaskIds => "NoDuplicateTaskIds",
            Invariant::ValidStatus => "ValidStatus",
            Invariant::ConsistentTimestamps => "ConsistentTimestamps",
            Invariant::AcyclicDependencies => "AcyclicDependencies",
            Invariant::AuthenticatedProvenance => "AuthenticatedProvenance",
            Invariant::DependencyIntegrity => "DependencyIntegrity",
            Invariant::SingleActiveSession => "SingleActiveSession",
        }
    }
}

impl std::fmt::Display for Invariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A failed invariant, with the ids involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub invariant: Invariant,
    pub task_ids: Vec<TaskId>,
    pub detail: String,
}

impl Violation {
    fn new(invariant: Invariant, task_ids: Vec<TaskId>, detail: String) -> Self {
        Self {
            invariant,
            task_ids,
            detail,
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} violated: {}", self.invariant, self.detail)?;
        if !self.task_ids.is_empty() {
            let ids: Vec<String> = self.task_ids.iter().map(|id| id.to_string()).collect();
            write!(f, " (tasks: {})", ids.join(", "))?;
        }
        Ok(())
    }
}

/// Evaluates the safety invariants against snapshots.
///
/// Stateless apart from its settings, so one checker can be shared freely.
#[derive(Debug, Clone, Copy)]
pub struct InvariantChecker {
    enforce_clock_bound: bool,
}

impl Default for InvariantChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantChecker {
    /// A checker that also requires `updated_at <= clock`.
    pub fn new() -> Self {
        Self {
            enforce_clock_bound: true,
        }
    }

    pub fn with_clock_bound(enforce_clock_bound: bool) -> Self {
        Self {
            enforce_clock_bound,
        }
    }

    /// Evaluate every invariant in order and stop at the first violation.
    pub fn check_all(&self, snapshot: &SystemSnapshot) -> std::result::Result<(), Violation> {
        for invariant in Invariant::ALL {
            if let Some(violation) = self.check(invariant, snapshot).into_iter().next() {
                return Err(violation);
            }
        }
        Ok(())
    }

    /// Evaluate every invariant and collect all violations.
    pub fn audit(&self, snapshot: &SystemSnapshot) -> Vec<Violation> {
        Invariant::ALL
            .into_iter()
            .flat_map(|invariant| self.check(invariant, snapshot))
            .collect()
    }

    /// Evaluate a single invariant.
    pub fn check(&self, invariant: Invariant, snapshot: &SystemSnapshot) -> Vec<Violation> {
        match invariant {
            Invariant::NoOrphanTasks => no_orphan_tasks(snapshot),
            Invariant::TaskOwnership => task_ownership(snapshot),
            Invariant::ValidTaskIds => valid_task_ids(snapshot),
            Invariant::NoDuplicateTaskIds => no_duplicate_task_ids(snapshot),
            Invariant::ValidStatus => valid_status(snapshot),
            Invariant::ConsistentTimestamps => {
                consistent_timestamps(snapshot, self.enforce_clock_bound)
            }
            Invariant::AcyclicDependencies => acyclic_dependencies(snapshot),
            Invariant::AuthenticatedProvenance => authenticated_provenance(snapshot),
            Invariant::DependencyIntegrity => dependency_integrity(snapshot),
            Invariant::SingleActiveSession => single_active_session(snapshot),
        }
    }

    /// Structural check of one task against the rest of the snapshot.
    pub fn check_task(&self, task: &Task, snapshot: &SystemSnapshot) -> Result<()> {
        task.validate()?;

        let indexed = snapshot
            .user_tasks
            .values()
            .any(|ids| ids.contains(&task.id));
        if !indexed {
            return Err(Error::InvariantViolation(Violation::new(
                Invariant::NoOrphanTasks,
                vec![task.id],
                format!("task {} is not assigned to any user", task.id),
            )));
        }

        if let Some(missing) = task
            .dependencies
            .iter()
            .find(|dep| !snapshot.tasks.contains_key(dep))
        {
            return Err(Error::InvariantViolation(Violation::new(
                Invariant::DependencyIntegrity,
                vec![task.id, *missing],
                format!("task {} has non-existent dependency {}", task.id, missing),
            )));
        }

        Ok(())
    }

    /// Check a single status change against the transition table.
    pub fn check_transition(&self, from: TaskStatus, to: TaskStatus) -> Result<()> {
        transitions::check_transition(from, to)
    }
}

fn no_orphan_tasks(snapshot: &SystemSnapshot) -> Vec<Violation> {
    snapshot
        .tasks
        .iter()
        .filter_map(|(id, task)| {
            let holders = snapshot
                .user_tasks
                .values()
                .filter(|ids| ids.contains(id))
                .count();
            (holders != 1).then(|| {
                Violation::new(
                    Invariant::NoOrphanTasks,
                    vec![*id],
                    format!(
                        "task {} (assigned to {}) appears in {} user task lists",
                        id, task.assignee, holders
                    ),
                )
            })
        })
        .collect()
}

fn task_ownership(snapshot: &SystemSnapshot) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (id, task) in &snapshot.tasks {
        if !snapshot.user_task_ids(&task.assignee).any(|t| t == *id) {
            violations.push(Violation::new(
                Invariant::TaskOwnership,
                vec![*id],
                format!(
                    "task {} assigned to {} but not in their task list",
                    id, task.assignee
                ),
            ));
        }
    }

    for (user, ids) in &snapshot.user_tasks {
        for id in ids {
            match snapshot.tasks.get(id) {
                None => violations.push(Violation::new(
                    Invariant::TaskOwnership,
                    vec![*id],
                    format!("task list of {} references missing task {}", user, id),
                )),
                Some(task) if &task.assignee != user => violations.push(Violation::new(
                    Invariant::TaskOwnership,
                    vec![*id],
                    format!(
                        "task {} is listed under {} but assigned to {}",
                        id, user, task.assignee
                    ),
                )),
                Some(_) => {}
            }
        }
    }

    violations
}

fn valid_task_ids(snapshot: &SystemSnapshot) -> Vec<Violation> {
    snapshot
        .tasks
        .keys()
        .filter_map(|id| {
            if id.0 < 1 {
                Some(Violation::new(
                    Invariant::ValidTaskIds,
                    vec![*id],
                    format!("invalid task ID {} (must be >= 1)", id),
                ))
            } else if *id >= snapshot.next_task_id {
                Some(Violation::new(
                    Invariant::ValidTaskIds,
                    vec![*id],
                    format!(
                        "task ID {} >= next task ID {}",
                        id, snapshot.next_task_id
                    ),
                ))
            } else {
                None
            }
        })
        .collect()
}

fn no_duplicate_task_ids(snapshot: &SystemSnapshot) -> Vec<Violation> {
    let mut seen: BTreeMap<TaskId, TaskId> = BTreeMap::new();
    let mut violations = Vec::new();
    for (key, task) in &snapshot.tasks {
        if *key != task.id {
            violations.push(Violation::new(
                Invariant::NoDuplicateTaskIds,
                vec![*key, task.id],
                format!("task map key {} doesn't match task ID {}", key, task.id),
            ));
        }
        if let Some(first) = seen.insert(task.id, *key) {
            violations.push(Violation::new(
                Invariant::NoDuplicateTaskIds,
                vec![first, *key],
                format!("duplicate task ID {}", task.id),
            ));
        }
    }
    violations
}

fn valid_status(snapshot: &SystemSnapshot) -> Vec<Violation> {
    snapshot
        .tasks
        .values()
        .filter(|task| !TaskStatus::ALL.contains(&task.status))
        .map(|task| {
            Violation::new(
                Invariant::ValidStatus,
                vec![task.id],
                format!("task {} has invalid status {:?}", task.id, task.status),
            )
        })
        .collect()
}

fn consistent_timestamps(snapshot: &SystemSnapshot, enforce_clock_bound: bool) -> Vec<Violation> {
    let mut violations = Vec::new();
    for task in snapshot.tasks.values() {
        if task.created_at > task.updated_at {
            violations.push(Violation::new(
                Invariant::ConsistentTimestamps,
                vec![task.id],
                format!(
                    "task {}: created_at ({}) > updated_at ({})",
                    task.id, task.created_at, task.updated_at
                ),
            ));
        }
        if enforce_clock_bound && task.updated_at > snapshot.clock {
            violations.push(Violation::new(
                Invariant::ConsistentTimestamps,
                vec![task.id],
                format!(
                    "task {}: updated_at ({}) > system clock ({})",
                    task.id, task.updated_at, snapshot.clock
                ),
            ));
        }
    }
    violations
}

fn acyclic_dependencies(snapshot: &SystemSnapshot) -> Vec<Violation> {
    dag::find_cycles(&snapshot.tasks)
        .into_iter()
        .map(|cycle| {
            let detail = format!(
                "cyclic dependency among tasks {}",
                cycle
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            Violation::new(Invariant::AcyclicDependencies, cycle, detail)
        })
        .collect()
}

fn authenticated_provenance(snapshot: &SystemSnapshot) -> Vec<Violation> {
    snapshot
        .tasks
        .values()
        .filter(|task| task.created_by.is_empty())
        .map(|task| {
            Violation::new(
                Invariant::AuthenticatedProvenance,
                vec![task.id],
                format!("task {} has no creator", task.id),
            )
        })
        .collect()
}

fn dependency_integrity(snapshot: &SystemSnapshot) -> Vec<Violation> {
    let mut violations = Vec::new();
    for task in snapshot.tasks.values() {
        for dep in &task.dependencies {
            if !snapshot.tasks.contains_key(dep) {
                violations.push(Violation::new(
                    Invariant::DependencyIntegrity,
                    vec![task.id, *dep],
                    format!("task {} has non-existent dependency {}", task.id, dep),
                ));
            }
        }
    }
    violations
}

fn single_active_session(snapshot: &SystemSnapshot) -> Vec<Violation> {
    let mut per_user: BTreeMap<&UserId, usize> = BTreeMap::new();
    for session in snapshot.valid_sessions() {
        *per_user.entry(&session.user_id).or_default() += 1;
    }
    per_user
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(user, count)| {
            Violation::new(
                Invariant::SingleActiveSession,
                Vec::new(),
                format!("user {} holds {} valid sessions", user, count),
            )
        })
        .collect()
}
