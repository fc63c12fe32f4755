//! Dependency rules over the task graph.
//!
//! Edges point from a task to the tasks it depends on. All functions here
//! are pure: they read a task map and never mutate it, so the operation
//! layer can evaluate them before touching the store.

use crate::core::task::{Task, TaskId, TaskStatus};
use crate::error::{Error, Result};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use std::collections::btree_set;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Task map as seen by the dependency rules.
pub type TaskMap = BTreeMap<TaskId, Task>;

static NO_DEPENDENCIES: BTreeSet<TaskId> = BTreeSet::new();

/// Check a requested dependency set against the current tasks.
///
/// # Errors
/// - `DependencyNotFound` if an id is not a known task
/// - `DependencyCancelled` if a dependency has been cancelled
pub fn validate_dependencies(deps: &BTreeSet<TaskId>, tasks: &TaskMap) -> Result<()> {
    for dep in deps {
        let task = tasks.get(dep).ok_or(Error::DependencyNotFound(*dep))?;
        if task.status == TaskStatus::Cancelled {
            return Err(Error::DependencyCancelled(*dep));
        }
    }
    Ok(())
}

/// One level of the explicit DFS stack: the node being expanded and the
/// position reached in its dependency set.
struct Frame<'a> {
    node: TaskId,
    deps: btree_set::Iter<'a, TaskId>,
}

/// Look for a cycle through `start` if its dependencies were `hypothetical`.
///
/// `start` does not need to exist in `tasks`; its stored edges (if any) are
/// ignored in favour of the hypothetical set. The traversal uses an explicit
/// stack, so deep chains cannot overflow the call stack.
///
/// Returns the offending path, beginning and ending with the same id, when
/// a back-edge into the current recursion path is found.
pub fn detect_cycle(
    start: TaskId,
    hypothetical: &BTreeSet<TaskId>,
    tasks: &TaskMap,
) -> Option<Vec<TaskId>> {
    let edges = |id: TaskId| edges_of(id, start, hypothetical, tasks);

    let mut visited: HashSet<TaskId> = HashSet::new();
    let mut on_path: HashSet<TaskId> = HashSet::new();
    let mut stack = vec![Frame {
        node: start,
        deps: edges(start),
    }];
    visited.insert(start);
    on_path.insert(start);

    while let Some(frame) = stack.last_mut() {
        let node = frame.node;
        match frame.deps.next().copied() {
            Some(dep) => {
                if on_path.contains(&dep) {
                    let mut path: Vec<TaskId> = stack
                        .iter()
                        .map(|f| f.node)
                        .skip_while(|n| *n != dep)
                        .collect();
                    path.push(dep);
                    return Some(path);
                }
                if visited.insert(dep) {
                    on_path.insert(dep);
                    stack.push(Frame {
                        node: dep,
                        deps: edges(dep),
                    });
                }
            }
            None => {
                on_path.remove(&node);
                stack.pop();
            }
        }
    }

    None
}

fn edges_of<'a>(
    id: TaskId,
    start: TaskId,
    hypothetical: &'a BTreeSet<TaskId>,
    tasks: &'a TaskMap,
) -> btree_set::Iter<'a, TaskId> {
    if id == start {
        hypothetical.iter()
    } else {
        tasks
            .get(&id)
            .map(|t| t.dependencies.iter())
            .unwrap_or_else(|| NO_DEPENDENCIES.iter())
    }
}

/// Same as [`detect_cycle`] but as a `Result` for use in preconditions.
pub fn ensure_acyclic(start: TaskId, deps: &BTreeSet<TaskId>, tasks: &TaskMap) -> Result<()> {
    match detect_cycle(start, deps, tasks) {
        Some(path) => Err(Error::CycleDetected { path }),
        None => Ok(()),
    }
}

/// Status a new task should start in.
///
/// `Pending` when there are no dependencies or all are completed,
/// `Blocked` otherwise.
pub fn initial_status(deps: &BTreeSet<TaskId>, tasks: &TaskMap) -> TaskStatus {
    if all_completed(deps, tasks) {
        TaskStatus::Pending
    } else {
        TaskStatus::Blocked
    }
}

/// The first dependency of `task` that has not completed yet.
///
/// Ids missing from `tasks` are skipped; the dependency-integrity
/// invariant reports those separately.
pub fn first_incomplete_dependency(task: &Task, tasks: &TaskMap) -> Option<TaskId> {
    task.dependencies.iter().copied().find(|dep| {
        tasks
            .get(dep)
            .is_some_and(|d| d.status != TaskStatus::Completed)
    })
}

/// Check if every dependency of `task` has completed.
pub fn dependencies_completed(task: &Task, tasks: &TaskMap) -> bool {
    first_incomplete_dependency(task, tasks).is_none()
}

/// A blocked task whose dependencies are all completed can go back to pending.
pub fn should_unblock(task: &Task, tasks: &TaskMap) -> bool {
    task.status == TaskStatus::Blocked && dependencies_completed(task, tasks)
}

/// Ids of every task that lists `id` as a dependency, regardless of status.
pub fn dependents_of(id: TaskId, tasks: &TaskMap) -> Vec<TaskId> {
    tasks
        .values()
        .filter(|t| t.depends_on(id))
        .map(|t| t.id)
        .collect()
}

fn all_completed(deps: &BTreeSet<TaskId>, tasks: &TaskMap) -> bool {
    deps.iter().all(|dep| {
        tasks
            .get(dep)
            .map_or(true, |d| d.status == TaskStatus::Completed)
    })
}

/// Every dependency cycle in the graph, as strongly connected components.
///
/// Components of size one are only reported when the task depends on itself.
/// Used by the invariant engine to name the ids involved in a violation.
pub fn find_cycles(tasks: &TaskMap) -> Vec<Vec<TaskId>> {
    let mut graph: DiGraphMap<TaskId, ()> = DiGraphMap::new();
    for task in tasks.values() {
        graph.add_node(task.id);
        for dep in &task.dependencies {
            graph.add_edge(task.id, *dep, ());
        }
    }

    let mut cycles: Vec<Vec<TaskId>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.contains_edge(component[0], component[0])
        })
        .map(|mut component| {
            component.sort();
            component
        })
        .collect();
    cycles.sort();
    cycles
}
