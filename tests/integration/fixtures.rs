//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - A service with registered users and an authenticated caller
//! - Driving a task into a given status along legal transitions

use taskflow::core::{Task, TaskId, TaskStatus, User, UserId};
use taskflow::{NewTask, TaskService};

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

pub fn user(id: &str) -> UserId {
    UserId::from(id)
}

/// A service with alice and bob registered and nobody logged in.
pub fn service_with_users() -> TaskService {
    let service = TaskService::default();
    for id in [ALICE, BOB] {
        service
            .register_user(User::new(id, id, &format!("{}@example.com", id)))
            .expect("Failed to register user");
    }
    service
}

/// A service with alice logged in.
pub fn service_as_alice() -> TaskService {
    let service = service_with_users();
    service
        .authenticate(&user(ALICE))
        .expect("Failed to authenticate alice");
    service
}

/// Create a task owned by alice with the given dependencies.
pub fn create_task(service: &TaskService, title: &str, deps: &[TaskId]) -> Task {
    service
        .create_task(
            NewTask::new(title, &format!("{} description", title), ALICE)
                .with_dependencies(deps.iter().copied()),
        )
        .expect("Failed to create task")
}

/// Shortest legal path from `pending` to each status.
pub fn path_to(status: TaskStatus) -> &'static [TaskStatus] {
    match status {
        TaskStatus::Pending => &[],
        TaskStatus::InProgress => &[TaskStatus::InProgress],
        TaskStatus::Completed => &[TaskStatus::InProgress, TaskStatus::Completed],
        TaskStatus::Cancelled => &[TaskStatus::Cancelled],
        TaskStatus::Blocked => &[TaskStatus::Blocked],
    }
}

/// Create a dependency-free task owned by alice and walk it into `status`.
pub fn task_in_status(service: &TaskService, status: TaskStatus) -> Task {
    let mut task = create_task(service, "walker", &[]);
    for next in path_to(status) {
        task = service
            .update_status(task.id, *next)
            .expect("Failed to walk task status");
    }
    assert_eq!(task.status, status);
    task
}

/// Every invariant must hold.
pub fn assert_consistent(service: &TaskService) {
    let violations = service.audit();
    assert!(violations.is_empty(), "unexpected violations: {:?}", violations);
}
