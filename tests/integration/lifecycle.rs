//! Transition table and the end-to-end task lifecycle.

use crate::fixtures::{
    assert_consistent, create_task, service_as_alice, task_in_status, user, ALICE,
};
use taskflow::core::transitions::is_legal;
use taskflow::core::TaskStatus;
use taskflow::{Error, ErrorClass};

#[test]
fn test_every_legal_transition_succeeds() {
    for from in TaskStatus::ALL {
        for to in TaskStatus::ALL {
            if !is_legal(from, to) {
                continue;
            }
            let service = service_as_alice();
            let task = task_in_status(&service, from);
            let updated = service
                .update_status(task.id, to)
                .unwrap_or_else(|e| panic!("{} -> {} should succeed: {}", from, to, e));
            assert_eq!(updated.status, to);
            assert_eq!(service.get_task(task.id).unwrap().status, to);
            assert_consistent(&service);
        }
    }
}

#[test]
fn test_every_illegal_transition_fails() {
    for from in TaskStatus::ALL {
        for to in TaskStatus::ALL {
            if is_legal(from, to) {
                continue;
            }
            let service = service_as_alice();
            let task = task_in_status(&service, from);
            let before = service.get_task(task.id).unwrap();

            let err = service.update_status(task.id, to).unwrap_err();
            assert!(
                matches!(err, Error::InvalidTransition { .. }),
                "{} -> {} gave {:?}",
                from,
                to,
                err
            );
            assert_eq!(err.class(), ErrorClass::Precondition);
            assert_eq!(service.get_task(task.id).unwrap(), before);
        }
    }
}

#[test]
fn test_dependents_block_deletion_even_when_completed() {
    let service = service_as_alice();

    let a = create_task(&service, "A", &[]);
    assert_eq!(a.status, TaskStatus::Pending);

    let b = create_task(&service, "B", &[a.id]);
    assert_eq!(b.status, TaskStatus::Blocked);

    service.update_status(a.id, TaskStatus::InProgress).unwrap();
    service.update_status(a.id, TaskStatus::Completed).unwrap();

    assert_eq!(service.check_dependencies().unwrap(), 1);
    assert_eq!(service.get_task(b.id).unwrap().status, TaskStatus::Pending);

    let err = service.delete_task(a.id).unwrap_err();
    match err {
        Error::HasDependents { task, dependents } => {
            assert_eq!(task, a.id);
            assert_eq!(dependents, vec![b.id]);
        }
        other => panic!("Expected HasDependents, got {:?}", other),
    }
    assert!(service.get_task(a.id).is_some());
    assert_consistent(&service);
}

#[test]
fn test_delete_terminal_task_without_dependents() {
    for status in [TaskStatus::Completed, TaskStatus::Cancelled] {
        let service = service_as_alice();
        let task = task_in_status(&service, status);

        let removed = service.delete_task(task.id).unwrap();
        assert_eq!(removed.id, task.id);
        assert!(service.get_task(task.id).is_none());
        assert!(service.tasks_for_user(&user(ALICE)).is_empty());
        assert_consistent(&service);
    }
}

#[test]
fn test_delete_non_terminal_fails() {
    for status in [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Blocked,
    ] {
        let service = service_as_alice();
        let task = task_in_status(&service, status);
        assert!(matches!(
            service.delete_task(task.id),
            Err(Error::NotTerminal { .. })
        ));
    }
}

#[test]
fn test_ids_are_never_reused() {
    let service = service_as_alice();
    let first = task_in_status(&service, TaskStatus::Cancelled);
    service.delete_task(first.id).unwrap();

    let second = create_task(&service, "next", &[]);
    assert!(second.id > first.id);
    assert_eq!(service.snapshot().next_task_id, second.id.next().unwrap());
}

#[test]
fn test_timestamps_move_forward() {
    let service = service_as_alice();
    let task = create_task(&service, "clock", &[]);
    assert_eq!(task.created_at, task.updated_at);

    let updated = service
        .update_status(task.id, TaskStatus::InProgress)
        .unwrap();
    assert!(updated.updated_at >= task.updated_at);
    assert_eq!(updated.created_at, task.created_at);
    assert!(updated.updated_at <= service.snapshot().clock);
}
