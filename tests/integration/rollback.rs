//! A mutation whose postcondition check fails leaves no trace.

use crate::fixtures::{create_task, service_as_alice, user, ALICE};
use taskflow::core::{Priority, TaskStatus};
use taskflow::invariants::Invariant;
use taskflow::state::{Store, SystemStateRepository, TaskRepository};
use taskflow::{Error, ErrorClass, NewTask};

#[test]
fn test_failed_verification_restores_store() {
    let service = service_as_alice();
    let existing = create_task(&service, "existing", &[]);

    // Corrupt the index behind the operation layer's back.
    service
        .store()
        .write(|state| state.remove_user_task(&user(ALICE), existing.id));
    let corrupted = service.snapshot();

    let err = service
        .create_task(NewTask::new("new", "d", ALICE))
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::InvariantViolation);
    match &err {
        Error::InvariantViolation(violation) => {
            assert_eq!(violation.invariant, Invariant::NoOrphanTasks);
            assert_eq!(violation.task_ids, vec![existing.id]);
        }
        other => panic!("Expected InvariantViolation, got {:?}", other),
    }

    // Nothing from the rejected create survived: no task, no id consumed.
    let after = service.snapshot();
    assert_eq!(after.tasks, corrupted.tasks);
    assert_eq!(after.next_task_id, corrupted.next_task_id);
    assert_eq!(after.user_tasks, corrupted.user_tasks);
}

#[test]
fn test_repair_then_continue() {
    let service = service_as_alice();
    let task = create_task(&service, "existing", &[]);

    service
        .store()
        .write(|state| state.remove_user_task(&user(ALICE), task.id));
    assert!(service
        .update_priority(task.id, Priority::High)
        .is_err());
    assert_eq!(service.get_task(task.id).unwrap().priority, Priority::Medium);
    assert_eq!(service.audit().len(), 2);

    service
        .store()
        .write(|state| state.add_user_task(&user(ALICE), task.id));
    assert!(service.audit().is_empty());
    service.update_priority(task.id, Priority::High).unwrap();
}

#[test]
fn test_rejected_precondition_changes_nothing() {
    let service = service_as_alice();
    let task = create_task(&service, "existing", &[]);
    let before = service.snapshot();

    assert!(service
        .update_status(task.id, TaskStatus::Completed)
        .is_err());
    let after = service.snapshot();
    assert_eq!(after.tasks, before.tasks);
    assert_eq!(after.clock, before.clock);
}

#[test]
fn test_failed_bulk_update_restores_every_task() {
    let service = service_as_alice();
    let a = create_task(&service, "A", &[]);
    let b = create_task(&service, "B", &[]);

    // Drop b from the index so verification fails after the batch applies.
    service
        .store()
        .write(|state| state.remove_user_task(&user(ALICE), b.id));
    assert!(matches!(
        service.bulk_update_status(&[a.id, b.id], TaskStatus::InProgress),
        Err(Error::InvariantViolation(_))
    ));
    service.store().read(|state| {
        assert_eq!(state.task(a.id).unwrap().status, TaskStatus::Pending);
        assert_eq!(state.task(b.id).unwrap().status, TaskStatus::Pending);
    });
}
