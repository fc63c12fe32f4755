//! Authentication, sessions and assignee-only operations.

use crate::fixtures::{
    assert_consistent, create_task, service_as_alice, service_with_users, user, ALICE, BOB,
};
use taskflow::core::{Priority, TaskStatus};
use taskflow::{Error, ErrorClass, NewTask, TaskDetails};

#[test]
fn test_mutations_require_authentication() {
    let service = service_with_users();
    let err = service
        .create_task(NewTask::new("t", "d", ALICE))
        .unwrap_err();
    assert!(matches!(err, Error::NotAuthenticated));
    assert_eq!(err.class(), ErrorClass::Authorization);
    assert!(service.list_tasks().is_empty());
}

#[test]
fn test_one_valid_session_per_user() {
    let service = service_with_users();
    let session = service.authenticate(&user(ALICE)).unwrap();
    assert!(session.is_valid_at(service.snapshot().clock));

    assert!(matches!(
        service.authenticate(&user(ALICE)),
        Err(Error::SessionExists(_))
    ));

    // Another user can log in; they become the current user.
    service.authenticate(&user(BOB)).unwrap();
    assert_eq!(service.current_user(), Some(user(BOB)));

    let snapshot = service.snapshot();
    assert_eq!(snapshot.valid_sessions().count(), 2);
    assert_consistent(&service);
}

#[test]
fn test_logout_removes_session() {
    let service = service_as_alice();
    service.logout(&user(ALICE)).unwrap();

    let snapshot = service.snapshot();
    assert!(snapshot.current_user.is_none());
    assert_eq!(snapshot.valid_sessions().count(), 0);
    assert!(snapshot.sessions.is_empty());

    service.authenticate(&user(ALICE)).unwrap();
    assert_eq!(service.snapshot().valid_sessions().count(), 1);
}

#[test]
fn test_session_table_stays_bounded() {
    let service = service_with_users();
    for round in 0..100 {
        let who = if round % 2 == 0 { ALICE } else { BOB };
        service.authenticate(&user(who)).unwrap();
        service.logout(&user(who)).unwrap();
    }
    assert!(service.snapshot().sessions.is_empty());

    // Logging out one user leaves the other's session alone.
    service.authenticate(&user(ALICE)).unwrap();
    service.authenticate(&user(BOB)).unwrap();
    service.logout(&user(BOB)).unwrap();
    let snapshot = service.snapshot();
    assert_eq!(snapshot.sessions.len(), 1);
    assert_eq!(snapshot.sessions[0].user_id, user(ALICE));
    assert_consistent(&service);
}

#[test]
fn test_only_assignee_may_mutate() {
    let service = service_as_alice();
    let task = service
        .create_task(NewTask::new("for bob", "d", BOB))
        .unwrap();
    assert_eq!(task.created_by, user(ALICE));

    let details = TaskDetails {
        title: "x".to_string(),
        description: "y".to_string(),
        due_date: None,
    };
    let attempts = [
        service.update_status(task.id, TaskStatus::InProgress).err(),
        service.update_priority(task.id, Priority::Low).err(),
        service.update_details(task.id, details).err(),
        service.reassign(task.id, &user(ALICE)).err(),
        service
            .bulk_update_status(&[task.id], TaskStatus::Cancelled)
            .err(),
        service.delete_task(task.id).err(),
    ];
    for err in attempts {
        assert!(
            matches!(err, Some(Error::NotOwner { .. })),
            "expected NotOwner, got {:?}",
            err
        );
    }
    assert_eq!(service.get_task(task.id).unwrap(), task);
}

#[test]
fn test_reassign_moves_between_indexes() {
    let service = service_as_alice();
    let task = create_task(&service, "handoff", &[]);
    service.reassign(task.id, &user(BOB)).unwrap();

    let snapshot = service.snapshot();
    assert!(snapshot.user_task_ids(&user(ALICE)).next().is_none());
    assert_eq!(
        snapshot.user_task_ids(&user(BOB)).collect::<Vec<_>>(),
        vec![task.id]
    );
    assert_consistent(&service);

    // Bob can now work on it.
    service.logout(&user(ALICE)).unwrap();
    service.authenticate(&user(BOB)).unwrap();
    service
        .update_status(task.id, TaskStatus::InProgress)
        .unwrap();
}

#[test]
fn test_reader_never_sees_task_in_zero_or_two_indexes() {
    let service = service_as_alice();
    let task = create_task(&service, "ping-pong", &[]);

    // Alice hands the task to bob and bob hands it back, over and over,
    // while a reader keeps counting index entries.
    std::thread::scope(|scope| {
        let reader = service.clone();
        let handle = scope.spawn(move || {
            for _ in 0..500 {
                let snapshot = reader.snapshot();
                let holders = snapshot
                    .user_tasks
                    .values()
                    .filter(|ids| ids.contains(&task.id))
                    .count();
                assert_eq!(holders, 1);
            }
        });

        for _ in 0..50 {
            service.reassign(task.id, &user(BOB)).unwrap();
            service.logout(&user(ALICE)).unwrap();
            service.authenticate(&user(BOB)).unwrap();
            service.reassign(task.id, &user(ALICE)).unwrap();
            service.logout(&user(BOB)).unwrap();
            service.authenticate(&user(ALICE)).unwrap();
        }
        handle.join().unwrap();
    });
    assert_consistent(&service);
}
