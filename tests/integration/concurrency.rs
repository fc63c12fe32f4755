//! Parallel callers sharing one store.

use std::collections::BTreeSet;

use crate::fixtures::{assert_consistent, service_as_alice, ALICE};
use taskflow::core::TaskId;
use taskflow::NewTask;

const CALLERS: usize = 8;
const PER_CALLER: usize = 25;

fn assert_dense(ids: &[TaskId], expected: usize) {
    let unique: BTreeSet<TaskId> = ids.iter().copied().collect();
    assert_eq!(unique.len(), expected, "duplicate ids handed out");
    let want: BTreeSet<TaskId> = (1..=expected as u64).map(TaskId).collect();
    assert_eq!(unique, want);
}

#[test]
fn test_concurrent_creates_with_threads() {
    let service = service_as_alice();

    let ids: Vec<TaskId> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..CALLERS)
            .map(|caller| {
                let service = service.clone();
                scope.spawn(move || {
                    (0..PER_CALLER)
                        .map(|n| {
                            let title = format!("caller {} task {}", caller, n);
                            service
                                .create_task(NewTask::new(&title, "parallel", ALICE))
                                .unwrap()
                                .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    assert_dense(&ids, CALLERS * PER_CALLER);
    assert_eq!(
        service.snapshot().next_task_id,
        TaskId((CALLERS * PER_CALLER) as u64 + 1)
    );
    assert_consistent(&service);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_with_blocking_tasks() {
    let service = service_as_alice();

    let mut handles = Vec::new();
    for caller in 0..CALLERS {
        let service = service.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let title = format!("caller {}", caller);
            service
                .create_task(NewTask::new(&title, "parallel", ALICE))
                .map(|task| task.id)
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }

    assert_dense(&ids, CALLERS);
    assert_consistent(&service);
}

#[test]
fn test_readers_run_alongside_writers() {
    let service = service_as_alice();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let reader = service.clone();
            scope.spawn(move || {
                for _ in 0..100 {
                    let snapshot = reader.snapshot();
                    // Every snapshot is internally consistent.
                    assert!(taskflow::invariants::InvariantChecker::new()
                        .check_all(&snapshot)
                        .is_ok());
                }
            });
        }
        for n in 0..50 {
            service
                .create_task(NewTask::new(&format!("w{}", n), "writer", ALICE))
                .unwrap();
        }
    });
    assert_eq!(service.list_tasks().len(), 50);
}
