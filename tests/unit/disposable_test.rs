//! Tests for disposables and task handles

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use prometheus_schedulers::core::{composite, disposed, from_fn, Disposable, DisposableRef, TaskHandle};

fn counting(counter: &Arc<AtomicUsize>) -> DisposableRef {
    let counter = Arc::clone(counter);
    from_fn(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn test_disposed_singleton() {
    assert!(disposed().is_disposed());
    assert!(Arc::ptr_eq(&disposed(), &disposed()));
}

#[test]
fn test_concurrent_dispose_runs_once() {
    let count = Arc::new(AtomicUsize::new(0));
    let d = counting(&count);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let d = Arc::clone(&d);
            thread::spawn(move || d.dispose())
        })
        .collect();
    for handle in handles {
        handle.join().expect("dispose thread");
    }

    assert!(d.is_disposed());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_composite_add_after_dispose() {
    let count = Arc::new(AtomicUsize::new(0));
    let c = composite();
    c.dispose();

    assert!(!c.add(counting(&count)));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(c.is_empty());
}

#[test]
fn test_composite_remove_does_not_dispose() {
    let count = Arc::new(AtomicUsize::new(0));
    let c = composite();
    let member = counting(&count);
    assert!(c.add(Arc::clone(&member)));
    assert_eq!(c.len(), 1);

    assert!(c.remove(member.as_ref()));
    assert!(!c.remove(member.as_ref()));
    c.dispose();
    assert!(!member.is_disposed());
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_composite_disposes_task_handles() {
    let ran = Arc::new(AtomicUsize::new(0));
    let tasks = composite();
    let handles: Vec<_> = (0..5)
        .map(|_| {
            let ran = Arc::clone(&ran);
            TaskHandle::tracked_once(
                Box::new(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                }),
                &tasks,
            )
            .expect("live composite")
        })
        .collect();

    tasks.dispose();
    for handle in &handles {
        assert!(handle.is_disposed());
        handle.run();
    }
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}
