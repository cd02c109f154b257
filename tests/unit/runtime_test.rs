//! Tests for the tokio scheduler

#![cfg(feature = "tokio-runtime")]

use std::sync::Arc;
use std::time::Duration;

use prometheus_schedulers::core::{Disposable, Scheduler, SchedulerError};
use prometheus_schedulers::runtime::TokioScheduler;
use prometheus_schedulers::util::CountDownLatch;

#[test]
fn test_tokio_scheduler_owned_runtime() {
    let scheduler = TokioScheduler::with_worker_threads("tokio-owned", 2).expect("runtime");
    assert_eq!(scheduler.name(), "tokio-owned");

    let latch = Arc::new(CountDownLatch::new(1));
    let l = Arc::clone(&latch);
    scheduler
        .schedule(Box::new(move || l.count_down()))
        .expect("schedule");
    assert!(latch.wait_timeout(Duration::from_secs(5)));
}

#[test]
fn test_tokio_scheduler_zero_threads() {
    let result = TokioScheduler::with_worker_threads("tokio-zero", 0);
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_scheduler_on_current_runtime() {
    let scheduler = TokioScheduler::new("tokio-current", tokio::runtime::Handle::current());
    let worker = scheduler.create_worker().expect("worker");

    let (tx, rx) = tokio::sync::oneshot::channel();
    worker
        .schedule(Box::new(move || {
            let _ = tx.send(123);
        }))
        .expect("schedule");

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
    assert_eq!(scheduler.active_workers(), 1);

    scheduler.dispose();
    assert!(worker.is_disposed());
}
