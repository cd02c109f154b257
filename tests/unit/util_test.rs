//! Tests for utility functions

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use prometheus_schedulers::util::{init_tracing, init_tracing_with, CountDownLatch, ThreadFactory};

#[test]
fn test_latch_releases_waiters() {
    let latch = Arc::new(CountDownLatch::new(2));
    let waiter = {
        let latch = Arc::clone(&latch);
        thread::spawn(move || latch.wait_timeout(Duration::from_secs(5)))
    };

    latch.count_down();
    latch.count_down();
    assert!(waiter.join().expect("waiter"));
}

#[test]
fn test_thread_factory_names() {
    let factory = ThreadFactory::new("util");
    let handle = factory
        .spawn(|| {
            assert_eq!(thread::current().name(), Some("util-1"));
        })
        .expect("spawn");
    handle.join().expect("join");
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    init_tracing_with("debug");
}
