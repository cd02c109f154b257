//! Tests for builder modules

use std::sync::Arc;
use std::time::Duration;

use prometheus_schedulers::builders::{build_schedulers, SchedulerBuilder};
use prometheus_schedulers::config::{SchedulerConfig, SchedulerKind};
use prometheus_schedulers::core::{Disposable, Scheduler, SchedulerError};
use prometheus_schedulers::util::CountDownLatch;

#[test]
fn test_scheduler_builder_defaults() {
    let builder = SchedulerBuilder::kind("pool1", SchedulerKind::Parallel)
        .parallelism(2)
        .max_pending_tasks(16);
    assert_eq!(builder.config().name, "pool1");
    assert_eq!(builder.config().parallelism, 2);
    assert_eq!(builder.config().max_pending_tasks, 16);
}

#[test]
fn test_built_scheduler_runs_tasks() {
    let scheduler = SchedulerBuilder::kind("built-parallel", SchedulerKind::Parallel)
        .parallelism(2)
        .build()
        .expect("build");

    let latch = Arc::new(CountDownLatch::new(4));
    for _ in 0..4 {
        let latch = Arc::clone(&latch);
        scheduler
            .schedule(Box::new(move || latch.count_down()))
            .expect("schedule");
    }
    assert!(latch.wait_timeout(Duration::from_secs(5)));
    scheduler.dispose();
    assert!(scheduler.is_disposed());
}

#[test]
fn test_build_immediate_is_not_time_capable() {
    let scheduler = SchedulerBuilder::kind("inline", SchedulerKind::Immediate)
        .build()
        .expect("build");
    let caps = scheduler.capabilities();
    assert!(!caps.direct_time_scheduling);
    assert!(!caps.worker_time_scheduling);
}

#[test]
fn test_build_rejects_invalid_config() {
    let result = SchedulerBuilder::kind("", SchedulerKind::Single).build();
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_build_schedulers_by_name() {
    let configs = vec![
        SchedulerConfig::new("inline", SchedulerKind::Immediate),
        SchedulerConfig::new("single", SchedulerKind::Single),
        SchedulerConfig::new("elastic", SchedulerKind::Elastic).with_parallelism(4),
    ];
    let schedulers = build_schedulers(&configs).expect("build all");
    assert_eq!(schedulers.len(), 3);
    assert!(schedulers["elastic"].capabilities().restart);

    for scheduler in schedulers.values() {
        scheduler.dispose();
    }
}
