//! Conformance suite run against every shipped backend.
//!
//! Each backend gets its own module with one test per check, so a failure
//! names both the backend and the violated guarantee.

use std::sync::Arc;

use prometheus_schedulers::backend::{
    ElasticScheduler, ExecutorScheduler, ImmediateScheduler, ParallelScheduler,
};
use prometheus_schedulers::conformance::ConformanceFlags;
use prometheus_schedulers::config::{SchedulerConfig, SchedulerKind};
use prometheus_schedulers::core::{Scheduler, SchedulerRef, Task};
use prometheus_schedulers::scheduler_conformance;

fn immediate() -> SchedulerRef {
    Arc::new(ImmediateScheduler::new())
}

fn single() -> SchedulerRef {
    Arc::new(ParallelScheduler::single("conformance-single").expect("single scheduler"))
}

fn parallel() -> SchedulerRef {
    Arc::new(ParallelScheduler::with_parallelism("conformance-parallel", 4).expect("parallel scheduler"))
}

fn bounded_parallel() -> SchedulerRef {
    let cfg = SchedulerConfig::new("conformance-bounded", SchedulerKind::Parallel)
        .with_parallelism(2)
        .with_max_pending_tasks(1024);
    Arc::new(ParallelScheduler::new(&cfg).expect("bounded scheduler"))
}

fn elastic() -> SchedulerRef {
    let cfg = SchedulerConfig::new("conformance-elastic", SchedulerKind::Elastic)
        .with_parallelism(8)
        .with_ttl_secs(1);
    Arc::new(ElasticScheduler::new(&cfg).expect("elastic scheduler"))
}

/// Executor scheduler over a small channel-fed thread pool.
fn executor() -> SchedulerRef {
    let (tx, rx) = crossbeam_channel::unbounded::<Task>();
    for _ in 0..2 {
        let rx = rx.clone();
        std::thread::spawn(move || {
            for task in rx {
                task();
            }
        });
    }
    Arc::new(ExecutorScheduler::new(tx))
}

fn executor_flags() -> ConformanceFlags {
    ConformanceFlags::from_capabilities(executor().capabilities())
}

scheduler_conformance!(immediate_conformance, immediate, ConformanceFlags::immediate());
scheduler_conformance!(single_conformance, single, ConformanceFlags::default());
scheduler_conformance!(parallel_conformance, parallel, ConformanceFlags::default());
scheduler_conformance!(bounded_parallel_conformance, bounded_parallel, ConformanceFlags::default());
scheduler_conformance!(elastic_conformance, elastic, ConformanceFlags::default());
scheduler_conformance!(executor_conformance, executor, executor_flags());

#[cfg(feature = "tokio-runtime")]
mod tokio_backend {
    use super::*;
    use prometheus_schedulers::runtime::TokioScheduler;

    fn tokio_scheduler() -> SchedulerRef {
        Arc::new(TokioScheduler::with_worker_threads("conformance-tokio", 2).expect("tokio runtime"))
    }

    scheduler_conformance!(tokio_conformance, tokio_scheduler, ConformanceFlags::default());
}

#[test]
fn test_flags_follow_capabilities() {
    let flags = ConformanceFlags::from_capabilities(parallel().capabilities());
    assert_eq!(flags, ConformanceFlags::default());

    let flags = executor_flags();
    assert!(!flags.check_direct_time_scheduling);
    assert!(!flags.check_worker_time_scheduling);
    assert!(!flags.check_support_restart);
}
