//! Scheduler that runs every task synchronously on the caller's thread.
//!
//! There is no background state, so the scheduler itself is never disposed
//! and `dispose` is a no-op. Workers still track their own disposed flag and
//! reject work once disposed. Delayed and periodic scheduling are not
//! supported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::disposable::{disposed, Disposable};
use crate::core::error::{rejected, Rejected};
use crate::core::scheduler::{Capabilities, ScheduleResult, Scheduler, Worker, WorkerRef};
use crate::core::task::{Task, TaskHandle};

/// Caller's-thread scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateScheduler;

impl ImmediateScheduler {
    /// Create the scheduler. It holds no state, so instances are interchangeable.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Run `task` inline; the returned handle is already disposed.
fn run_inline(task: Task) -> ScheduleResult {
    TaskHandle::once(task).run();
    Ok(disposed())
}

impl Disposable for ImmediateScheduler {
    fn dispose(&self) {}

    fn is_disposed(&self) -> bool {
        false
    }
}

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, task: Task) -> ScheduleResult {
        run_inline(task)
    }

    fn create_worker(&self) -> Result<WorkerRef, &'static Rejected> {
        Ok(Arc::new(ImmediateWorker::default()))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            direct_time_scheduling: false,
            worker_time_scheduling: false,
            restart: true,
            interrupt_on_dispose: false,
        }
    }
}

/// Worker of the [`ImmediateScheduler`].
#[derive(Debug, Default)]
struct ImmediateWorker {
    shutdown: AtomicBool,
}

impl Disposable for ImmediateWorker {
    fn dispose(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

impl Worker for ImmediateWorker {
    fn schedule(&self, task: Task) -> ScheduleResult {
        if self.is_disposed() {
            return Err(rejected());
        }
        run_inline(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::rejected_not_time_capable;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_runs_on_caller_thread() {
        let caller = std::thread::current().id();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let s = Arc::clone(&seen);

        let handle = ImmediateScheduler::new()
            .schedule(Box::new(move || {
                *s.lock() = Some(std::thread::current().id());
            }))
            .unwrap();

        assert!(handle.is_disposed());
        assert_eq!(*seen.lock(), Some(caller));
    }

    #[test]
    fn test_never_disposed() {
        let scheduler = ImmediateScheduler::new();
        scheduler.dispose();
        assert!(!scheduler.is_disposed());
        assert!(scheduler.schedule(Box::new(|| {})).is_ok());
    }

    #[test]
    fn test_time_scheduling_not_supported() {
        let scheduler = ImmediateScheduler::new();
        let err = scheduler
            .schedule_delayed(Box::new(|| {}), Duration::from_millis(10))
            .err()
            .unwrap();
        assert!(err.is_same(rejected_not_time_capable()));
    }

    #[test]
    fn test_worker_rejects_after_dispose() {
        let worker = ImmediateScheduler::new().create_worker().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        worker
            .schedule(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        worker.dispose();
        let err = worker.schedule(Box::new(|| {})).err().unwrap();
        assert!(err.is_same(rejected()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disposed_worker_still_reports_not_time_capable() {
        let worker = ImmediateScheduler::new().create_worker().unwrap();
        worker.dispose();

        let err = worker
            .schedule_delayed(Box::new(|| {}), Duration::from_millis(10))
            .err()
            .unwrap();
        assert!(err.is_same(rejected_not_time_capable()));
        assert!(worker.schedule(Box::new(|| {})).err().unwrap().is_same(rejected()));
    }
}
