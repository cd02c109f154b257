//! Task bodies and the handle tracking one submission.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::error;

use crate::core::disposable::{CompositeDisposable, Disposable, DisposableRef};
use crate::core::error::{rejected, Rejected};

/// A one-shot unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work run repeatedly by `schedule_periodically`.
pub type PeriodicTask = Box<dyn FnMut() + Send + 'static>;

/// Queued, not running.
const IDLE: u8 = 0;
/// Body is executing.
const RUNNING: u8 = 1;
/// Disposed while the body was executing.
const RUNNING_DISPOSED: u8 = 2;
/// Terminal: finished, failed or cancelled.
const DONE: u8 = 3;

enum TaskBody {
    Once(Task),
    Periodic(PeriodicTask),
}

/// Result of one [`TaskHandle::run`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The handle was disposed or is already running; nothing executed.
    Skipped,
    /// The body ran and the handle is now terminal.
    Finished,
    /// The body panicked; the handle is now terminal.
    Failed,
    /// A periodic body ran and wants to run again.
    Repeat,
}

/// Handle to one submitted task or periodic series.
///
/// State moves `IDLE -> RUNNING -> DONE` for one-shot tasks and cycles
/// `IDLE <-> RUNNING` for periodic ones. `dispose` on an idle task jumps
/// straight to `DONE`, so the body never starts. `dispose` on a running task
/// only marks it; the body is never interrupted.
pub struct TaskHandle {
    state: AtomicU8,
    body: Mutex<Option<TaskBody>>,
    parent: Option<Weak<CompositeDisposable>>,
    on_terminate: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl TaskHandle {
    fn new(body: TaskBody, parent: Option<Weak<CompositeDisposable>>) -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            body: Mutex::new(Some(body)),
            parent,
            on_terminate: Mutex::new(None),
        }
    }

    /// Untracked one-shot handle.
    #[must_use]
    pub fn once(task: Task) -> Arc<Self> {
        Arc::new(Self::new(TaskBody::Once(task), None))
    }

    /// Untracked periodic handle.
    #[must_use]
    pub fn periodic(task: PeriodicTask) -> Arc<Self> {
        Arc::new(Self::new(TaskBody::Periodic(task), None))
    }

    /// One-shot handle registered in `tasks`.
    ///
    /// Registration and the disposed check happen under the composite's lock,
    /// so a concurrent dispose of `tasks` either sees this handle or makes
    /// this call fail.
    ///
    /// # Errors
    ///
    /// Returns the stopped rejection if `tasks` is already disposed.
    pub fn tracked_once(
        task: Task,
        tasks: &Arc<CompositeDisposable>,
    ) -> Result<Arc<Self>, &'static Rejected> {
        Self::tracked(TaskBody::Once(task), tasks)
    }

    /// Periodic handle registered in `tasks`.
    ///
    /// # Errors
    ///
    /// Returns the stopped rejection if `tasks` is already disposed.
    pub fn tracked_periodic(
        task: PeriodicTask,
        tasks: &Arc<CompositeDisposable>,
    ) -> Result<Arc<Self>, &'static Rejected> {
        Self::tracked(TaskBody::Periodic(task), tasks)
    }

    fn tracked(
        body: TaskBody,
        tasks: &Arc<CompositeDisposable>,
    ) -> Result<Arc<Self>, &'static Rejected> {
        let handle = Arc::new(Self::new(body, Some(Arc::downgrade(tasks))));
        let member: DisposableRef = handle.clone();
        if tasks.add(member) {
            Ok(handle)
        } else {
            Err(rejected())
        }
    }

    /// Register a callback run once when the handle becomes terminal.
    ///
    /// If the handle is already terminal the callback runs immediately.
    pub fn on_terminate<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.on_terminate.lock();
        if self.state.load(Ordering::Acquire) == DONE {
            drop(slot);
            f();
        } else {
            *slot = Some(Box::new(f));
        }
    }

    /// Whether the handle reached its terminal state.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    /// Run the body once if the handle is idle.
    ///
    /// Panics raised by the body are caught and logged; they end the task (or
    /// series) but never escape into the calling executor.
    pub fn run(&self) -> RunOutcome {
        if self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return RunOutcome::Skipped;
        }
        let Some(body) = self.body.lock().take() else {
            self.finish();
            return RunOutcome::Skipped;
        };

        match body {
            TaskBody::Once(task) => {
                let outcome = match catch_unwind(AssertUnwindSafe(task)) {
                    Ok(()) => RunOutcome::Finished,
                    Err(_) => {
                        error!("scheduled task panicked");
                        RunOutcome::Failed
                    }
                };
                self.finish();
                outcome
            }
            TaskBody::Periodic(mut task) => {
                if catch_unwind(AssertUnwindSafe(|| task())).is_err() {
                    error!("periodic task panicked, cancelling further runs");
                    self.finish();
                    return RunOutcome::Failed;
                }
                *self.body.lock() = Some(TaskBody::Periodic(task));
                if self
                    .state
                    .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    RunOutcome::Repeat
                } else {
                    // Disposed mid-run.
                    self.body.lock().take();
                    self.finish();
                    RunOutcome::Finished
                }
            }
        }
    }

    /// Move to `DONE` and run the termination hooks.
    fn finish(&self) {
        self.state.store(DONE, Ordering::Release);
        self.after_terminal();
    }

    /// Cleanup after the single transition into `DONE`.
    fn after_terminal(&self) {
        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent.remove(self);
        }
        let hook = self.on_terminate.lock().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl Disposable for TaskHandle {
    fn dispose(&self) {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let next = match current {
                IDLE => DONE,
                RUNNING => RUNNING_DISPOSED,
                _ => return,
            };
            match self
                .state
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) if next == DONE => {
                    self.body.lock().take();
                    self.after_terminal();
                    return;
                }
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn is_disposed(&self) -> bool {
        matches!(
            self.state.load(Ordering::Acquire),
            RUNNING_DISPOSED | DONE
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::disposable::composite;
    use std::sync::atomic::AtomicUsize;

    fn counter_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_once_runs_and_terminates() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = TaskHandle::once(counter_task(&count));
        assert!(!handle.is_disposed());

        assert_eq!(handle.run(), RunOutcome::Finished);
        assert_eq!(handle.run(), RunOutcome::Skipped);
        assert!(handle.is_disposed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_before_run_prevents_run() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = TaskHandle::once(counter_task(&count));
        handle.dispose();
        handle.dispose();

        assert!(handle.is_disposed());
        assert_eq!(handle.run(), RunOutcome::Skipped);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_periodic_repeats_until_disposed() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let handle = TaskHandle::periodic(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(handle.run(), RunOutcome::Repeat);
        assert_eq!(handle.run(), RunOutcome::Repeat);
        assert!(!handle.is_disposed());

        handle.dispose();
        assert_eq!(handle.run(), RunOutcome::Skipped);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_task_is_contained() {
        let handle = TaskHandle::once(Box::new(|| panic!("boom")));
        assert_eq!(handle.run(), RunOutcome::Failed);
        assert!(handle.is_disposed());
    }

    #[test]
    fn test_panicking_periodic_stops_series() {
        let handle = TaskHandle::periodic(Box::new(|| panic!("boom")));
        assert_eq!(handle.run(), RunOutcome::Failed);
        assert_eq!(handle.run(), RunOutcome::Skipped);
        assert!(handle.is_terminated());
    }

    #[test]
    fn test_tracked_handle_leaves_composite_when_done() {
        let tasks = composite();
        let handle = TaskHandle::tracked_once(Box::new(|| {}), &tasks).unwrap();
        assert_eq!(tasks.len(), 1);

        handle.run();
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_tracked_on_disposed_composite_is_rejected() {
        let tasks = composite();
        tasks.dispose();

        let err = TaskHandle::tracked_once(Box::new(|| {}), &tasks).err().unwrap();
        assert!(err.is_same(rejected()));
    }

    #[test]
    fn test_on_terminate_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = TaskHandle::once(Box::new(|| {}));
        let counter = Arc::clone(&count);
        handle.on_terminate(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.dispose();
        handle.dispose();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let counter = Arc::clone(&count);
        handle.on_terminate(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
