//! Scheduler over a caller-supplied [`Executor`].
//!
//! The executor gives no ordering guarantee, so workers serialize their tasks
//! through a queue drained by at most one executor task at a time. Delayed
//! and periodic scheduling are not supported, and a disposed scheduler
//! cannot be restarted since the executor's lifecycle belongs to the caller.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::core::disposable::{composite, CompositeDisposable, Disposable};
use crate::core::error::{rejected, Rejected};
use crate::core::scheduler::{Capabilities, ScheduleResult, Scheduler, Worker, WorkerRef};
use crate::core::task::{Task, TaskHandle};
use crate::core::worker::{next_worker_id, register_worker, Tracking, WorkerRegistry};

/// Something that runs tasks, e.g. a thread pool owned by the caller.
pub trait Executor: Send + Sync {
    /// Run `task` at some point on some thread.
    ///
    /// # Errors
    ///
    /// The stopped rejection if the executor no longer accepts work.
    fn execute(&self, task: Task) -> Result<(), &'static Rejected>;
}

/// Feeds a channel whose receiving side runs the tasks.
impl Executor for Sender<Task> {
    fn execute(&self, task: Task) -> Result<(), &'static Rejected> {
        self.send(task).map_err(|_| rejected())
    }
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, task: Task) -> Result<(), &'static Rejected> {
        (**self).execute(task)
    }
}

/// Scheduler adapting an [`Executor`].
pub struct ExecutorScheduler {
    executor: Arc<dyn Executor>,
    /// `None` once disposed.
    state: RwLock<Option<Tracking>>,
}

impl ExecutorScheduler {
    /// Wrap `executor`.
    #[must_use]
    pub fn new<E>(executor: E) -> Self
    where
        E: Executor + 'static,
    {
        Self {
            executor: Arc::new(executor),
            state: RwLock::new(Some(Tracking::new())),
        }
    }

    /// Live workers.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.state.read().as_ref().map_or(0, |t| t.workers.len())
    }
}

impl Disposable for ExecutorScheduler {
    fn dispose(&self) {
        let Some(tracking) = self.state.write().take() else {
            return;
        };
        tracking.dispose();
        info!("Executor scheduler disposed");
    }

    fn is_disposed(&self) -> bool {
        self.state.read().is_none()
    }
}

impl Scheduler for ExecutorScheduler {
    fn schedule(&self, task: Task) -> ScheduleResult {
        let state = self.state.read();
        let Some(tracking) = state.as_ref() else {
            return Err(rejected());
        };
        let handle = tracking.track_once(task)?;
        let run = Arc::clone(&handle);
        if let Err(err) = self.executor.execute(Box::new(move || {
            run.run();
        })) {
            handle.dispose();
            return Err(err);
        }
        Ok(handle)
    }

    fn create_worker(&self) -> Result<WorkerRef, &'static Rejected> {
        let state = self.state.read();
        let Some(tracking) = state.as_ref() else {
            return Err(rejected());
        };
        let id = next_worker_id();
        let worker = SerialWorker::new(id, Arc::clone(&self.executor), &tracking.workers);
        register_worker(&tracking.workers, id, Arc::new(worker))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            direct_time_scheduling: false,
            worker_time_scheduling: false,
            restart: false,
            interrupt_on_dispose: false,
        }
    }
}

impl Drop for ExecutorScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Pending tasks of one worker plus the count of unprocessed submissions.
#[derive(Default)]
struct SerialQueue {
    pending: Mutex<VecDeque<Arc<TaskHandle>>>,
    wip: AtomicUsize,
}

impl SerialQueue {
    /// Run queued tasks until no submission is left unprocessed.
    fn drain(&self) {
        loop {
            let next = self.pending.lock().pop_front();
            if let Some(handle) = next {
                handle.run();
            }
            if self.wip.fetch_sub(1, Ordering::AcqRel) == 1 {
                return;
            }
        }
    }
}

/// Worker running its tasks one after another on the shared executor.
struct SerialWorker {
    id: u64,
    executor: Arc<dyn Executor>,
    tasks: Arc<CompositeDisposable>,
    registry: Weak<WorkerRegistry>,
    queue: Arc<SerialQueue>,
}

impl SerialWorker {
    fn new(id: u64, executor: Arc<dyn Executor>, registry: &Arc<WorkerRegistry>) -> Self {
        Self {
            id,
            executor,
            tasks: composite(),
            registry: Arc::downgrade(registry),
            queue: Arc::new(SerialQueue::default()),
        }
    }
}

impl Disposable for SerialWorker {
    fn dispose(&self) {
        if !self.tasks.dispose_once() {
            return;
        }
        self.queue.pending.lock().clear();
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }

    fn is_disposed(&self) -> bool {
        self.tasks.is_disposed()
    }
}

impl Worker for SerialWorker {
    fn schedule(&self, task: Task) -> ScheduleResult {
        let handle = TaskHandle::tracked_once(task, &self.tasks)?;
        self.queue.pending.lock().push_back(Arc::clone(&handle));
        if self.queue.wip.fetch_add(1, Ordering::AcqRel) == 0 {
            let queue = Arc::clone(&self.queue);
            if let Err(err) = self.executor.execute(Box::new(move || queue.drain())) {
                warn!(worker = self.id, "Executor refused the drain task, disposing worker");
                self.dispose();
                return Err(err);
            }
        }
        Ok(handle)
    }
}

impl Drop for SerialWorker {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::rejected_not_time_capable;
    use crate::util::CountDownLatch;
    use std::time::Duration;

    /// Executor running each task on a fresh thread, so ordering is up to
    /// the worker.
    struct ThreadPerTask;

    impl Executor for ThreadPerTask {
        fn execute(&self, task: Task) -> Result<(), &'static Rejected> {
            std::thread::spawn(task);
            Ok(())
        }
    }

    fn channel_executor() -> Sender<Task> {
        let (tx, rx) = crossbeam_channel::unbounded::<Task>();
        std::thread::spawn(move || {
            for task in rx {
                task();
            }
        });
        tx
    }

    #[test]
    fn test_direct_schedule_runs() {
        let scheduler = ExecutorScheduler::new(channel_executor());
        let latch = Arc::new(CountDownLatch::new(1));
        let l = Arc::clone(&latch);
        scheduler.schedule(Box::new(move || l.count_down())).unwrap();
        assert!(latch.wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_worker_is_fifo_on_unordered_executor() {
        let scheduler = ExecutorScheduler::new(ThreadPerTask);
        let worker = scheduler.create_worker().unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let latch = Arc::new(CountDownLatch::new(100));

        for i in 0..100 {
            let (order, latch) = (Arc::clone(&order), Arc::clone(&latch));
            worker
                .schedule(Box::new(move || {
                    order.lock().push(i);
                    latch.count_down();
                }))
                .unwrap();
        }

        assert!(latch.wait_timeout(Duration::from_secs(5)));
        assert_eq!(*order.lock(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_closed_channel_rejects() {
        let (tx, rx) = crossbeam_channel::unbounded::<Task>();
        drop(rx);
        let scheduler = ExecutorScheduler::new(tx);
        let err = scheduler.schedule(Box::new(|| {})).err().unwrap();
        assert!(err.is_same(rejected()));

        let worker = scheduler.create_worker().unwrap();
        assert!(worker.schedule(Box::new(|| {})).err().unwrap().is_same(rejected()));
        assert!(worker.is_disposed());
    }

    #[test]
    fn test_no_time_support_and_no_restart() {
        let scheduler = ExecutorScheduler::new(channel_executor());
        let err = scheduler
            .schedule_delayed(Box::new(|| {}), Duration::from_millis(1))
            .err()
            .unwrap();
        assert!(err.is_same(rejected_not_time_capable()));

        scheduler.dispose();
        scheduler.start();
        assert!(scheduler.is_disposed());
    }

    #[test]
    fn test_time_rejection_wins_over_stopped() {
        let scheduler = ExecutorScheduler::new(channel_executor());
        let worker = scheduler.create_worker().unwrap();
        scheduler.dispose();
        assert!(worker.is_disposed());

        let err = scheduler
            .schedule_delayed(Box::new(|| {}), Duration::from_millis(1))
            .err()
            .unwrap();
        assert!(err.is_same(rejected_not_time_capable()));
        let err = worker
            .schedule_periodically(Box::new(|| {}), Duration::ZERO, Duration::from_millis(1))
            .err()
            .unwrap();
        assert!(err.is_same(rejected_not_time_capable()));
        assert!(scheduler.schedule(Box::new(|| {})).err().unwrap().is_same(rejected()));
    }
}
