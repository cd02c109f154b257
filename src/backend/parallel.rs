//! Fixed-size scheduler backed by [`TimedExecutor`] threads.
//!
//! Direct tasks are spread round-robin over the threads. Each worker is
//! pinned to one thread for its whole life, which gives it FIFO ordering for
//! free; several workers may share a thread.
//!
//! Disposing the scheduler disposes all live workers, cancels all pending
//! direct tasks and shuts the threads down without waiting for them. `start`
//! spawns a fresh set of threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{error, info};

use crate::config::{SchedulerConfig, SchedulerKind};
use crate::core::disposable::Disposable;
use crate::core::error::{rejected, Rejected, SchedulerError};
use crate::core::executor::{ExecutorStats, TimedExecutor};
use crate::core::scheduler::{Capabilities, ScheduleResult, Scheduler, WorkerRef};
use crate::core::task::{PeriodicTask, Task, TaskHandle};
use crate::core::worker::{next_worker_id, register_worker, ExecutorWorker, Tracking};
use crate::util::thread::ThreadFactory;

/// One generation of threads plus everything issued from it.
struct Active {
    executors: Vec<Arc<TimedExecutor>>,
    tracking: Tracking,
}

impl Active {
    fn spawn(factory: &ThreadFactory, threads: usize, capacity: usize) -> std::io::Result<Self> {
        let executors = (0..threads)
            .map(|_| TimedExecutor::spawn(factory, capacity))
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self {
            executors,
            tracking: Tracking::new(),
        })
    }

    fn pick(&self, next: &AtomicUsize) -> &Arc<TimedExecutor> {
        let idx = next.fetch_add(1, Ordering::Relaxed) % self.executors.len();
        &self.executors[idx]
    }

    fn shutdown(&self) {
        self.tracking.dispose();
        for executor in &self.executors {
            executor.shutdown();
        }
    }
}

/// Scheduler over a fixed number of executor threads.
pub struct ParallelScheduler {
    name: String,
    threads: usize,
    capacity: usize,
    factory: ThreadFactory,
    /// `None` while disposed.
    state: RwLock<Option<Active>>,
    next: AtomicUsize,
}

impl ParallelScheduler {
    /// Build a scheduler from a `Single` or `Parallel` configuration.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidConfig` if the configuration does not validate
    /// or names another backend; `SchedulerError::ThreadSpawn` if a thread
    /// could not be created.
    pub fn new(config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        let threads = match config.kind {
            SchedulerKind::Single => 1,
            SchedulerKind::Parallel => config.parallelism,
            other => {
                return Err(SchedulerError::InvalidConfig(format!(
                    "{other:?} is not a parallel scheduler kind"
                )))
            }
        };

        let factory = ThreadFactory::new(&config.name).with_stack_size(config.thread_stack_size);
        let active = Active::spawn(&factory, threads, config.max_pending_tasks)?;

        info!(
            scheduler = %config.name,
            threads = threads,
            max_pending_tasks = config.max_pending_tasks,
            "Parallel scheduler started"
        );

        Ok(Self {
            name: config.name.clone(),
            threads,
            capacity: config.max_pending_tasks,
            factory,
            state: RwLock::new(Some(active)),
            next: AtomicUsize::new(0),
        })
    }

    /// `parallelism` threads with default settings.
    ///
    /// # Errors
    ///
    /// See [`ParallelScheduler::new`].
    pub fn with_parallelism(name: &str, parallelism: usize) -> Result<Self, SchedulerError> {
        Self::new(&SchedulerConfig::new(name, SchedulerKind::Parallel).with_parallelism(parallelism))
    }

    /// One thread with default settings.
    ///
    /// # Errors
    ///
    /// See [`ParallelScheduler::new`].
    pub fn single(name: &str) -> Result<Self, SchedulerError> {
        Self::new(&SchedulerConfig::new(name, SchedulerKind::Single))
    }

    /// Scheduler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of executor threads per generation.
    #[must_use]
    pub const fn parallelism(&self) -> usize {
        self.threads
    }

    /// Live workers of the current generation.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.state
            .read()
            .as_ref()
            .map_or(0, |active| active.tracking.workers.len())
    }

    /// Statistics summed over the current generation's threads.
    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        self.state.read().as_ref().map_or_else(ExecutorStats::default, |active| {
            active
                .executors
                .iter()
                .fold(ExecutorStats::default(), |acc, e| acc.merge(&e.stats()))
        })
    }

    fn submit<F>(&self, make: F, delay: Duration, period: Option<Duration>) -> ScheduleResult
    where
        F: FnOnce(&Tracking) -> Result<Arc<TaskHandle>, &'static Rejected>,
    {
        let state = self.state.read();
        let Some(active) = state.as_ref() else {
            return Err(rejected());
        };
        let handle = make(&active.tracking)?;
        if let Err(err) = active.pick(&self.next).submit(Arc::clone(&handle), delay, period) {
            handle.dispose();
            return Err(err);
        }
        Ok(handle)
    }
}

impl Disposable for ParallelScheduler {
    fn dispose(&self) {
        let Some(active) = self.state.write().take() else {
            return;
        };
        active.shutdown();
        info!(scheduler = %self.name, "Parallel scheduler disposed");
    }

    fn is_disposed(&self) -> bool {
        self.state.read().is_none()
    }
}

impl Scheduler for ParallelScheduler {
    fn schedule(&self, task: Task) -> ScheduleResult {
        self.submit(|t| t.track_once(task), Duration::ZERO, None)
    }

    fn schedule_delayed(&self, task: Task, delay: Duration) -> ScheduleResult {
        self.submit(|t| t.track_once(task), delay, None)
    }

    fn schedule_periodically(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        period: Duration,
    ) -> ScheduleResult {
        self.submit(|t| t.track_periodic(task), initial_delay, Some(period))
    }

    fn create_worker(&self) -> Result<WorkerRef, &'static Rejected> {
        let state = self.state.read();
        let Some(active) = state.as_ref() else {
            return Err(rejected());
        };
        let id = next_worker_id();
        let executor = Arc::clone(active.pick(&self.next));
        let registry = &active.tracking.workers;
        register_worker(registry, id, Arc::new(ExecutorWorker::new(id, executor, registry)))
    }

    fn start(&self) {
        if self.state.read().is_some() {
            return;
        }
        // Threads are spawned outside the lock; a concurrent `start` may win.
        let active = match Active::spawn(&self.factory, self.threads, self.capacity) {
            Ok(active) => active,
            Err(err) => {
                error!(scheduler = %self.name, error = %err, "Failed to restart parallel scheduler");
                return;
            }
        };
        let mut state = self.state.write();
        if state.is_some() {
            drop(state);
            active.shutdown();
            return;
        }
        *state = Some(active);
        drop(state);
        info!(scheduler = %self.name, threads = self.threads, "Parallel scheduler restarted");
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::timed()
    }
}

impl Drop for ParallelScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}
