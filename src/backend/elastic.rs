//! Scheduler that grows a thread per busy worker and caches idle threads.
//!
//! A worker (or a direct task) checks an executor out of the cache and hands
//! it back when it terminates. Idle executors older than the TTL are shut
//! down by a small evictor thread. Once `parallelism` executors are busy,
//! new work shares the existing ones round-robin instead of spawning more.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::config::{SchedulerConfig, SchedulerKind};
use crate::core::disposable::Disposable;
use crate::core::error::{rejected, Rejected, SchedulerError};
use crate::core::executor::TimedExecutor;
use crate::core::scheduler::{Capabilities, ScheduleResult, Scheduler, WorkerRef};
use crate::core::task::{PeriodicTask, Task, TaskHandle};
use crate::core::worker::{next_worker_id, register_worker, ExecutorWorker, Tracking};
use crate::util::thread::ThreadFactory;

struct Busy {
    executor: Arc<TimedExecutor>,
    users: usize,
}

#[derive(Default)]
struct Slots {
    idle: VecDeque<(Arc<TimedExecutor>, Instant)>,
    busy: Vec<Busy>,
    next: usize,
}

/// Pool of executors for one scheduler generation.
struct ExecutorCache {
    factory: ThreadFactory,
    capacity: usize,
    max_busy: usize,
    ttl: Duration,
    slots: Mutex<Slots>,
    closed: AtomicBool,
}

impl ExecutorCache {
    fn new(factory: ThreadFactory, capacity: usize, max_busy: usize, ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            factory,
            capacity,
            max_busy,
            ttl,
            slots: Mutex::new(Slots::default()),
            closed: AtomicBool::new(false),
        })
    }

    /// Check out an executor: most recently idle first, then a new thread,
    /// then a shared busy one once the cap is reached.
    fn acquire(&self) -> std::io::Result<Arc<TimedExecutor>> {
        let mut slots = self.slots.lock();
        if let Some((executor, _)) = slots.idle.pop_back() {
            slots.busy.push(Busy {
                executor: Arc::clone(&executor),
                users: 1,
            });
            return Ok(executor);
        }
        if slots.busy.len() < self.max_busy {
            let executor = TimedExecutor::spawn(&self.factory, self.capacity)?;
            slots.busy.push(Busy {
                executor: Arc::clone(&executor),
                users: 1,
            });
            return Ok(executor);
        }
        let idx = slots.next % slots.busy.len();
        slots.next = slots.next.wrapping_add(1);
        let busy = &mut slots.busy[idx];
        busy.users += 1;
        Ok(Arc::clone(&busy.executor))
    }

    /// Return a checked-out executor. The last user parks it as idle, or
    /// shuts it down if the cache is closed.
    fn release(&self, executor: &Arc<TimedExecutor>) {
        let mut slots = self.slots.lock();
        let Some(idx) = slots
            .busy
            .iter()
            .position(|b| Arc::ptr_eq(&b.executor, executor))
        else {
            return;
        };
        slots.busy[idx].users -= 1;
        if slots.busy[idx].users > 0 {
            return;
        }
        let Busy { executor, .. } = slots.busy.swap_remove(idx);
        if self.closed.load(Ordering::Acquire) || executor.is_shutdown() {
            drop(slots);
            executor.shutdown();
        } else {
            slots.idle.push_back((executor, Instant::now()));
        }
    }

    /// Shut down executors idle for longer than the TTL.
    fn evict(&self) {
        let now = Instant::now();
        let expired: VecDeque<_> = {
            let mut slots = self.slots.lock();
            let (keep, expired): (VecDeque<_>, VecDeque<_>) = slots
                .idle
                .drain(..)
                .partition(|(_, since)| now.duration_since(*since) < self.ttl);
            slots.idle = keep;
            expired
        };
        if !expired.is_empty() {
            debug!(evicted = expired.len(), "Evicting idle elastic threads");
        }
        for (executor, _) in expired {
            executor.shutdown();
        }
    }

    /// Stop reuse and shut down every idle executor. Busy ones are shut down
    /// as their last user releases them.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let idle: Vec<_> = self.slots.lock().idle.drain(..).collect();
        for (executor, _) in idle {
            executor.shutdown();
        }
    }

    fn counts(&self) -> (usize, usize) {
        let slots = self.slots.lock();
        (slots.idle.len(), slots.busy.len())
    }
}

struct Active {
    cache: Arc<ExecutorCache>,
    evictor: Arc<TimedExecutor>,
    tracking: Tracking,
}

impl Active {
    fn spawn(
        factory: &ThreadFactory,
        evictor_factory: &ThreadFactory,
        capacity: usize,
        max_busy: usize,
        ttl: Duration,
    ) -> std::io::Result<Self> {
        let cache = ExecutorCache::new(factory.clone(), capacity, max_busy, ttl);
        let evictor = TimedExecutor::spawn(evictor_factory, 0)?;
        let evict_cache = Arc::clone(&cache);
        evictor
            .submit(
                TaskHandle::periodic(Box::new(move || evict_cache.evict())),
                ttl,
                Some(ttl),
            )
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(Self {
            cache,
            evictor,
            tracking: Tracking::new(),
        })
    }

    fn shutdown(&self) {
        self.evictor.shutdown();
        self.cache.close();
        self.tracking.dispose();
    }
}

/// Scheduler with on-demand executor threads.
pub struct ElasticScheduler {
    name: String,
    capacity: usize,
    max_busy: usize,
    ttl: Duration,
    factory: ThreadFactory,
    evictor_factory: ThreadFactory,
    /// `None` while disposed.
    state: RwLock<Option<Active>>,
}

impl ElasticScheduler {
    /// Build a scheduler from an `Elastic` configuration.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidConfig` for an invalid or non-elastic
    /// configuration; `SchedulerError::ThreadSpawn` if the evictor thread
    /// could not be created.
    pub fn new(config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        if config.kind != SchedulerKind::Elastic {
            return Err(SchedulerError::InvalidConfig(format!(
                "{:?} is not an elastic scheduler kind",
                config.kind
            )));
        }

        let factory = ThreadFactory::new(&config.name).with_stack_size(config.thread_stack_size);
        let evictor_factory = ThreadFactory::new(&format!("{}-evictor", config.name));
        let ttl = Duration::from_secs(config.ttl_secs);
        let active = Active::spawn(
            &factory,
            &evictor_factory,
            config.max_pending_tasks,
            config.parallelism,
            ttl,
        )?;

        info!(
            scheduler = %config.name,
            max_threads = config.parallelism,
            ttl_secs = config.ttl_secs,
            "Elastic scheduler started"
        );

        Ok(Self {
            name: config.name.clone(),
            capacity: config.max_pending_tasks,
            max_busy: config.parallelism,
            ttl,
            factory,
            evictor_factory,
            state: RwLock::new(Some(active)),
        })
    }

    /// Default settings under `name`.
    ///
    /// # Errors
    ///
    /// See [`ElasticScheduler::new`].
    pub fn with_name(name: &str) -> Result<Self, SchedulerError> {
        Self::new(&SchedulerConfig::new(name, SchedulerKind::Elastic))
    }

    /// Scheduler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executor threads currently parked in the cache.
    #[must_use]
    pub fn idle_threads(&self) -> usize {
        self.state.read().as_ref().map_or(0, |a| a.cache.counts().0)
    }

    /// Executor threads currently checked out.
    #[must_use]
    pub fn busy_threads(&self) -> usize {
        self.state.read().as_ref().map_or(0, |a| a.cache.counts().1)
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
        let executor = match active.cache.acquire() {
            Ok(executor) => executor,
            Err(err) => {
                error!(scheduler = %self.name, error = %err, "Failed to spawn elastic thread");
                handle.dispose();
                return Err(rejected());
            }
        };

        let cache = Arc::clone(&active.cache);
        let held = Arc::clone(&executor);
        handle.on_terminate(move || cache.release(&held));

        if let Err(err) = executor.submit(Arc::clone(&handle), delay, period) {
            handle.dispose();
            return Err(err);
        }
        Ok(handle)
    }
}

impl Disposable for ElasticScheduler {
    fn dispose(&self) {
        let Some(active) = self.state.write().take() else {
            return;
        };
        active.shutdown();
        info!(scheduler = %self.name, "Elastic scheduler disposed");
    }

    fn is_disposed(&self) -> bool {
        self.state.read().is_none()
    }
}

impl Scheduler for ElasticScheduler {
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
        let executor = match active.cache.acquire() {
            Ok(executor) => executor,
            Err(err) => {
                error!(scheduler = %self.name, error = %err, "Failed to spawn elastic thread");
                return Err(rejected());
            }
        };

        let id = next_worker_id();
        let registry = &active.tracking.workers;
        let cache = Arc::clone(&active.cache);
        let held = Arc::clone(&executor);
        let worker = ExecutorWorker::new(id, executor, registry)
            .with_release(move || cache.release(&held));
        register_worker(registry, id, Arc::new(worker))
    }

    fn start(&self) {
        if self.state.read().is_some() {
            return;
        }
        // Threads are spawned outside the lock; a concurrent `start` may win.
        let active = match Active::spawn(
            &self.factory,
            &self.evictor_factory,
            self.capacity,
            self.max_busy,
            self.ttl,
        ) {
            Ok(active) => active,
            Err(err) => {
                error!(scheduler = %self.name, error = %err, "Failed to restart elastic scheduler");
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
        info!(scheduler = %self.name, "Elastic scheduler restarted");
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::timed()
    }
}

impl Drop for ElasticScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::CountDownLatch;

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        true
    }

    #[test]
    fn test_worker_thread_is_reused() {
        let scheduler = ElasticScheduler::with_name("elastic-reuse").unwrap();
        let worker = scheduler.create_worker().unwrap();
        assert_eq!(scheduler.busy_threads(), 1);

        worker.dispose();
        assert_eq!(scheduler.busy_threads(), 0);
        assert_eq!(scheduler.idle_threads(), 1);

        let _again = scheduler.create_worker().unwrap();
        assert_eq!(scheduler.idle_threads(), 0);
        assert_eq!(scheduler.busy_threads(), 1);
    }

    #[test]
    fn test_direct_task_releases_thread() {
        let scheduler = ElasticScheduler::with_name("elastic-direct").unwrap();
        let latch = Arc::new(CountDownLatch::new(1));
        let l = Arc::clone(&latch);
        scheduler.schedule(Box::new(move || l.count_down())).unwrap();

        assert!(latch.wait_timeout(Duration::from_secs(5)));
        assert!(wait_for(|| scheduler.idle_threads() == 1));
    }

    #[test]
    fn test_busy_cap_shares_threads() {
        let cfg = SchedulerConfig::new("elastic-cap", SchedulerKind::Elastic).with_parallelism(2);
        let scheduler = ElasticScheduler::new(&cfg).unwrap();
        let workers: Vec<_> = (0..5).map(|_| scheduler.create_worker().unwrap()).collect();
        assert_eq!(scheduler.busy_threads(), 2);
        drop(workers);
        assert_eq!(scheduler.busy_threads(), 0);
        assert_eq!(scheduler.idle_threads(), 2);
    }

    #[test]
    fn test_idle_threads_are_evicted() {
        let cfg = SchedulerConfig::new("elastic-ttl", SchedulerKind::Elastic).with_ttl_secs(1);
        let scheduler = ElasticScheduler::new(&cfg).unwrap();
        scheduler.create_worker().unwrap().dispose();
        assert_eq!(scheduler.idle_threads(), 1);

        assert!(wait_for(|| scheduler.idle_threads() == 0));
    }

    #[test]
    fn test_dispose_then_restart() {
        let scheduler = ElasticScheduler::with_name("elastic-restart").unwrap();
        let worker = scheduler.create_worker().unwrap();
        scheduler.dispose();
        assert!(worker.is_disposed());
        assert_eq!(scheduler.idle_threads(), 0);
        assert!(scheduler.create_worker().err().unwrap().is_same(rejected()));

        scheduler.start();
        assert!(scheduler.create_worker().is_ok());
    }

    #[test]
    fn test_concurrent_restarts_keep_one_generation() {
        let scheduler = Arc::new(ElasticScheduler::with_name("elastic-restart-race").unwrap());
        scheduler.dispose();

        let starters: Vec<_> = (0..4)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                std::thread::spawn(move || scheduler.start())
            })
            .collect();
        for starter in starters {
            starter.join().unwrap();
        }

        assert!(!scheduler.is_disposed());
        let worker = scheduler.create_worker().unwrap();
        assert_eq!(scheduler.busy_threads(), 1);
        worker.dispose();
        assert_eq!(scheduler.idle_threads(), 1);
    }
}
