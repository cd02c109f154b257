//! Worker bookkeeping shared by the backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::disposable::{composite, CompositeDisposable, Disposable};
use crate::core::error::{rejected, Rejected};
use crate::core::executor::TimedExecutor;
use crate::core::scheduler::{ScheduleResult, Worker, WorkerRef};
use crate::core::task::{PeriodicTask, Task, TaskHandle};

static WORKER_IDS: AtomicU64 = AtomicU64::new(1);

/// Next process-unique worker id.
pub(crate) fn next_worker_id() -> u64 {
    WORKER_IDS.fetch_add(1, Ordering::Relaxed)
}

/// Weak registry of the live workers of one scheduler generation.
///
/// The scheduler does not own its workers: a worker dropped by its user
/// disposes itself and leaves the registry.
pub(crate) struct WorkerRegistry {
    /// `None` once disposed.
    workers: Mutex<Option<HashMap<u64, Weak<dyn Disposable>>>>,
}

impl WorkerRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            workers: Mutex::new(Some(HashMap::new())),
        })
    }

    /// Register a worker. Returns `false` if the registry is disposed.
    pub(crate) fn register(&self, id: u64, worker: Weak<dyn Disposable>) -> bool {
        let mut workers = self.workers.lock();
        let Some(map) = workers.as_mut() else {
            return false;
        };
        map.insert(id, worker);
        true
    }

    pub(crate) fn unregister(&self, id: u64) {
        if let Some(map) = self.workers.lock().as_mut() {
            map.remove(&id);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.workers.lock().as_ref().map_or(0, HashMap::len)
    }

    /// Dispose every still-live worker. Later registrations fail.
    pub(crate) fn dispose_all(&self) {
        let Some(map) = self.workers.lock().take() else {
            return;
        };
        for worker in map.into_values().filter_map(|w| w.upgrade()) {
            worker.dispose();
        }
    }
}

/// Register a freshly built worker, disposing it if the registry is closed.
pub(crate) fn register_worker<W>(
    registry: &WorkerRegistry,
    id: u64,
    worker: Arc<W>,
) -> Result<WorkerRef, &'static Rejected>
where
    W: Worker + 'static,
{
    let weak: Weak<W> = Arc::downgrade(&worker);
    if registry.register(id, weak) {
        Ok(worker)
    } else {
        worker.dispose();
        Err(rejected())
    }
}

/// Worker bound to one [`TimedExecutor`] thread.
///
/// Several workers may share a thread; each keeps its own task set, so
/// disposing one never touches the others.
pub(crate) struct ExecutorWorker {
    id: u64,
    executor: Arc<TimedExecutor>,
    tasks: Arc<CompositeDisposable>,
    registry: Weak<WorkerRegistry>,
    /// Run once on dispose, e.g. to hand the thread back to a cache.
    release: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ExecutorWorker {
    pub(crate) fn new(id: u64, executor: Arc<TimedExecutor>, registry: &Arc<WorkerRegistry>) -> Self {
        Self {
            id,
            executor,
            tasks: composite(),
            registry: Arc::downgrade(registry),
            release: Mutex::new(None),
        }
    }

    #[must_use]
    pub(crate) fn with_release<F>(self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        *self.release.lock() = Some(Box::new(f));
        self
    }

    fn submit(
        &self,
        handle: Arc<TaskHandle>,
        delay: Duration,
        period: Option<Duration>,
    ) -> ScheduleResult {
        if let Err(err) = self.executor.submit(Arc::clone(&handle), delay, period) {
            handle.dispose();
            return Err(err);
        }
        Ok(handle)
    }
}

impl Disposable for ExecutorWorker {
    fn dispose(&self) {
        if !self.tasks.dispose_once() {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
        let release = self.release.lock().take();
        if let Some(release) = release {
            release();
        }
    }

    fn is_disposed(&self) -> bool {
        self.tasks.is_disposed()
    }
}

impl Worker for ExecutorWorker {
    fn schedule(&self, task: Task) -> ScheduleResult {
        let handle = TaskHandle::tracked_once(task, &self.tasks)?;
        self.submit(handle, Duration::ZERO, None)
    }

    fn schedule_delayed(&self, task: Task, delay: Duration) -> ScheduleResult {
        let handle = TaskHandle::tracked_once(task, &self.tasks)?;
        self.submit(handle, delay, None)
    }

    fn schedule_periodically(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        period: Duration,
    ) -> ScheduleResult {
        let handle = TaskHandle::tracked_periodic(task, &self.tasks)?;
        self.submit(handle, initial_delay, Some(period))
    }
}

impl Drop for ExecutorWorker {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Live task set plus worker registry of one scheduler generation.
pub(crate) struct Tracking {
    pub(crate) tasks: Arc<CompositeDisposable>,
    pub(crate) workers: Arc<WorkerRegistry>,
}

impl Tracking {
    pub(crate) fn new() -> Self {
        Self {
            tasks: composite(),
            workers: WorkerRegistry::new(),
        }
    }

    /// Dispose workers first, then direct tasks.
    pub(crate) fn dispose(&self) {
        self.workers.dispose_all();
        self.tasks.dispose();
    }

    pub(crate) fn track_once(&self, task: Task) -> Result<Arc<TaskHandle>, &'static Rejected> {
        TaskHandle::tracked_once(task, &self.tasks)
    }

    pub(crate) fn track_periodic(
        &self,
        task: PeriodicTask,
    ) -> Result<Arc<TaskHandle>, &'static Rejected> {
        TaskHandle::tracked_periodic(task, &self.tasks)
    }
}
