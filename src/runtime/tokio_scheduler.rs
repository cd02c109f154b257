//! Scheduler backed by a tokio runtime.
//!
//! Task bodies are blocking closures, so they run on tokio's blocking pool;
//! timers and ordering are handled by lightweight async tasks. Each worker
//! owns an unbounded channel drained by one async task, which keeps its tasks
//! strictly sequential.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::info;

use crate::core::disposable::{composite, CompositeDisposable, Disposable};
use crate::core::error::{rejected, Rejected, SchedulerError};
use crate::core::executor::{FAR_FUTURE, MIN_PERIOD};
use crate::core::scheduler::{Capabilities, ScheduleResult, Scheduler, Worker, WorkerRef};
use crate::core::task::{PeriodicTask, RunOutcome, Task, TaskHandle};
use crate::core::worker::{next_worker_id, register_worker, Tracking, WorkerRegistry};

/// A run request sent to a worker lane.
struct Job {
    handle: Arc<TaskHandle>,
    done: Option<oneshot::Sender<RunOutcome>>,
}

type Lane = mpsc::UnboundedSender<Job>;

/// Run `handle` once, on the blocking pool or through a worker lane.
async fn run_once(handle: &Arc<TaskHandle>, lane: Option<&Lane>) -> RunOutcome {
    match lane {
        None => {
            let task = Arc::clone(handle);
            tokio::task::spawn_blocking(move || task.run())
                .await
                .unwrap_or(RunOutcome::Failed)
        }
        Some(lane) => {
            let (done_tx, done_rx) = oneshot::channel();
            let job = Job {
                handle: Arc::clone(handle),
                done: Some(done_tx),
            };
            if lane.send(job).is_err() {
                return RunOutcome::Skipped;
            }
            done_rx.await.unwrap_or(RunOutcome::Skipped)
        }
    }
}

/// `from + delay`, saturated instead of overflowing.
fn deadline_after(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

/// Spawn the async driver of `handle`. Disposing the handle aborts it.
fn spawn_driver(
    runtime: &Handle,
    handle: &Arc<TaskHandle>,
    delay: Duration,
    period: Option<Duration>,
    lane: Option<Lane>,
) {
    let task = Arc::clone(handle);
    let join = runtime.spawn(async move {
        let mut due = deadline_after(Instant::now(), delay);
        loop {
            if due > Instant::now() {
                sleep_until(due).await;
            }
            let outcome = run_once(&task, lane.as_ref()).await;
            let Some(period) = period else {
                break;
            };
            if outcome != RunOutcome::Repeat {
                break;
            }
            // Fixed rate; a run that overran is followed immediately, once.
            due = deadline_after(due, period.max(MIN_PERIOD)).max(Instant::now());
        }
    });
    let abort = join.abort_handle();
    handle.on_terminate(move || abort.abort());
}

/// Worker lane drain loop. Ends when every sender is gone.
async fn drain(mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        let task = Arc::clone(&job.handle);
        let outcome = tokio::task::spawn_blocking(move || task.run())
            .await
            .unwrap_or(RunOutcome::Failed);
        if let Some(done) = job.done {
            let _ = done.send(outcome);
        }
    }
}

/// Scheduler running tasks on a tokio runtime.
pub struct TokioScheduler {
    name: String,
    handle: Handle,
    /// Runtime built by [`TokioScheduler::with_worker_threads`].
    runtime: Option<Runtime>,
    /// `None` while disposed.
    state: RwLock<Option<Tracking>>,
}

impl TokioScheduler {
    /// Schedule onto an existing runtime.
    #[must_use]
    pub fn new(name: &str, handle: Handle) -> Self {
        info!(scheduler = %name, "Tokio scheduler started");
        Self {
            name: name.to_owned(),
            handle,
            runtime: None,
            state: RwLock::new(Some(Tracking::new())),
        }
    }

    /// Build and own a multi-threaded runtime with `worker_threads` threads.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidConfig` for zero threads,
    /// `SchedulerError::ThreadSpawn` if the runtime could not be built.
    pub fn with_worker_threads(name: &str, worker_threads: usize) -> Result<Self, SchedulerError> {
        if worker_threads == 0 {
            return Err(SchedulerError::InvalidConfig(
                "worker_threads must be greater than 0".into(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name(name)
            .enable_all()
            .build()?;
        let mut scheduler = Self::new(name, runtime.handle().clone());
        scheduler.runtime = Some(runtime);
        Ok(scheduler)
    }

    /// Scheduler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Live workers.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.state.read().as_ref().map_or(0, |t| t.workers.len())
    }

    fn submit<F>(&self, make: F, delay: Duration, period: Option<Duration>) -> ScheduleResult
    where
        F: FnOnce(&Tracking) -> Result<Arc<TaskHandle>, &'static Rejected>,
    {
        let state = self.state.read();
        let Some(tracking) = state.as_ref() else {
            return Err(rejected());
        };
        let handle = make(tracking)?;
        spawn_driver(&self.handle, &handle, delay, period, None);
        Ok(handle)
    }
}

impl Disposable for TokioScheduler {
    fn dispose(&self) {
        let Some(tracking) = self.state.write().take() else {
            return;
        };
        tracking.dispose();
        info!(scheduler = %self.name, "Tokio scheduler disposed");
    }

    fn is_disposed(&self) -> bool {
        self.state.read().is_none()
    }
}

impl Scheduler for TokioScheduler {
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
        let Some(tracking) = state.as_ref() else {
            return Err(rejected());
        };
        let id = next_worker_id();
        let worker = TokioWorker::spawn(id, self.handle.clone(), &tracking.workers);
        register_worker(&tracking.workers, id, Arc::new(worker))
    }

    fn start(&self) {
        let mut state = self.state.write();
        if state.is_none() {
            *state = Some(Tracking::new());
            info!(scheduler = %self.name, "Tokio scheduler restarted");
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::timed()
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.dispose();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Sequential lane on the tokio runtime.
struct TokioWorker {
    id: u64,
    runtime: Handle,
    tasks: Arc<CompositeDisposable>,
    registry: Weak<WorkerRegistry>,
    /// `None` once disposed; dropping it ends the drain loop.
    lane: Mutex<Option<Lane>>,
}

impl TokioWorker {
    fn spawn(id: u64, runtime: Handle, registry: &Arc<WorkerRegistry>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(drain(rx));
        Self {
            id,
            runtime,
            tasks: composite(),
            registry: Arc::downgrade(registry),
            lane: Mutex::new(Some(tx)),
        }
    }

    fn lane(&self) -> Result<Lane, &'static Rejected> {
        self.lane.lock().clone().ok_or_else(rejected)
    }

    fn submit_timed(
        &self,
        handle: Arc<TaskHandle>,
        delay: Duration,
        period: Option<Duration>,
    ) -> ScheduleResult {
        let lane = match self.lane() {
            Ok(lane) => lane,
            Err(err) => {
                handle.dispose();
                return Err(err);
            }
        };
        spawn_driver(&self.runtime, &handle, delay, period, Some(lane));
        Ok(handle)
    }
}

impl Disposable for TokioWorker {
    fn dispose(&self) {
        if !self.tasks.dispose_once() {
            return;
        }
        self.lane.lock().take();
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }

    fn is_disposed(&self) -> bool {
        self.tasks.is_disposed()
    }
}

impl Worker for TokioWorker {
    fn schedule(&self, task: Task) -> ScheduleResult {
        let handle = TaskHandle::tracked_once(task, &self.tasks)?;
        let job = Job {
            handle: Arc::clone(&handle),
            done: None,
        };
        let sent = self
            .lane
            .lock()
            .as_ref()
            .is_some_and(|lane| lane.send(job).is_ok());
        if !sent {
            handle.dispose();
            return Err(rejected());
        }
        Ok(handle)
    }

    fn schedule_delayed(&self, task: Task, delay: Duration) -> ScheduleResult {
        let handle = TaskHandle::tracked_once(task, &self.tasks)?;
        self.submit_timed(handle, delay, None)
    }

    fn schedule_periodically(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        period: Duration,
    ) -> ScheduleResult {
        let handle = TaskHandle::tracked_periodic(task, &self.tasks)?;
        self.submit_timed(handle, initial_delay, Some(period))
    }
}

impl Drop for TokioWorker {
    fn drop(&mut self) {
        self.dispose();
    }
}
