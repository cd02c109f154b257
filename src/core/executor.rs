//! Single-threaded timed executor backing the thread-based schedulers.
//!
//! One OS thread owns a min-heap of due times. Submissions arrive over a
//! crossbeam channel; the thread blocks on `recv` (or `recv_deadline` when a
//! timer is pending), so there is no polling. Dropping the sender is the
//! shutdown signal.
//!
//! # Design Principles
//!
//! - **No polling**: the thread sleeps on the channel until work or a deadline
//! - **FIFO for equal due times**: entries are ordered by `(due, seq)`
//! - **Prompt shutdown**: `shutdown` never joins; the thread exits after the
//!   task it is currently running, and disposes whatever is still queued

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::core::disposable::Disposable;
use crate::core::error::{rejected, Rejected};
use crate::core::task::{RunOutcome, TaskHandle};
use crate::util::thread::ThreadFactory;

/// Smallest period accepted for periodic tasks; shorter ones are raised to it.
pub const MIN_PERIOD: Duration = Duration::from_micros(1);

/// Cap for due times that would overflow `Instant` (about 30 years ahead).
pub const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Heap size below which cancelled entries are left for `run_due` to skip.
const PURGE_THRESHOLD: usize = 64;

/// `from + delay`, saturated to [`FAR_FUTURE`] instead of overflowing.
#[must_use]
pub fn deadline_after(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

/// Statistics about executor utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Number of executor threads.
    pub thread_count: usize,
    /// Tasks accepted (periodic series count once).
    pub submitted_tasks: u64,
    /// Task runs that completed normally.
    pub completed_tasks: u64,
    /// Task runs that panicked.
    pub failed_tasks: u64,
    /// Tasks dropped because their handle was disposed before running.
    pub cancelled_tasks: u64,
    /// Tasks accepted but not yet picked up by the thread.
    pub queued_tasks: u64,
    /// Entries held by the thread's timer heap, cancelled ones included.
    pub pending_timers: u64,
}

impl ExecutorStats {
    /// Sum statistics across several executors.
    #[must_use]
    pub fn merge(mut self, other: &Self) -> Self {
        self.thread_count += other.thread_count;
        self.submitted_tasks += other.submitted_tasks;
        self.completed_tasks += other.completed_tasks;
        self.failed_tasks += other.failed_tasks;
        self.cancelled_tasks += other.cancelled_tasks;
        self.queued_tasks += other.queued_tasks;
        self.pending_timers += other.pending_timers;
        self
    }
}

/// Internal counters for executor statistics (thread-safe).
#[derive(Debug, Default)]
struct ExecutorCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    queued: AtomicU64,
    timers: AtomicU64,
}

impl ExecutorCounters {
    fn snapshot(&self) -> ExecutorStats {
        ExecutorStats {
            thread_count: 1,
            submitted_tasks: self.submitted.load(Ordering::Relaxed),
            completed_tasks: self.completed.load(Ordering::Relaxed),
            failed_tasks: self.failed.load(Ordering::Relaxed),
            cancelled_tasks: self.cancelled.load(Ordering::Relaxed),
            queued_tasks: self.queued.load(Ordering::Relaxed),
            pending_timers: self.timers.load(Ordering::Relaxed),
        }
    }
}

/// A pending run of a task.
struct Entry {
    handle: Arc<TaskHandle>,
    due: Instant,
    period: Option<Duration>,
    seq: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// One executor thread with a timer heap.
pub struct TimedExecutor {
    name: String,
    /// Entry sender. `None` after shutdown.
    tx: Mutex<Option<Sender<Entry>>>,
    shutdown: Arc<AtomicBool>,
    seq: AtomicU64,
    counters: Arc<ExecutorCounters>,
}

impl TimedExecutor {
    /// Spawn the executor thread.
    ///
    /// `capacity` bounds the number of submissions waiting to be picked up;
    /// `0` means unbounded.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the OS refuses to spawn the thread.
    pub fn spawn(factory: &ThreadFactory, capacity: usize) -> std::io::Result<Arc<Self>> {
        let (tx, rx) = if capacity == 0 {
            unbounded::<Entry>()
        } else {
            bounded::<Entry>(capacity)
        };
        let shutdown = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(ExecutorCounters::default());

        let thread_shutdown = Arc::clone(&shutdown);
        let thread_counters = Arc::clone(&counters);
        let handle = factory.spawn(move || run_loop(&rx, &thread_shutdown, &thread_counters))?;
        let name = handle.thread().name().unwrap_or("executor").to_owned();
        debug!(thread = %name, capacity = capacity, "Executor thread spawned");

        Ok(Arc::new(Self {
            name,
            tx: Mutex::new(Some(tx)),
            shutdown,
            seq: AtomicU64::new(0),
            counters,
        }))
    }

    /// Name of the executor thread.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `handle` to run after `delay`, then every `period` if given.
    ///
    /// The enqueue never blocks: a full queue is reported as the stopped
    /// rejection.
    ///
    /// # Errors
    ///
    /// Returns the stopped rejection if the executor is shut down or full.
    pub fn submit(
        &self,
        handle: Arc<TaskHandle>,
        delay: Duration,
        period: Option<Duration>,
    ) -> Result<(), &'static Rejected> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(rejected());
        }

        let tx_guard = self.tx.lock();
        let Some(tx) = tx_guard.as_ref() else {
            return Err(rejected());
        };
        let entry = Entry {
            handle,
            due: deadline_after(Instant::now(), delay),
            period: period.map(|p| p.max(MIN_PERIOD)),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };

        // Counted before sending so the executor thread never decrements first.
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        match tx.try_send(entry) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                if matches!(err, TrySendError::Full(_)) {
                    warn!(thread = %self.name, "Executor queue is full, rejecting task");
                }
                Err(rejected())
            }
        }
    }

    /// Stop accepting work and let the thread exit. Never waits for it.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.tx.lock().take();
        debug!(thread = %self.name, "Executor shut down");
    }

    /// Whether `shutdown` was called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        self.counters.snapshot()
    }
}

impl Drop for TimedExecutor {
    fn drop(&mut self) {
        // Signal shutdown but don't join; a blocked task must not hang the owner.
        self.shutdown();
    }
}

/// Executor thread body.
fn run_loop(rx: &Receiver<Entry>, shutdown: &AtomicBool, counters: &ExecutorCounters) {
    let mut heap: BinaryHeap<Reverse<Entry>> = BinaryHeap::new();
    let mut purge_at = PURGE_THRESHOLD;

    loop {
        let received = match heap.peek() {
            Some(Reverse(next)) => rx.recv_deadline(next.due),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(entry) => {
                counters.queued.fetch_sub(1, Ordering::Relaxed);
                heap.push(Reverse(entry));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        while let Ok(entry) = rx.try_recv() {
            counters.queued.fetch_sub(1, Ordering::Relaxed);
            heap.push(Reverse(entry));
        }

        if shutdown.load(Ordering::Acquire) {
            break;
        }
        if heap.len() >= purge_at {
            purge_cancelled(&mut heap, counters);
            purge_at = PURGE_THRESHOLD.max(heap.len() * 2);
        }
        run_due(&mut heap, shutdown, counters);
        counters.timers.store(heap.len() as u64, Ordering::Relaxed);
    }

    // Anything left never runs.
    let remaining = heap.len();
    for Reverse(entry) in heap.drain() {
        entry.handle.dispose();
    }
    for entry in rx.try_iter() {
        counters.queued.fetch_sub(1, Ordering::Relaxed);
        entry.handle.dispose();
    }
    counters.timers.store(0, Ordering::Relaxed);
    debug!(remaining = remaining, "Executor thread exiting");
}

/// Drop entries whose handle was disposed before becoming due.
fn purge_cancelled(heap: &mut BinaryHeap<Reverse<Entry>>, counters: &ExecutorCounters) {
    let before = heap.len();
    heap.retain(|Reverse(entry)| !entry.handle.is_terminated());
    let purged = before - heap.len();
    if purged > 0 {
        counters.cancelled.fetch_add(purged as u64, Ordering::Relaxed);
        debug!(purged = purged, remaining = heap.len(), "Purged cancelled timers");
    }
}

/// Run every entry whose due time has passed.
fn run_due(heap: &mut BinaryHeap<Reverse<Entry>>, shutdown: &AtomicBool, counters: &ExecutorCounters) {
    while heap
        .peek()
        .is_some_and(|Reverse(next)| next.due <= Instant::now())
    {
        if shutdown.load(Ordering::Acquire) {
            return;
        }
        let Some(Reverse(mut entry)) = heap.pop() else {
            return;
        };

        match entry.handle.run() {
            RunOutcome::Skipped => {
                counters.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            RunOutcome::Finished => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            RunOutcome::Failed => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
            RunOutcome::Repeat => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                if let Some(period) = entry.period {
                    // Fixed rate, but an overrun does not trigger a burst.
                    entry.due = deadline_after(entry.due, period).max(Instant::now());
                    heap.push(Reverse(entry));
                }
            }
        }
    }
}
