//! Reusable acceptance checks for [`Scheduler`](crate::core::Scheduler) implementations.
//!
//! Every check takes a factory producing a fresh scheduler and the
//! [`ConformanceFlags`] describing what the backend supports, then panics on
//! the first violated guarantee. [`scheduler_conformance!`](crate::scheduler_conformance)
//! expands to one `#[test]` per check.
//!
//! ```rust,ignore
//! use prometheus_schedulers::backend::ParallelScheduler;
//! use prometheus_schedulers::conformance::ConformanceFlags;
//! use prometheus_schedulers::core::SchedulerRef;
//! use std::sync::Arc;
//!
//! fn parallel() -> SchedulerRef {
//!     Arc::new(ParallelScheduler::with_parallelism("conformance", 4).unwrap())
//! }
//!
//! prometheus_schedulers::scheduler_conformance!(parallel_conformance, parallel, ConformanceFlags::default());
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::disposable::{composite, CompositeDisposable, Disposable, DisposableRef};
use crate::core::error::{rejected, rejected_not_time_capable, Rejected};
use crate::core::scheduler::{Capabilities, ScheduleResult, SchedulerRef, WorkerRef};
use crate::core::task::PeriodicTask;
use crate::util::CountDownLatch;

/// Upper bound for every wait inside a check.
const WAIT: Duration = Duration::from_secs(10);

/// Number of tasks submitted in the mass cancellation scenario.
const MASS_CANCEL_TASKS: usize = 10;

/// Which guarantees a backend is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ConformanceFlags {
    /// A blocked task must be interrupted by dispose.
    pub check_interrupted: bool,
    /// A running task's handle must report not disposed until disposed.
    pub check_dispose_task: bool,
    /// Run the mass cancellation scenario on workers.
    pub check_mass_worker_dispose: bool,
    /// Delayed and periodic scheduling on the scheduler itself.
    pub check_direct_time_scheduling: bool,
    /// Delayed and periodic scheduling on workers.
    pub check_worker_time_scheduling: bool,
    /// `start` revives a disposed scheduler.
    pub check_support_restart: bool,
    /// The scheduler reports disposed after `dispose`.
    pub reports_disposed: bool,
}

impl Default for ConformanceFlags {
    fn default() -> Self {
        Self {
            check_interrupted: false,
            check_dispose_task: true,
            check_mass_worker_dispose: true,
            check_direct_time_scheduling: true,
            check_worker_time_scheduling: true,
            check_support_restart: true,
            reports_disposed: true,
        }
    }
}

impl ConformanceFlags {
    /// Flags matching what `caps` advertises.
    #[must_use]
    pub fn from_capabilities(caps: Capabilities) -> Self {
        Self {
            check_interrupted: caps.interrupt_on_dispose,
            check_direct_time_scheduling: caps.direct_time_scheduling,
            check_worker_time_scheduling: caps.worker_time_scheduling,
            check_support_restart: caps.restart,
            ..Self::default()
        }
    }

    /// Flags for a backend that runs tasks on the caller's thread and is
    /// never disposed.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            check_dispose_task: false,
            check_direct_time_scheduling: false,
            check_worker_time_scheduling: false,
            reports_disposed: false,
            ..Self::default()
        }
    }
}

/// Resources disposed when the scope is dropped, even if a check panics.
#[derive(Default)]
pub struct CleanupScope {
    resources: Arc<CompositeDisposable>,
}

impl CleanupScope {
    /// Empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resources: composite(),
        }
    }

    /// Register `resource` for cleanup.
    pub fn add(&self, resource: DisposableRef) {
        self.resources.add(resource);
    }

    /// Register a scheduler for cleanup and hand it back.
    pub fn scheduler(&self, scheduler: SchedulerRef) -> SchedulerRef {
        self.add(scheduler.clone());
        scheduler
    }

    /// Register a worker for cleanup and hand it back.
    pub fn worker(&self, worker: WorkerRef) -> WorkerRef {
        self.add(worker.clone());
        worker
    }
}

impl Drop for CleanupScope {
    fn drop(&mut self) {
        self.resources.dispose();
    }
}

fn wait(latch: &CountDownLatch, what: &str) {
    assert!(latch.wait_timeout(WAIT), "timed out waiting for {what}");
}

fn assert_rejected(result: Result<DisposableRef, &'static Rejected>, what: &str) {
    match result {
        Ok(_) => panic!("{what}: expected the stopped rejection"),
        Err(err) => assert!(err.is_same(rejected()), "{what}: wrong rejection `{err}`"),
    }
}

fn assert_not_time_capable(
    result: Result<DisposableRef, &'static Rejected>,
    what: &str,
) {
    match result {
        Ok(_) => panic!("{what}: expected the not-time-capable rejection"),
        Err(err) => assert!(
            err.is_same(rejected_not_time_capable()),
            "{what}: wrong rejection `{err}`"
        ),
    }
}

/// `start` after `dispose` revives the scheduler iff restart is supported.
///
/// # Panics
///
/// On a violated guarantee.
pub fn restart_support(factory: &dyn Fn() -> SchedulerRef, flags: &ConformanceFlags) {
    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());
    s.dispose();
    s.start();

    if flags.check_support_restart {
        assert!(!s.is_disposed(), "restart supported");
    } else {
        assert!(s.is_disposed(), "restart not supported");
    }
}

/// Direct task lifecycle, idempotent dispose, and rejection after dispose.
///
/// # Panics
///
/// On a violated guarantee.
pub fn direct_schedule_and_dispose(factory: &dyn Fn() -> SchedulerRef, flags: &ConformanceFlags) {
    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());
    assert!(!s.is_disposed());

    let started = Arc::new(CountDownLatch::new(1));
    let release = flags
        .check_dispose_task
        .then(|| Arc::new(CountDownLatch::new(1)));

    let (st, rel) = (Arc::clone(&started), release.clone());
    let d = s
        .schedule(Box::new(move || {
            st.count_down();
            if let Some(rel) = rel {
                rel.wait_timeout(WAIT);
            }
        }))
        .unwrap_or_else(|err| panic!("unexpected scheduling error: {err}"));

    wait(&started, "direct task start");
    if flags.check_dispose_task {
        assert!(!d.is_disposed(), "running task reported disposed");
    }
    d.dispose();
    d.dispose();
    thread::yield_now();

    if let Some(release) = release {
        release.count_down();
    }

    s.dispose();
    s.dispose();
    if !flags.reports_disposed {
        return;
    }
    assert!(s.is_disposed());

    match s.schedule(Box::new(|| {})) {
        Ok(d) => {
            d.dispose();
            assert!(d.is_disposed());
        }
        Err(err) => assert!(err.is_same(rejected()), "wrong rejection `{err}`"),
    }
}

/// Worker task lifecycle, mass cancellation, and rejection identity.
///
/// # Panics
///
/// On a violated guarantee.
pub fn worker_schedule_and_dispose(factory: &dyn Fn() -> SchedulerRef, flags: &ConformanceFlags) {
    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());
    let w = s
        .create_worker()
        .unwrap_or_else(|err| panic!("create_worker failed: {err}"));
    assert!(!w.is_disposed());

    let started = Arc::new(CountDownLatch::new(1));
    let release = flags
        .check_dispose_task
        .then(|| Arc::new(CountDownLatch::new(1)));

    let (st, rel) = (Arc::clone(&started), release.clone());
    let d = w
        .schedule(Box::new(move || {
            st.count_down();
            if let Some(rel) = rel {
                rel.wait_timeout(WAIT);
            }
        }))
        .unwrap_or_else(|err| panic!("unexpected scheduling error: {err}"));

    wait(&started, "worker task start");
    if flags.check_dispose_task {
        assert!(!d.is_disposed(), "running task reported disposed");
    }
    d.dispose();
    d.dispose();
    thread::yield_now();

    if let Some(release) = release {
        release.count_down();
    }

    // Keeps mass-cancel tasks that did start from holding their thread.
    let unblock = Arc::new(CountDownLatch::new(1));
    let mut mass_cancel = Vec::new();
    let mut errors = 0usize;
    if flags.check_mass_worker_dispose {
        let submitter = thread::current().id();
        for _ in 0..MASS_CANCEL_TASKS {
            let unblock = Arc::clone(&unblock);
            match w.schedule(Box::new(move || {
                if thread::current().id() == submitter {
                    return;
                }
                unblock.wait_timeout(Duration::from_secs(5));
            })) {
                Ok(handle) => mass_cancel.push(handle),
                Err(err) => {
                    assert!(err.is_same(rejected()), "wrong rejection `{err}`");
                    errors += 1;
                }
            }
        }
    }

    w.dispose();
    w.dispose();
    assert!(w.is_disposed());

    assert_eq!(errors, 0, "mass cancellation errors");
    for handle in &mass_cancel {
        assert!(handle.is_disposed(), "queued task survived worker dispose");
    }
    unblock.count_down();

    assert_rejected(w.schedule(Box::new(|| {})), "schedule on disposed worker");
    s.dispose();
    s.dispose();
}

/// Delayed direct task: runs, reports live while running, and the scheduler
/// rejects afterwards.
///
/// # Panics
///
/// On a violated guarantee.
pub fn direct_schedule_and_dispose_delay(
    factory: &dyn Fn() -> SchedulerRef,
    flags: &ConformanceFlags,
) {
    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());
    assert!(!s.is_disposed());

    if !flags.check_direct_time_scheduling {
        assert_not_time_capable(
            s.schedule_delayed(Box::new(|| {}), Duration::from_millis(10)),
            "scheduler without time support",
        );
        return;
    }

    let started = Arc::new(CountDownLatch::new(1));
    let release = Arc::new(CountDownLatch::new(1));
    let (st, rel) = (Arc::clone(&started), Arc::clone(&release));
    let d = s
        .schedule_delayed(
            Box::new(move || {
                st.count_down();
                rel.wait_timeout(WAIT);
            }),
            Duration::from_millis(10),
        )
        .unwrap_or_else(|err| panic!("unexpected scheduling error: {err}"));

    wait(&started, "delayed task start");
    assert!(!d.is_disposed());
    d.dispose();
    thread::yield_now();
    release.count_down();

    s.dispose();
    assert!(s.is_disposed());
    assert_rejected(s.schedule(Box::new(|| {})), "schedule on disposed scheduler");
}

/// Delayed worker task, then rejection from the disposed worker.
///
/// # Panics
///
/// On a violated guarantee.
pub fn worker_schedule_and_dispose_delay(
    factory: &dyn Fn() -> SchedulerRef,
    flags: &ConformanceFlags,
) {
    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());
    let w = s
        .create_worker()
        .unwrap_or_else(|err| panic!("create_worker failed: {err}"));
    assert!(!w.is_disposed());

    if !flags.check_worker_time_scheduling {
        assert_not_time_capable(
            w.schedule_delayed(Box::new(|| {}), Duration::from_millis(10)),
            "worker without time support",
        );
        return;
    }

    let started = Arc::new(CountDownLatch::new(1));
    let release = Arc::new(CountDownLatch::new(1));
    let (st, rel) = (Arc::clone(&started), Arc::clone(&release));
    let d = w
        .schedule_delayed(
            Box::new(move || {
                st.count_down();
                rel.wait_timeout(WAIT);
            }),
            Duration::from_millis(10),
        )
        .unwrap_or_else(|err| panic!("unexpected scheduling error: {err}"));

    wait(&started, "delayed worker task start");
    assert!(!d.is_disposed());
    d.dispose();
    thread::yield_now();
    release.count_down();

    w.dispose();
    assert!(w.is_disposed());
    assert_rejected(w.schedule(Box::new(|| {})), "schedule on disposed worker");
}

/// Periodic direct task runs repeatedly until its handle is disposed.
///
/// # Panics
///
/// On a violated guarantee.
pub fn direct_schedule_and_dispose_period(
    factory: &dyn Fn() -> SchedulerRef,
    flags: &ConformanceFlags,
) {
    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());
    assert!(!s.is_disposed());

    if !flags.check_direct_time_scheduling {
        assert_not_time_capable(
            s.schedule_periodically(
                Box::new(|| {}),
                Duration::from_millis(10),
                Duration::from_millis(10),
            ),
            "scheduler without time support",
        );
        return;
    }

    let runs = Arc::new(CountDownLatch::new(2));
    let release = Arc::new(CountDownLatch::new(1));
    let (r, rel) = (Arc::clone(&runs), Arc::clone(&release));
    let d = s
        .schedule_periodically(
            Box::new(move || {
                r.count_down();
                if r.count() == 0 {
                    rel.wait_timeout(WAIT);
                }
            }),
            Duration::from_millis(10),
            Duration::from_millis(10),
        )
        .unwrap_or_else(|err| panic!("unexpected scheduling error: {err}"));

    assert!(!d.is_disposed());
    wait(&runs, "two periodic runs");
    d.dispose();
    thread::yield_now();
    release.count_down();

    s.dispose();
    assert!(s.is_disposed());
    assert_rejected(s.schedule(Box::new(|| {})), "schedule on disposed scheduler");
}

/// Periodic worker task runs until disposed; the worker rejects afterwards.
///
/// # Panics
///
/// On a violated guarantee.
pub fn worker_schedule_and_dispose_period(
    factory: &dyn Fn() -> SchedulerRef,
    flags: &ConformanceFlags,
) {
    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());
    let w = s
        .create_worker()
        .unwrap_or_else(|err| panic!("create_worker failed: {err}"));
    assert!(!w.is_disposed());

    if !flags.check_worker_time_scheduling {
        assert_not_time_capable(
            w.schedule_periodically(
                Box::new(|| {}),
                Duration::from_millis(10),
                Duration::from_millis(10),
            ),
            "worker without time support",
        );
        return;
    }

    let started = Arc::new(CountDownLatch::new(1));
    let release = Arc::new(CountDownLatch::new(1));
    let (st, rel) = (Arc::clone(&started), Arc::clone(&release));
    let d = w
        .schedule_periodically(
            Box::new(move || {
                st.count_down();
                rel.wait_timeout(WAIT);
            }),
            Duration::from_millis(10),
            Duration::from_millis(10),
        )
        .unwrap_or_else(|err| panic!("unexpected scheduling error: {err}"));

    wait(&started, "periodic worker run");
    assert!(!d.is_disposed());
    d.dispose();
    thread::yield_now();
    release.count_down();

    w.dispose();
    assert!(w.is_disposed());
    assert_rejected(w.schedule(Box::new(|| {})), "schedule on disposed worker");
}

/// No further periodic run starts once the handle is disposed.
///
/// # Panics
///
/// On a violated guarantee.
pub fn periodic_stops_after_dispose(factory: &dyn Fn() -> SchedulerRef, flags: &ConformanceFlags) {
    if !flags.check_worker_time_scheduling {
        return;
    }
    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());
    let w = scope.worker(
        s.create_worker()
            .unwrap_or_else(|err| panic!("create_worker failed: {err}")),
    );

    let count = Arc::new(AtomicUsize::new(0));
    let ticks = Arc::new(CountDownLatch::new(3));
    let (c, t) = (Arc::clone(&count), Arc::clone(&ticks));
    let d = w
        .schedule_periodically(
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
                t.count_down();
            }),
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
        .unwrap_or_else(|err| panic!("unexpected scheduling error: {err}"));

    wait(&ticks, "three periodic runs");
    d.dispose();
    assert!(d.is_disposed());

    // Let a run that was already executing finish.
    thread::sleep(Duration::from_millis(20));
    let settled = count.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(count.load(Ordering::SeqCst), settled, "periodic task ran after dispose");
}

/// Disposing the worker, then the scheduler, stops periodic series issued
/// through them without touching the handles directly.
///
/// # Panics
///
/// On a violated guarantee.
pub fn periodic_stops_after_owner_dispose(
    factory: &dyn Fn() -> SchedulerRef,
    flags: &ConformanceFlags,
) {
    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());

    let start_series = |schedule: &dyn Fn(PeriodicTask) -> ScheduleResult| {
        let count = Arc::new(AtomicUsize::new(0));
        let ticks = Arc::new(CountDownLatch::new(3));
        let (c, t) = (Arc::clone(&count), Arc::clone(&ticks));
        let handle = schedule(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            t.count_down();
        }))
        .unwrap_or_else(|err| panic!("unexpected scheduling error: {err}"));
        wait(&ticks, "three periodic runs");
        (handle, count)
    };
    let assert_stopped = |handle: &DisposableRef, count: &AtomicUsize, what: &str| {
        assert!(handle.is_disposed(), "{what}: series handle not disposed");
        thread::sleep(Duration::from_millis(20));
        let settled = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), settled, "{what}: series kept running");
    };
    let period = Duration::from_millis(1);

    if flags.check_worker_time_scheduling {
        let w = s
            .create_worker()
            .unwrap_or_else(|err| panic!("create_worker failed: {err}"));
        let (handle, count) = start_series(&|task| w.schedule_periodically(task, period, period));
        w.dispose();
        assert_stopped(&handle, count.as_ref(), "worker dispose");
    }

    if flags.check_direct_time_scheduling && flags.reports_disposed {
        let (handle, count) = start_series(&|task| s.schedule_periodically(task, period, period));
        s.dispose();
        assert_stopped(&handle, count.as_ref(), "scheduler dispose");
    }
}

/// A delayed task never starts before its delay.
///
/// # Panics
///
/// On a violated guarantee.
pub fn delayed_task_respects_delay(factory: &dyn Fn() -> SchedulerRef, flags: &ConformanceFlags) {
    if !flags.check_direct_time_scheduling {
        return;
    }
    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());
    let delay = Duration::from_millis(50);
    let submitted = Instant::now();
    let elapsed = Arc::new(Mutex::new(None));
    let done = Arc::new(CountDownLatch::new(1));
    let (e, dn) = (Arc::clone(&elapsed), Arc::clone(&done));

    s.schedule_delayed(
        Box::new(move || {
            *e.lock() = Some(submitted.elapsed());
            dn.count_down();
        }),
        delay,
    )
    .unwrap_or_else(|err| panic!("unexpected scheduling error: {err}"));

    wait(&done, "delayed task");
    let elapsed = elapsed.lock().unwrap_or_default();
    assert!(elapsed >= delay, "ran after {elapsed:?}, before {delay:?}");
}

/// Disposing a delayed task before it is due prevents it from running.
///
/// # Panics
///
/// On a violated guarantee.
pub fn delayed_task_cancelled_before_run(
    factory: &dyn Fn() -> SchedulerRef,
    flags: &ConformanceFlags,
) {
    if !flags.check_direct_time_scheduling {
        return;
    }
    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());
    let ran = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&ran);

    let d = s
        .schedule_delayed(
            Box::new(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_millis(100),
        )
        .unwrap_or_else(|err| panic!("unexpected scheduling error: {err}"));
    d.dispose();
    assert!(d.is_disposed());

    thread::sleep(Duration::from_millis(200));
    assert_eq!(ran.load(Ordering::SeqCst), 0, "cancelled task ran");
}

/// Worker tasks run one at a time in submission order.
///
/// # Panics
///
/// On a violated guarantee.
pub fn worker_fifo_ordering(factory: &dyn Fn() -> SchedulerRef, _flags: &ConformanceFlags) {
    const TASKS: usize = 200;

    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());
    let w = scope.worker(
        s.create_worker()
            .unwrap_or_else(|err| panic!("create_worker failed: {err}")),
    );

    let order = Arc::new(Mutex::new(Vec::with_capacity(TASKS)));
    let running = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(CountDownLatch::new(TASKS));
    for i in 0..TASKS {
        let (order, running, done) = (Arc::clone(&order), Arc::clone(&running), Arc::clone(&done));
        w.schedule(Box::new(move || {
            assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0, "overlapping worker tasks");
            order.lock().push(i);
            running.fetch_sub(1, Ordering::SeqCst);
            done.count_down();
        }))
        .unwrap_or_else(|err| panic!("unexpected scheduling error: {err}"));
    }

    wait(&done, "worker tasks");
    assert_eq!(*order.lock(), (0..TASKS).collect::<Vec<_>>());
}

/// Backends without time support always return the one shared
/// not-time-capable rejection, on the scheduler and on workers.
///
/// # Panics
///
/// On a violated guarantee.
pub fn not_time_capable_identity(factory: &dyn Fn() -> SchedulerRef, flags: &ConformanceFlags) {
    let scope = CleanupScope::new();
    let s = scope.scheduler(factory());

    if !flags.check_direct_time_scheduling {
        assert_not_time_capable(
            s.schedule_delayed(Box::new(|| {}), Duration::ZERO),
            "direct delayed",
        );
        assert_not_time_capable(
            s.schedule_periodically(Box::new(|| {}), Duration::ZERO, Duration::from_millis(1)),
            "direct periodic",
        );
    }
    if !flags.check_worker_time_scheduling {
        let w = scope.worker(
            s.create_worker()
                .unwrap_or_else(|err| panic!("create_worker failed: {err}")),
        );
        assert_not_time_capable(
            w.schedule_delayed(Box::new(|| {}), Duration::ZERO),
            "worker delayed",
        );
        assert_not_time_capable(
            w.schedule_periodically(Box::new(|| {}), Duration::ZERO, Duration::from_millis(1)),
            "worker periodic",
        );
    }
    assert_eq!(
        s.capabilities().direct_time_scheduling,
        flags.check_direct_time_scheduling,
        "advertised direct time support"
    );
    assert_eq!(
        s.capabilities().worker_time_scheduling,
        flags.check_worker_time_scheduling,
        "advertised worker time support"
    );

    // Categorical incapability is reported ahead of the stopped state.
    let w = s
        .create_worker()
        .unwrap_or_else(|err| panic!("create_worker failed: {err}"));
    w.dispose();
    s.dispose();
    if !flags.check_worker_time_scheduling {
        assert_not_time_capable(
            w.schedule_delayed(Box::new(|| {}), Duration::ZERO),
            "disposed worker delayed",
        );
    }
    if !flags.check_direct_time_scheduling {
        assert_not_time_capable(
            s.schedule_delayed(Box::new(|| {}), Duration::ZERO),
            "disposed scheduler delayed",
        );
    }
}

/// Run every check in sequence, each against a fresh scheduler.
///
/// # Panics
///
/// On the first violated guarantee.
pub fn run_all(factory: &dyn Fn() -> SchedulerRef, flags: &ConformanceFlags) {
    restart_support(factory, flags);
    direct_schedule_and_dispose(factory, flags);
    worker_schedule_and_dispose(factory, flags);
    direct_schedule_and_dispose_delay(factory, flags);
    worker_schedule_and_dispose_delay(factory, flags);
    direct_schedule_and_dispose_period(factory, flags);
    worker_schedule_and_dispose_period(factory, flags);
    periodic_stops_after_dispose(factory, flags);
    periodic_stops_after_owner_dispose(factory, flags);
    delayed_task_respects_delay(factory, flags);
    delayed_task_cancelled_before_run(factory, flags);
    worker_fifo_ordering(factory, flags);
    not_time_capable_identity(factory, flags);
}

/// Expand to a module with one `#[test]` per conformance check.
///
/// `$factory` is any expression callable as `Fn() -> SchedulerRef`;
/// `$flags` is a `ConformanceFlags` expression.
#[macro_export]
macro_rules! scheduler_conformance {
    ($module:ident, $factory:expr, $flags:expr) => {
        mod $module {
            #[allow(unused_imports)]
            use super::*;

            fn factory() -> $crate::core::SchedulerRef {
                ($factory)()
            }

            fn flags() -> $crate::conformance::ConformanceFlags {
                $flags
            }

            $crate::scheduler_conformance!(@checks
                restart_support,
                direct_schedule_and_dispose,
                worker_schedule_and_dispose,
                direct_schedule_and_dispose_delay,
                worker_schedule_and_dispose_delay,
                direct_schedule_and_dispose_period,
                worker_schedule_and_dispose_period,
                periodic_stops_after_dispose,
                periodic_stops_after_owner_dispose,
                delayed_task_respects_delay,
                delayed_task_cancelled_before_run,
                worker_fifo_ordering,
                not_time_capable_identity
            );
        }
    };
    (@checks $($check:ident),+ $(,)?) => {
        $(
            #[test]
            fn $check() {
                $crate::conformance::$check(&factory, &flags());
            }
        )+
    };
}
