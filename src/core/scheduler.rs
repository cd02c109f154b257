//! The `Scheduler` and `Worker` contract.
//!
//! A [`Scheduler`] is the factory and lifecycle owner of an execution backend.
//! A [`Worker`] is a sequential lane obtained from it. Both are
//! [`Disposable`]: disposing either cancels every not-yet-started task it
//! issued, and disposing a scheduler disposes all of its live workers.
//!
//! # Example
//!
//! ```rust,ignore
//! use prometheus_schedulers::backend::ParallelScheduler;
//! use prometheus_schedulers::core::{Disposable, Scheduler};
//! use std::time::Duration;
//!
//! let scheduler = ParallelScheduler::new("compute", 4)?;
//! let worker = scheduler.create_worker()?;
//!
//! worker.schedule(Box::new(|| println!("first")))?;
//! worker.schedule(Box::new(|| println!("second")))?;
//! let tick = worker.schedule_periodically(
//!     Box::new(|| println!("tick")),
//!     Duration::from_millis(10),
//!     Duration::from_millis(10),
//! )?;
//!
//! tick.dispose();
//! scheduler.dispose();
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::disposable::{Disposable, DisposableRef};
use crate::core::error::{rejected_not_time_capable, Rejected};
use crate::core::task::{PeriodicTask, Task};

/// Result of a scheduling call.
pub type ScheduleResult = Result<DisposableRef, &'static Rejected>;

/// Statically advertised backend capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Delayed and periodic scheduling directly on the scheduler.
    pub direct_time_scheduling: bool,
    /// Delayed and periodic scheduling on workers.
    pub worker_time_scheduling: bool,
    /// `start` revives a disposed scheduler.
    pub restart: bool,
    /// `dispose` interrupts a blocked running task.
    pub interrupt_on_dispose: bool,
}

impl Capabilities {
    /// Full time support and restart, no interruption.
    #[must_use]
    pub const fn timed() -> Self {
        Self {
            direct_time_scheduling: true,
            worker_time_scheduling: true,
            restart: true,
            interrupt_on_dispose: false,
        }
    }
}

/// A sequential execution lane.
///
/// Tasks scheduled with [`Worker::schedule`] run one at a time, in submission
/// order. After `dispose` returns, every handle the worker issued reports
/// disposed and every further call fails with the stopped rejection.
pub trait Worker: Disposable {
    /// Run `task` as soon as the lane is free.
    ///
    /// # Errors
    ///
    /// The stopped rejection if the worker is disposed.
    fn schedule(&self, task: Task) -> ScheduleResult;

    /// Run `task` no earlier than `delay` from now.
    ///
    /// # Errors
    ///
    /// The not-time-capable rejection if unsupported, otherwise the stopped
    /// rejection if the worker is disposed.
    fn schedule_delayed(&self, task: Task, delay: Duration) -> ScheduleResult {
        let _ = (task, delay);
        Err(rejected_not_time_capable())
    }

    /// Run `task` after `initial_delay`, then every `period`, until the
    /// returned handle or the worker is disposed.
    ///
    /// # Errors
    ///
    /// Same as [`Worker::schedule_delayed`].
    fn schedule_periodically(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        period: Duration,
    ) -> ScheduleResult {
        let _ = (task, initial_delay, period);
        Err(rejected_not_time_capable())
    }
}

/// Shared, type-erased worker.
pub type WorkerRef = Arc<dyn Worker>;

/// Factory and lifecycle owner of an execution backend.
pub trait Scheduler: Disposable {
    /// Run `task` as soon as an execution slot is free.
    ///
    /// # Errors
    ///
    /// The stopped rejection if the scheduler is disposed.
    fn schedule(&self, task: Task) -> ScheduleResult;

    /// Run `task` no earlier than `delay` from now.
    ///
    /// # Errors
    ///
    /// The not-time-capable rejection if unsupported, otherwise the stopped
    /// rejection if the scheduler is disposed.
    fn schedule_delayed(&self, task: Task, delay: Duration) -> ScheduleResult {
        let _ = (task, delay);
        Err(rejected_not_time_capable())
    }

    /// Run `task` after `initial_delay`, then every `period`, until the
    /// returned handle or the scheduler is disposed.
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::schedule_delayed`].
    fn schedule_periodically(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        period: Duration,
    ) -> ScheduleResult {
        let _ = (task, initial_delay, period);
        Err(rejected_not_time_capable())
    }

    /// Allocate a new sequential lane.
    ///
    /// # Errors
    ///
    /// The stopped rejection if the scheduler is disposed.
    fn create_worker(&self) -> Result<WorkerRef, &'static Rejected>;

    /// Revive a disposed scheduler if restart is supported; otherwise a no-op.
    fn start(&self) {}

    /// Capabilities this backend advertises.
    fn capabilities(&self) -> Capabilities;
}

/// Shared, type-erased scheduler.
pub type SchedulerRef = Arc<dyn Scheduler>;
