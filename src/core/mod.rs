//! Core scheduling contract: disposables, rejection signals, tasks, and the
//! `Scheduler`/`Worker` traits, plus the timed executor thread shared by the
//! thread-based backends.

pub mod disposable;
pub mod error;
pub mod executor;
pub mod scheduler;
pub mod task;
pub(crate) mod worker;

pub use disposable::{composite, disposed, from_fn, CompositeDisposable, Disposable, DisposableRef};
pub use error::{rejected, rejected_not_time_capable, AppResult, Rejected, RejectionKind, SchedulerError};
pub use executor::{ExecutorStats, TimedExecutor, MIN_PERIOD};
pub use scheduler::{Capabilities, ScheduleResult, Scheduler, SchedulerRef, Worker, WorkerRef};
pub use task::{PeriodicTask, RunOutcome, Task, TaskHandle};
