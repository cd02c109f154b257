//! # Prometheus Schedulers
//!
//! Scheduler and worker abstractions with interchangeable execution backends.
//!
//! A [`Scheduler`](core::Scheduler) runs units of work immediately, after a
//! delay, or periodically. A [`Worker`](core::Worker) is a sequential lane
//! obtained from a scheduler. Every scheduling call returns a
//! [`Disposable`](core::Disposable) handle that cancels the task if it has not
//! started yet.
//!
//! ## Guarantees
//!
//! - **Idempotent teardown**: `dispose` can be called any number of times from
//!   any thread; the disposed flag never goes back
//! - **Mass cancellation**: after a worker's `dispose` returns, every handle it
//!   issued reports disposed and no queued task starts afterwards
//! - **Cascading dispose**: disposing a scheduler disposes all of its live workers
//! - **Rejection identity**: refused calls return one of two shared
//!   [`Rejected`](core::Rejected) values, comparable by address
//! - **No blocking on dispose**: running tasks are never joined or interrupted
//!
//! ## Backends
//!
//! | Backend | Threads | Time scheduling | Restart |
//! |---|---|---|---|
//! | [`ImmediateScheduler`](backend::ImmediateScheduler) | caller | no | never disposed |
//! | [`ParallelScheduler`](backend::ParallelScheduler) | fixed | yes | yes |
//! | [`ElasticScheduler`](backend::ElasticScheduler) | on demand, cached | yes | yes |
//! | [`ExecutorScheduler`](backend::ExecutorScheduler) | caller-supplied | no | no |
//! | `TokioScheduler` (feature `tokio-runtime`) | tokio blocking pool | yes | yes |
//!
//! ## Example
//!
//! ```rust,ignore
//! use prometheus_schedulers::builders::SchedulerBuilder;
//! use prometheus_schedulers::config::SchedulerKind;
//! use std::time::Duration;
//!
//! let scheduler = SchedulerBuilder::kind("compute", SchedulerKind::Parallel)
//!     .parallelism(4)
//!     .build()?;
//!
//! let worker = scheduler.create_worker()?;
//! worker.schedule(Box::new(|| println!("runs first")))?;
//! worker.schedule(Box::new(|| println!("runs second")))?;
//!
//! let heartbeat = scheduler.schedule_periodically(
//!     Box::new(|| println!("tick")),
//!     Duration::from_secs(1),
//!     Duration::from_secs(1),
//! )?;
//!
//! heartbeat.dispose();
//! scheduler.dispose();
//! ```
//!
//! New backends can be checked against the shared [`conformance`] suite with
//! [`scheduler_conformance!`].

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduling contract, disposables, tasks and the timed executor.
pub mod core;
/// Configuration models for schedulers.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Thread-based scheduler backends.
pub mod backend;
/// Async runtime adapters.
pub mod runtime;
/// Reusable acceptance checks for scheduler backends.
pub mod conformance;
/// Shared utilities.
pub mod util;
