//! Async runtime adapters.

#[cfg(feature = "tokio-runtime")]
pub mod tokio_scheduler;

#[cfg(feature = "tokio-runtime")]
pub use tokio_scheduler::TokioScheduler;
