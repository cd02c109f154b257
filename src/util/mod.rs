//! Shared utilities.

pub mod latch;
pub mod telemetry;
pub mod thread;

pub use latch::CountDownLatch;
pub use telemetry::*;
pub use thread::ThreadFactory;
