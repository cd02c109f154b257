//! Named thread creation for executor threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Default stack size for executor threads.
pub const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Spawns threads named `"{prefix}-{n}"` with a shared counter.
///
/// Clones share the counter, so every thread of one scheduler gets a distinct
/// name even across restarts.
#[derive(Debug, Clone)]
pub struct ThreadFactory {
    prefix: Arc<str>,
    counter: Arc<AtomicU64>,
    stack_size: usize,
}

impl ThreadFactory {
    /// Factory with the default stack size.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: Arc::from(prefix),
            counter: Arc::new(AtomicU64::new(0)),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    /// Override the stack size of spawned threads.
    #[must_use]
    pub const fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Thread name prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Spawn `f` on a new named thread.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the OS refuses to create the thread.
    pub fn spawn<F>(&self, f: F) -> std::io::Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        thread::Builder::new()
            .name(format!("{}-{id}", self.prefix))
            .stack_size(self.stack_size)
            .spawn(f)
    }
}
