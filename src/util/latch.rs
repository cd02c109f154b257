//! Count-down latch built on `parking_lot` primitives.
//!
//! Waiters block on a Condvar until the count reaches zero. No polling.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// One-shot barrier released once `count_down` was called `count` times.
///
/// # Examples
///
/// ```
/// use prometheus_schedulers::util::CountDownLatch;
/// use std::sync::Arc;
/// use std::thread;
///
/// let latch = Arc::new(CountDownLatch::new(2));
/// for _ in 0..2 {
///     let latch = Arc::clone(&latch);
///     thread::spawn(move || latch.count_down());
/// }
/// latch.wait();
/// assert_eq!(latch.count(), 0);
/// ```
#[derive(Debug)]
pub struct CountDownLatch {
    count: Mutex<usize>,
    released: Condvar,
}

impl CountDownLatch {
    /// Latch released after `count` calls to [`CountDownLatch::count_down`].
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            released: Condvar::new(),
        }
    }

    /// Decrement the count, releasing all waiters when it reaches zero.
    pub fn count_down(&self) {
        let mut count = self.count.lock();
        if *count == 0 {
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.released.notify_all();
        }
    }

    /// Remaining count.
    #[must_use]
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.released.wait(&mut count);
        }
    }

    /// Block until the count reaches zero or `timeout` elapses. Returns
    /// whether the latch was released.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return true;
        }
        let _ = self
            .released
            .wait_while_for(&mut count, |count| *count > 0, timeout);
        *count == 0
    }
}
