//! Error types for scheduler operations.
//!
//! Scheduling calls fail with one of two pre-constructed [`Rejected`] values.
//! Both live in statics, so every backend hands out the same instance for the
//! same condition and callers may compare them by address.

use thiserror::Error;

/// Why a scheduling call was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    /// The scheduler or worker is disposed and accepts no more work.
    Stopped,
    /// The backend cannot run delayed or periodic tasks.
    NotTimeCapable,
}

/// Rejection signal returned by `schedule*` and `create_worker`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct Rejected {
    kind: RejectionKind,
    message: &'static str,
}

static REJECTED: Rejected = Rejected {
    kind: RejectionKind::Stopped,
    message: "scheduler unavailable",
};

static REJECTED_NOT_TIME_CAPABLE: Rejected = Rejected {
    kind: RejectionKind::NotTimeCapable,
    message: "scheduler is not capable of time-based scheduling",
};

/// The shared "stopped" rejection.
#[must_use]
pub fn rejected() -> &'static Rejected {
    &REJECTED
}

/// The shared "not time-capable" rejection.
#[must_use]
pub fn rejected_not_time_capable() -> &'static Rejected {
    &REJECTED_NOT_TIME_CAPABLE
}

impl Rejected {
    /// Kind of this rejection.
    #[must_use]
    pub const fn kind(&self) -> RejectionKind {
        self.kind
    }

    /// True for the "stopped" signal.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.kind == RejectionKind::Stopped
    }

    /// True for the "not time-capable" signal.
    #[must_use]
    pub fn is_not_time_capable(&self) -> bool {
        self.kind == RejectionKind::NotTimeCapable
    }

    /// Identity comparison: both references point at the same static value.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// Errors produced while building or configuring schedulers.
///
/// These never come out of the scheduling contract itself; see [`Rejected`].
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// An executor thread could not be spawned.
    #[error("failed to spawn executor thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
