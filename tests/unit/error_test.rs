//! Tests for error types

use prometheus_schedulers::core::{rejected, rejected_not_time_capable, RejectionKind, SchedulerError};

#[test]
fn test_rejected_display() {
    assert_eq!(format!("{}", rejected()), "scheduler unavailable");
    assert_eq!(
        format!("{}", rejected_not_time_capable()),
        "scheduler is not capable of time-based scheduling"
    );
}

#[test]
fn test_rejected_identity() {
    assert!(rejected().is_same(rejected()));
    assert!(!rejected().is_same(rejected_not_time_capable()));
    assert!(std::ptr::eq(rejected(), rejected()));
}

#[test]
fn test_rejected_kind() {
    assert_eq!(rejected().kind(), RejectionKind::Stopped);
    assert_eq!(rejected_not_time_capable().kind(), RejectionKind::NotTimeCapable);
    assert!(rejected_not_time_capable().is_not_time_capable());
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("name must not be empty".to_string());
    assert_eq!(format!("{}", err), "invalid configuration: name must not be empty");
}

#[test]
fn test_thread_spawn_error_from_io() {
    let io = std::io::Error::other("no threads left");
    let err: SchedulerError = io.into();
    assert_eq!(
        format!("{}", err),
        "failed to spawn executor thread: no threads left"
    );
}
