//! Tests for configuration validation

use prometheus_schedulers::config::{SchedulerConfig, SchedulerKind};

#[test]
fn test_scheduler_config_validation() {
    let valid = SchedulerConfig::new("compute", SchedulerKind::Parallel).with_parallelism(4);
    assert!(valid.validate().is_ok());
}

#[test]
fn test_scheduler_config_invalid_ttl() {
    let invalid = SchedulerConfig::new("io", SchedulerKind::Elastic).with_ttl_secs(0);
    assert_eq!(invalid.validate().unwrap_err(), "ttl_secs must be greater than 0");
}

#[test]
fn test_scheduler_config_invalid_stack_size() {
    let invalid = SchedulerConfig::new("io", SchedulerKind::Single).with_thread_stack_size(1024);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "name": "blocking",
        "kind": "elastic",
        "parallelism": 16,
        "max_pending_tasks": 1000,
        "ttl_secs": 30
    }"#;
    let cfg = SchedulerConfig::from_json_str(json).expect("valid config");
    assert_eq!(cfg.name, "blocking");
    assert_eq!(cfg.kind, SchedulerKind::Elastic);
    assert_eq!(cfg.parallelism, 16);
    assert_eq!(cfg.max_pending_tasks, 1000);
    assert_eq!(cfg.ttl_secs, 30);
}

#[test]
fn test_scheduler_config_json_defaults() {
    let cfg = SchedulerConfig::from_json_str(r#"{"name": "single", "kind": "single"}"#)
        .expect("valid config");
    assert_eq!(cfg.max_pending_tasks, 0);
    assert_eq!(cfg.ttl_secs, 60);
    assert!(cfg.parallelism >= 1);
}

#[test]
fn test_scheduler_config_from_json_invalid() {
    let err = SchedulerConfig::from_json_str(r#"{"name": "x", "kind": "parallel", "parallelism": 0}"#)
        .unwrap_err();
    assert_eq!(err, "parallelism must be greater than 0");

    let err = SchedulerConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_scheduler_config_round_trip_json() {
    let cfg = SchedulerConfig::new("compute", SchedulerKind::Parallel).with_max_pending_tasks(64);
    let json = serde_json::to_string(&cfg).expect("serialize");
    assert!(json.contains("\"kind\":\"parallel\""));
    assert_eq!(SchedulerConfig::from_json_str(&json).expect("parse"), cfg);
}

#[test]
fn test_scheduler_config_from_env() {
    // The only test in this binary touching SCHEDULER_* variables.
    std::env::set_var("SCHEDULER_NAME", "env-scheduler");
    std::env::set_var("SCHEDULER_KIND", "parallel");
    std::env::set_var("SCHEDULER_PARALLELISM", "3");
    std::env::set_var("SCHEDULER_TTL_SECS", "");

    let cfg = SchedulerConfig::from_env().expect("env config");
    assert_eq!(cfg.name, "env-scheduler");
    assert_eq!(cfg.kind, SchedulerKind::Parallel);
    assert_eq!(cfg.parallelism, 3);
    assert_eq!(cfg.ttl_secs, 60);

    std::env::set_var("SCHEDULER_PARALLELISM", "many");
    let err = SchedulerConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("SCHEDULER_PARALLELISM"));

    std::env::set_var("SCHEDULER_PARALLELISM", "2");
    std::env::set_var("SCHEDULER_KIND", "bogus");
    assert!(SchedulerConfig::from_env().is_err());

    for key in [
        "SCHEDULER_NAME",
        "SCHEDULER_KIND",
        "SCHEDULER_PARALLELISM",
        "SCHEDULER_TTL_SECS",
    ] {
        std::env::remove_var(key);
    }
}
