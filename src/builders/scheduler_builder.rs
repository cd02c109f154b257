//! Builders to construct schedulers from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::backend::{ElasticScheduler, ImmediateScheduler, ParallelScheduler};
use crate::config::{SchedulerConfig, SchedulerKind};
use crate::core::error::SchedulerError;
use crate::core::scheduler::SchedulerRef;

/// Builds a type-erased scheduler from a [`SchedulerConfig`].
#[derive(Debug, Clone)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
}

impl SchedulerBuilder {
    /// Start from `config`.
    #[must_use]
    pub const fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Start from defaults for `kind`.
    #[must_use]
    pub fn kind(name: &str, kind: SchedulerKind) -> Self {
        Self::new(SchedulerConfig::new(name, kind))
    }

    /// Set the number of executor threads.
    #[must_use]
    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.config = self.config.with_parallelism(parallelism);
        self
    }

    /// Bound the submissions waiting per executor thread.
    #[must_use]
    pub fn max_pending_tasks(mut self, max: usize) -> Self {
        self.config = self.config.with_max_pending_tasks(max);
        self
    }

    /// Set the elastic idle eviction delay.
    #[must_use]
    pub fn ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.config = self.config.with_ttl_secs(ttl_secs);
        self
    }

    /// The configuration that `build` will use.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Validate the configuration and start the scheduler.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidConfig` for an invalid configuration,
    /// `SchedulerError::ThreadSpawn` if executor threads could not be created.
    pub fn build(self) -> Result<SchedulerRef, SchedulerError> {
        self.config
            .validate()
            .map_err(|e| SchedulerError::InvalidConfig(format!("scheduler `{}`: {e}", self.config.name)))?;

        debug!(scheduler = %self.config.name, kind = ?self.config.kind, "Building scheduler");
        let scheduler: SchedulerRef = match self.config.kind {
            SchedulerKind::Immediate => Arc::new(ImmediateScheduler::new()),
            SchedulerKind::Single | SchedulerKind::Parallel => {
                Arc::new(ParallelScheduler::new(&self.config)?)
            }
            SchedulerKind::Elastic => Arc::new(ElasticScheduler::new(&self.config)?),
        };
        Ok(scheduler)
    }
}

/// Build one scheduler per configuration, keyed by name.
///
/// # Errors
///
/// Fails on the first invalid configuration or duplicate name. Schedulers
/// built before the failure are disposed when dropped.
pub fn build_schedulers(
    configs: &[SchedulerConfig],
) -> Result<HashMap<String, SchedulerRef>, SchedulerError> {
    let mut schedulers = HashMap::with_capacity(configs.len());
    for cfg in configs {
        if schedulers.contains_key(&cfg.name) {
            return Err(SchedulerError::InvalidConfig(format!(
                "duplicate scheduler name `{}`",
                cfg.name
            )));
        }
        let scheduler = SchedulerBuilder::new(cfg.clone()).build()?;
        schedulers.insert(cfg.name.clone(), scheduler);
    }
    Ok(schedulers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_each_kind() {
        for kind in [
            SchedulerKind::Immediate,
            SchedulerKind::Single,
            SchedulerKind::Parallel,
            SchedulerKind::Elastic,
        ] {
            let scheduler = SchedulerBuilder::kind("built", kind).parallelism(2).build().unwrap();
            assert!(!scheduler.is_disposed());
            assert_eq!(
                scheduler.capabilities().direct_time_scheduling,
                kind != SchedulerKind::Immediate
            );
            scheduler.dispose();
        }
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let err = SchedulerBuilder::kind("bad", SchedulerKind::Parallel)
            .parallelism(0)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, SchedulerError::InvalidConfig(msg) if msg.contains("bad")));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let configs = vec![
            SchedulerConfig::new("dup", SchedulerKind::Immediate),
            SchedulerConfig::new("dup", SchedulerKind::Single),
        ];
        assert!(build_schedulers(&configs).is_err());
    }
}
