//! Scheduler configuration.

use std::env;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::core::error::AppResult;
use crate::util::thread::DEFAULT_STACK_SIZE;

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Run tasks on the calling thread.
    Immediate,
    /// One executor thread.
    Single,
    /// Fixed set of executor threads.
    Parallel,
    /// Threads created on demand and evicted when idle.
    Elastic,
}

impl SchedulerKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "immediate" => Some(Self::Immediate),
            "single" => Some(Self::Single),
            "parallel" => Some(Self::Parallel),
            "elastic" => Some(Self::Elastic),
            _ => None,
        }
    }
}

fn default_parallelism() -> usize {
    num_cpus::get()
}

const fn default_ttl_secs() -> u64 {
    60
}

const fn default_stack_size() -> usize {
    DEFAULT_STACK_SIZE
}

/// Configuration for one scheduler instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Name, also the executor thread name prefix.
    pub name: String,
    /// Backend to build.
    pub kind: SchedulerKind,
    /// Executor threads for `Parallel`; the elastic thread cap.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Submissions allowed to wait per executor thread; `0` means unbounded.
    #[serde(default)]
    pub max_pending_tasks: usize,
    /// Seconds an idle elastic thread is kept before eviction.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Stack size of executor threads in bytes.
    #[serde(default = "default_stack_size")]
    pub thread_stack_size: usize,
}

impl SchedulerConfig {
    /// Defaults for `kind` named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: SchedulerKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parallelism: default_parallelism(),
            max_pending_tasks: 0,
            ttl_secs: default_ttl_secs(),
            thread_stack_size: default_stack_size(),
        }
    }

    /// Set the number of executor threads.
    #[must_use]
    pub const fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Bound the submissions waiting per executor thread.
    #[must_use]
    pub const fn with_max_pending_tasks(mut self, max: usize) -> Self {
        self.max_pending_tasks = max;
        self
    }

    /// Set the idle eviction delay of elastic threads.
    #[must_use]
    pub const fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Set the executor thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = size;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if matches!(self.kind, SchedulerKind::Parallel | SchedulerKind::Elastic)
            && self.parallelism == 0
        {
            return Err("parallelism must be greater than 0".into());
        }
        if self.kind == SchedulerKind::Elastic && self.ttl_secs == 0 {
            return Err("ttl_secs must be greater than 0".into());
        }
        if self.thread_stack_size < 16 * 1024 {
            return Err("thread_stack_size must be at least 16384 bytes".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message for malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `SCHEDULER_*` environment variables.
    ///
    /// A `.env` file is loaded first if present. `SCHEDULER_NAME` and
    /// `SCHEDULER_KIND` are required; `SCHEDULER_PARALLELISM`,
    /// `SCHEDULER_MAX_PENDING_TASKS`, `SCHEDULER_TTL_SECS` and
    /// `SCHEDULER_THREAD_STACK_SIZE` fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Fails on a missing required variable, an unparsable value, or a
    /// configuration that does not validate.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let name = env::var("SCHEDULER_NAME").context("SCHEDULER_NAME is not set")?;
        let kind_raw = env::var("SCHEDULER_KIND").context("SCHEDULER_KIND is not set")?;
        let kind = SchedulerKind::parse(&kind_raw)
            .ok_or_else(|| anyhow!("unknown SCHEDULER_KIND `{kind_raw}`"))?;

        let mut cfg = Self::new(name, kind);
        if let Some(v) = env_parsed("SCHEDULER_PARALLELISM")? {
            cfg.parallelism = v;
        }
        if let Some(v) = env_parsed("SCHEDULER_MAX_PENDING_TASKS")? {
            cfg.max_pending_tasks = v;
        }
        if let Some(v) = env_parsed("SCHEDULER_TTL_SECS")? {
            cfg.ttl_secs = v;
        }
        if let Some(v) = env_parsed("SCHEDULER_THREAD_STACK_SIZE")? {
            cfg.thread_stack_size = v;
        }

        cfg.validate().map_err(|e| anyhow!(e))?;
        Ok(cfg)
    }
}

/// Read and parse an optional variable. Empty values count as unset.
fn env_parsed<T>(key: &str) -> AppResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key).ok().filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {key}: `{raw}`")),
        None => Ok(None),
    }
}
