//! Configuration surface for Quiver.
//!
//! Configuration is a flat set of namespaced string properties, the way the
//! host mapping layer hands them over:
//!
//! - `quiver.worker.*` drives the execution policy of the indexing worker,
//! - `quiver.default.*` and `quiver.<indexname>.*` drive directory providers,
//!   with index-specific keys overriding the defaults.

use std::collections::BTreeMap;

use crate::error::{QuiverError, Result};

/// Property prefix for everything this crate consumes.
pub const PROPERTY_PREFIX: &str = "quiver.";
/// Prefix for directory-provider defaults shared by all indexes.
pub const DEFAULT_PREFIX: &str = "quiver.default.";
/// Prefix for worker execution properties.
pub const WORKER_PREFIX: &str = "quiver.worker.";

/// Worker execution mode property: `sync` (default) or `async`.
pub const WORKER_EXECUTION: &str = "quiver.worker.execution";
/// Worker backend property: `local` (default) or `remote`.
pub const WORKER_BACKEND: &str = "quiver.worker.backend";
/// Thread pool size, only used when execution is `async`. Default 1.
pub const WORKER_THREAD_POOL_SIZE: &str = "quiver.worker.thread_pool.size";
/// Bounded buffer queue capacity, only used when execution is `async`.
/// Default unbounded.
pub const WORKER_BUFFER_QUEUE_MAX: &str = "quiver.worker.buffer_queue.max";

/// A flat, ordered bag of namespaced string properties.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    properties: BTreeMap<String, String>,
}

impl Settings {
    /// Create an empty settings bag.
    pub fn new() -> Self {
        Settings::default()
    }

    /// Parse settings from a flat JSON object, the form configuration files
    /// hand them over in. String values are taken as is; numbers and
    /// booleans are bridged to their string form.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut settings = Settings::new();
        for (key, value) in raw {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(QuiverError::config(format!(
                        "property '{key}' must be a string, number or boolean, got: {other}"
                    )));
                }
            };
            settings.set(key, value);
        }
        Ok(settings)
    }

    /// Set a property.
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Builder-style property setter.
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.set(key, value);
        self
    }

    /// Get a property value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|s| s.as_str())
    }

    /// Get a property, falling back to a default.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse an integer property, falling back to a default when absent.
    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                QuiverError::config(format!("property '{key}' is not an integer: '{raw}'"))
            }),
        }
    }

    /// Parse a u64 property, falling back to a default when absent.
    pub fn get_u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                QuiverError::config(format!("property '{key}' is not an integer: '{raw}'"))
            }),
        }
    }

    /// Collect the effective properties for one index: `quiver.default.*`
    /// overlaid with `quiver.<index_name>.*`, both prefixes stripped.
    pub fn index_properties(&self, index_name: &str) -> Settings {
        let specific_prefix = format!("{PROPERTY_PREFIX}{index_name}.");
        let mut merged = Settings::new();
        for (key, value) in &self.properties {
            if let Some(stripped) = key.strip_prefix(DEFAULT_PREFIX) {
                merged.set(stripped, value.clone());
            }
        }
        // index-specific keys override defaults
        for (key, value) in &self.properties {
            if let Some(stripped) = key.strip_prefix(&specific_prefix) {
                merged.set(stripped, value.clone());
            }
        }
        merged
    }

    /// Iterate over all properties.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Execution policy for flushed batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Apply the batch inline on the flushing thread; errors propagate.
    Sync,
    /// Hand the batch to a bounded worker pool; the flushing thread runs the
    /// batch itself when the pool queue is full (caller-runs backpressure).
    Async,
}

/// Backend strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Apply directly to the local index directories.
    Local,
    /// Serialize and forward the work list to a remote processor.
    Remote,
}

/// Typed view over the `quiver.worker.*` properties.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sync or async batch execution.
    pub execution: ExecutionMode,
    /// Selected backend strategy.
    pub backend: BackendKind,
    /// Worker pool size (async only).
    pub thread_pool_size: usize,
    /// Buffer queue capacity (async only); `None` means unbounded.
    pub buffer_queue_max: Option<usize>,
}

impl WorkerConfig {
    /// Resolve the worker configuration from raw settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let execution = match settings.get_or(WORKER_EXECUTION, "sync") {
            s if s.eq_ignore_ascii_case("sync") => ExecutionMode::Sync,
            s if s.eq_ignore_ascii_case("async") => ExecutionMode::Async,
            other => {
                return Err(QuiverError::config(format!(
                    "unknown worker execution mode: '{other}'"
                )));
            }
        };
        let backend = match settings.get_or(WORKER_BACKEND, "local") {
            s if s.is_empty() || s.eq_ignore_ascii_case("local") => BackendKind::Local,
            s if s.eq_ignore_ascii_case("remote") => BackendKind::Remote,
            other => {
                return Err(QuiverError::config(format!(
                    "unknown worker backend: '{other}'"
                )));
            }
        };
        let thread_pool_size = settings.get_usize(WORKER_THREAD_POOL_SIZE, 1)?;
        if thread_pool_size == 0 {
            return Err(QuiverError::config(
                "worker thread pool size must be at least 1",
            ));
        }
        let buffer_queue_max = match settings.get(WORKER_BUFFER_QUEUE_MAX) {
            None => None,
            Some(_) => Some(settings.get_usize(WORKER_BUFFER_QUEUE_MAX, usize::MAX)?),
        };
        Ok(WorkerConfig {
            execution,
            backend,
            thread_pool_size,
            buffer_queue_max,
        })
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            execution: ExecutionMode::Sync,
            backend: BackendKind::Local,
            thread_pool_size: 1,
            buffer_queue_max: None,
        }
    }
}
