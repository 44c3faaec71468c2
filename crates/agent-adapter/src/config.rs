//! Process-wide adapter defaults

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{AdapterError, ErrorKind, Result};
use crate::profile::AgentKind;
use crate::session::DEFAULT_STDERR_LIMIT;

/// Default chunk queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Defaults shared read-only by every call
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Binary path overrides keyed by agent name
    pub binaries: BTreeMap<String, PathBuf>,
    /// Directory for ephemeral config files; system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
    /// Used when a request has no timeout; zero means no deadline
    pub default_timeout_secs: u64,
    /// Cap on captured stderr, in characters
    pub stderr_limit: usize,
    /// Capacity of the streaming chunk queue
    pub queue_capacity: usize,
    /// Environment overlay applied to every adapter
    pub env: BTreeMap<String, String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            binaries: BTreeMap::new(),
            scratch_dir: None,
            default_timeout_secs: 0,
            stderr_limit: DEFAULT_STDERR_LIMIT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            env: BTreeMap::new(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparsable {}={:?}", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

impl AdapterConfig {
    /// Build from `AGENT_ADAPTER_*` and `<AGENT>_BIN` variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let binaries = AgentKind::ALL
            .iter()
            .filter_map(|kind| {
                std::env::var(kind.binary_env_var())
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (kind.as_str().to_string(), PathBuf::from(v)))
            })
            .collect();

        Self {
            binaries,
            scratch_dir: std::env::var("AGENT_ADAPTER_SCRATCH_DIR").ok().map(PathBuf::from),
            default_timeout_secs: env_parse(
                "AGENT_ADAPTER_TIMEOUT_SECS",
                defaults.default_timeout_secs,
            ),
            stderr_limit: env_parse("AGENT_ADAPTER_STDERR_LIMIT", defaults.stderr_limit),
            queue_capacity: env_parse("AGENT_ADAPTER_QUEUE_CAPACITY", defaults.queue_capacity),
            env: BTreeMap::new(),
        }
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path)
            .map_err(|e| AdapterError::new("config", "load", ErrorKind::Io(e), false))?;
        serde_json::from_str(&body)
            .map_err(|e| AdapterError::new("config", "load", ErrorKind::Serialization(e), false))
    }

    /// Binary override for an agent, if configured
    pub fn binary_for(&self, name: &str) -> Option<&Path> {
        self.binaries.get(name).map(PathBuf::as_path)
    }

    /// Timeout used when the request sets none
    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_secs > 0).then(|| Duration::from_secs(self.default_timeout_secs))
    }
}
