//! Cluster definition document types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Cluster definition document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Run parameters
    #[serde(default)]
    pub settings: SettingsConfig,
    /// Variable declarations, evaluated in order
    #[serde(default)]
    pub variables: Vec<VariableConfig>,
    /// Transport templates keyed by name
    #[serde(default)]
    pub transports: HashMap<String, String>,
    /// Services keyed by name
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
    /// Hosts keyed by name
    #[serde(default)]
    pub hosts: HashMap<String, HostConfig>,
}

/// Run parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SettingsConfig {
    /// Worker pool size
    #[serde(default)]
    pub workers: Option<usize>,
    /// Number of status probes per state transition
    #[serde(default)]
    pub probes: Option<u32>,
    /// Initial probe period in seconds
    #[serde(default)]
    pub probe_period: Option<u64>,
    /// Verbose logging
    #[serde(default)]
    pub verbose: bool,
}

impl SettingsConfig {
    /// Effective worker pool size
    pub fn pool_size(&self) -> usize {
        self.workers
            .unwrap_or_else(|| num_cpus::get().min(DEFAULT_POOL_SIZE))
            .max(1)
    }

    /// Effective probe count
    pub fn probe_count(&self) -> u32 {
        self.probes.unwrap_or(DEFAULT_PROBE_COUNT)
    }

    /// Effective initial probe period
    pub fn probe_period(&self) -> Duration {
        Duration::from_secs(self.probe_period.unwrap_or(DEFAULT_PROBE_PERIOD_SECS))
    }
}

/// Default worker pool size cap
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Default probe count
pub const DEFAULT_PROBE_COUNT: u32 = 5;

/// Default initial probe period in seconds
pub const DEFAULT_PROBE_PERIOD_SECS: u64 = 2;

/// A single variable declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableConfig {
    /// Variable name
    pub name: String,
    /// Value template, may reference earlier variables
    pub value: String,
}

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceConfig {
    /// Start command template
    #[serde(default)]
    pub start: Option<String>,
    /// Stop command template
    #[serde(default)]
    pub stop: Option<String>,
    /// Status-check command template
    #[serde(default)]
    pub status: Option<String>,
    /// Transport reference
    #[serde(default)]
    pub transport: Option<String>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Services that must be handled before this one when starting
    #[serde(default)]
    pub after: Vec<String>,
    /// Disabled services are pruned at load
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Fire the first status probe without an initial wait
    #[serde(default)]
    pub probe_immediately: bool,
}

fn default_enabled() -> bool {
    true
}

/// Host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Services deployed on this host
    #[serde(default)]
    pub services: Vec<String>,
}
