//! Configuration System
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./treelock.yaml` (current directory - highest priority)
//! 2. `~/.config/treelock/treelock.yaml` (user config directory)
//! 3. `/etc/treelock/treelock.yaml` (system - lowest priority)
//!
//! Sections present in higher priority files override those from lower
//! priority files. The defaults describe the ten-node reference tree with
//! node 0 as starter.
//!
//! # YAML Structure
//!
//! ```yaml
//! timing:
//!   bootstrap_delay_ms: 5000
//!   critical_section_ms: 2000
//!   crash_ms: 15000
//! topology:
//!   nodes: 10
//!   starter: 0
//!   edges: [[0, 1], [0, 2], [0, 3], [1, 4], [1, 9], [2, 5], [2, 6], [3, 7], [3, 8]]
//! node:
//!   mailbox_capacity: 64
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topology::{Topology, TopologyError};

/// Default config filename.
const CONFIG_FILENAME: &str = "treelock.yaml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),
}

fn default_bootstrap_delay_ms() -> u64 {
    5000
}

fn default_critical_section_ms() -> u64 {
    2000
}

fn default_crash_ms() -> u64 {
    15_000
}

/// Tuned protocol timing, in milliseconds (`timing.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Delay after bootstrap before the starter initializes itself.
    #[serde(default = "default_bootstrap_delay_ms")]
    pub bootstrap_delay_ms: u64,

    /// Simulated duration of the critical section.
    #[serde(default = "default_critical_section_ms")]
    pub critical_section_ms: u64,

    /// Simulated crash duration. Must exceed the worst-case in-flight
    /// delivery latency so the crash masks the node for a full quiescence
    /// interval.
    #[serde(default = "default_crash_ms")]
    pub crash_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            bootstrap_delay_ms: default_bootstrap_delay_ms(),
            critical_section_ms: default_critical_section_ms(),
            crash_ms: default_crash_ms(),
        }
    }
}

impl TimingConfig {
    /// Bootstrap delay as a [`Duration`].
    pub fn bootstrap_delay(&self) -> Duration {
        Duration::from_millis(self.bootstrap_delay_ms)
    }

    /// Critical section duration as a [`Duration`].
    pub fn critical_section(&self) -> Duration {
        Duration::from_millis(self.critical_section_ms)
    }

    /// Crash duration as a [`Duration`].
    pub fn crash(&self) -> Duration {
        Duration::from_millis(self.crash_ms)
    }
}

fn default_nodes() -> u32 {
    10
}

fn default_edges() -> Vec<[u32; 2]> {
    vec![
        [0, 1],
        [0, 2],
        [0, 3],
        [1, 4],
        [1, 9],
        [2, 5],
        [2, 6],
        [3, 7],
        [3, 8],
    ]
}

/// Tree shape (`topology.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Number of nodes, IDs `0..nodes`.
    #[serde(default = "default_nodes")]
    pub nodes: u32,

    /// The node that seeds the protocol as initial token holder.
    #[serde(default)]
    pub starter: u32,

    /// Undirected tree edges as `[a, b]` pairs.
    #[serde(default = "default_edges")]
    pub edges: Vec<[u32; 2]>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            starter: 0,
            edges: default_edges(),
        }
    }
}

fn default_mailbox_capacity() -> usize {
    64
}

/// Per-node runtime settings (`node.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Mailbox channel buffer size.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Protocol timing (`timing.*`).
    #[serde(default)]
    pub timing: TimingConfig,

    /// Tree shape (`topology.*`).
    #[serde(default)]
    pub topology: TopologyConfig,

    /// Per-node runtime settings (`node.*`).
    #[serde(default)]
    pub node: NodeConfig,
}

/// Parse-time mirror of [`Config`] where every section is optional, so a
/// file only overrides the sections it names.
#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    timing: Option<TimingConfig>,
    topology: Option<TopologyConfig>,
    node: Option<NodeConfig>,
}

impl Config {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Files are loaded in reverse priority order and merged:
    /// 1. `/etc/treelock/treelock.yaml` (loaded first, lowest priority)
    /// 2. `~/.config/treelock/treelock.yaml` (user config)
    /// 3. `./treelock.yaml` (loaded last, highest priority)
    ///
    /// Returns a tuple of (config, paths_loaded) where paths_loaded contains
    /// the paths that were successfully loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let search_paths = Self::search_paths();
        Self::load_from_paths(&search_paths)
    }

    /// Load configuration from specific paths.
    ///
    /// Paths are processed in order, with later paths overriding earlier ones.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut loaded_paths = Vec::new();

        for path in paths {
            if path.exists() {
                let partial = Self::parse_file(path)?;
                config.merge(partial);
                loaded_paths.push(path.clone());
            }
        }

        Ok((config, loaded_paths))
    }

    /// Load configuration from a single file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.merge(Self::parse_file(path)?);
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<PartialConfig, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the standard search paths in priority order (lowest to highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System config (lowest priority)
        paths.push(PathBuf::from("/etc/treelock").join(CONFIG_FILENAME));

        // User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("treelock").join(CONFIG_FILENAME));
        }

        // Current directory (highest priority)
        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge a parsed file into this configuration.
    ///
    /// Sections present in `other` override the corresponding sections here.
    fn merge(&mut self, other: PartialConfig) {
        if let Some(timing) = other.timing {
            self.timing = timing;
        }
        if let Some(topology) = other.topology {
            self.topology = topology;
        }
        if let Some(node) = other.node {
            self.node = node;
        }
    }

    /// Validate the topology section into a [`Topology`].
    pub fn topology(&self) -> Result<Topology, ConfigError> {
        let edges: Vec<(u32, u32)> = self.topology.edges.iter().map(|e| (e[0], e[1])).collect();
        Ok(Topology::from_edges(
            self.topology.nodes,
            self.topology.starter,
            &edges,
        )?)
    }
}
