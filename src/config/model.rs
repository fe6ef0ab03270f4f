// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::SpawnStrategy;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// terminate_timeout_ms = 1000
/// spawn_strategy = "session"
///
/// [unit.linkedlist]
/// cmd = ["python3", "dsa/linkedlist.py"]
/// description = "Build and print a singly linked list"
/// env = { PYTHONHASHSEED = "0" }
/// ```
///
/// All sections are optional at this level; [`ConfigFile`] is the validated
/// form the rest of the crate consumes.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All units from `[unit.<name>]`, keyed by unit name.
    #[serde(default)]
    pub unit: BTreeMap<String, UnitConfig>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub unit: BTreeMap<String, UnitConfig>,
}

impl ConfigFile {
    /// Build without running validation. Use `ConfigFile::try_from` instead.
    pub(crate) fn new_unchecked(config: ConfigSection, unit: BTreeMap<String, UnitConfig>) -> Self {
        Self { config, unit }
    }

    /// Configuration used when no config file exists (ad-hoc `exec`).
    pub fn empty() -> Self {
        Self::new_unchecked(ConfigSection::default(), BTreeMap::new())
    }

    pub fn unit_names(&self) -> impl Iterator<Item = &str> {
        self.unit.keys().map(|s| s.as_str())
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// How long cleanup waits for each child after the polite termination
    /// request before killing it.
    #[serde(default = "default_terminate_timeout_ms")]
    pub terminate_timeout_ms: u64,

    /// Isolation applied to spawned children.
    #[serde(default = "SpawnStrategy::strictest")]
    pub spawn_strategy: SpawnStrategy,
}

fn default_terminate_timeout_ms() -> u64 {
    1000
}

impl ConfigSection {
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            terminate_timeout_ms: default_terminate_timeout_ms(),
            spawn_strategy: SpawnStrategy::strictest(),
        }
    }
}

/// `[unit.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitConfig {
    /// Program followed by its arguments. Not run through a shell.
    pub cmd: Vec<String>,

    /// Shown by `safe-runner list`.
    #[serde(default)]
    pub description: Option<String>,

    /// Working directory for the child; defaults to ours.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Extra environment variables layered over the inherited environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
