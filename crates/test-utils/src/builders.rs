#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use safe_runner::config::{ConfigFile, ConfigSection, RawConfigFile, UnitConfig};
use safe_runner::types::SpawnStrategy;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                unit: BTreeMap::new(),
            },
        }
    }

    pub fn with_unit(mut self, name: &str, unit: UnitConfig) -> Self {
        self.config.unit.insert(name.to_string(), unit);
        self
    }

    pub fn terminate_timeout_ms(mut self, ms: u64) -> Self {
        self.config.config.terminate_timeout_ms = ms;
        self
    }

    pub fn spawn_strategy(mut self, strategy: SpawnStrategy) -> Self {
        self.config.config.spawn_strategy = strategy;
        self
    }

    /// The raw, unvalidated config (for exercising validation).
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `UnitConfig`.
pub struct UnitConfigBuilder {
    unit: UnitConfig,
}

impl UnitConfigBuilder {
    pub fn new(cmd: &[&str]) -> Self {
        Self {
            unit: UnitConfig {
                cmd: cmd.iter().map(|s| s.to_string()).collect(),
                description: None,
                cwd: None,
                env: BTreeMap::new(),
            },
        }
    }

    pub fn description(mut self, text: &str) -> Self {
        self.unit.description = Some(text.to_string());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.unit.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.unit.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> UnitConfig {
        self.unit
    }
}
