// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SafeRunError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SafeRunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.unit))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_units(cfg)?;
    validate_global_config(cfg)?;
    validate_units(cfg)?;
    Ok(())
}

fn ensure_has_units(cfg: &RawConfigFile) -> Result<()> {
    if cfg.unit.is_empty() {
        return Err(SafeRunError::ConfigError(
            "config must contain at least one [unit.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    // spawn_strategy is strongly typed and checked during deserialization.
    if cfg.config.terminate_timeout_ms == 0 {
        return Err(SafeRunError::ConfigError(
            "[config].terminate_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_units(cfg: &RawConfigFile) -> Result<()> {
    for (name, unit) in cfg.unit.iter() {
        match unit.cmd.first() {
            None => {
                return Err(SafeRunError::ConfigError(format!(
                    "unit '{}' has an empty `cmd`",
                    name
                )));
            }
            Some(program) if program.trim().is_empty() => {
                return Err(SafeRunError::ConfigError(format!(
                    "unit '{}' has a blank program name in `cmd`",
                    name
                )));
            }
            Some(_) => {}
        }

        if let Some(key) = unit.env.keys().find(|k| k.is_empty() || k.contains('=')) {
            return Err(SafeRunError::ConfigError(format!(
                "unit '{}' has invalid environment variable name '{}'",
                name, key
            )));
        }
    }
    Ok(())
}
