// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::{ChildId, SpawnStrategy};

#[derive(Error, Debug)]
pub enum SafeRunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    /// The wrapped work was cancelled by the user (Ctrl-C style).
    #[error("Execution interrupted by user")]
    Interrupted,

    #[error("Unit '{unit}' exited with status {code}")]
    UnitFailed { unit: String, code: i32 },

    #[error("Unit work panicked: {0}")]
    WorkPanicked(String),

    #[error("Child process {0} is not tracked")]
    UnknownChild(ChildId),

    #[error("Failed to signal child process {id}: {reason}")]
    Signal { id: ChildId, reason: String },

    #[error("Spawn strategy already configured as {0}")]
    StrategyAlreadySet(SpawnStrategy),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SafeRunError>;
