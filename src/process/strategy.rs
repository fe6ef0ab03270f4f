// src/process/strategy.rs

//! Process-wide spawn isolation setting.
//!
//! The strategy can be chosen once per process. Asking for the same value
//! again is a no-op; asking for a different value afterwards fails with
//! [`SafeRunError::StrategyAlreadySet`], which callers that merely want
//! "the strictest available" are expected to ignore.

use std::sync::OnceLock;

use tracing::debug;

use crate::errors::{Result, SafeRunError};
use crate::types::SpawnStrategy;

static STRATEGY: OnceLock<SpawnStrategy> = OnceLock::new();

/// Fix the isolation strategy used for every child spawned from now on.
pub fn configure_spawn_strategy(strategy: SpawnStrategy) -> Result<()> {
    if let Err(requested) = STRATEGY.set(strategy) {
        let current = spawn_strategy();
        if current != requested {
            return Err(SafeRunError::StrategyAlreadySet(current));
        }
        return Ok(());
    }

    debug!(%strategy, "spawn strategy configured");
    Ok(())
}

/// Current strategy; `inherit` until [`configure_spawn_strategy`] is called.
pub fn spawn_strategy() -> SpawnStrategy {
    STRATEGY.get().copied().unwrap_or_default()
}
