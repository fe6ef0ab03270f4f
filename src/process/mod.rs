// src/process/mod.rs

//! Child-process layer.
//!
//! The shutdown wrapper never talks to the OS directly. It goes through the
//! [`ChildProcessRegistry`] capability, which makes the cleanup algorithm
//! testable with a fake registry while production code uses
//! [`ProcessTable`].
//!
//! - [`table`] spawns and tracks real children (`std::process`), and delivers
//!   termination signals (`nix` on Unix).
//! - [`strategy`] holds the process-wide spawn isolation setting.

use std::time::Duration;

use crate::errors::Result;
use crate::types::ChildId;

pub mod strategy;
pub mod table;

pub use strategy::{configure_spawn_strategy, spawn_strategy};
pub use table::{CommandSpec, ProcessTable};

/// Capability interface over the set of children spawned by this process.
///
/// Implementations must be internally synchronized: cleanup may run from a
/// signal-listener task, a blocking worker thread, or a `Drop` impl.
pub trait ChildProcessRegistry: Send + Sync {
    /// Children that have not been observed to exit yet.
    fn list_active(&self) -> Result<Vec<ChildId>>;

    /// Politely ask a child to shut down (SIGTERM on Unix).
    fn request_terminate(&self, id: ChildId) -> Result<()>;

    /// Kill a child without giving it a chance to clean up.
    fn force_kill(&self, id: ChildId) -> Result<()>;

    /// Block for at most `timeout` waiting for the child to exit.
    ///
    /// Returns `true` if the child is gone.
    fn wait_exit(&self, id: ChildId, timeout: Duration) -> Result<bool>;
}
