use std::fmt;

use serde::Deserialize;

/// Identifier of a tracked child process.
///
/// In production this is the OS pid; fake registries are free to hand out
/// any numbers they like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChildId(pub u32);

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How new children are isolated from the current process.
///
/// - `Inherit`: the child shares our process group and terminal.
/// - `ProcessGroup`: the child leads a fresh process group, so signals can be
///   delivered to everything it spawns in turn.
/// - `Session`: the child leads a new session (and process group) and has no
///   controlling terminal. This is the strictest option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnStrategy {
    Inherit,
    ProcessGroup,
    Session,
}

impl SpawnStrategy {
    /// The most isolated strategy available on this platform.
    pub fn strictest() -> Self {
        if cfg!(unix) {
            SpawnStrategy::Session
        } else {
            SpawnStrategy::Inherit
        }
    }

    /// Whether children spawned with this strategy lead their own process
    /// group (and can therefore be signalled as a group).
    pub fn leads_group(self) -> bool {
        !matches!(self, SpawnStrategy::Inherit)
    }
}

impl Default for SpawnStrategy {
    fn default() -> Self {
        SpawnStrategy::Inherit
    }
}

impl fmt::Display for SpawnStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpawnStrategy::Inherit => "inherit",
            SpawnStrategy::ProcessGroup => "process_group",
            SpawnStrategy::Session => "session",
        };
        f.write_str(s)
    }
}
