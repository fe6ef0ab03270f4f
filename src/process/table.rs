// src/process/table.rs

//! Production child registry.
//!
//! Every child spawned through a [`ProcessTable`] is tracked until the
//! process ends. Exit statuses are cached once observed, so both the unit
//! runner (waiting for its child) and the cleanup pass (enumerating the
//! survivors) can poll the same table without stealing each other's result.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info};

use crate::errors::{Result, SafeRunError};
use crate::process::ChildProcessRegistry;
use crate::process::strategy::spawn_strategy;
use crate::types::{ChildId, SpawnStrategy};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// What to spawn: a program, its arguments, and where/how to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Label used in logs and errors (the unit name, or the program for
    /// ad-hoc runs).
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug)]
struct Tracked {
    name: String,
    child: Child,
    leads_group: bool,
    status: Option<ExitStatus>,
}

impl Tracked {
    fn poll(&mut self) -> std::io::Result<Option<ExitStatus>> {
        if self.status.is_none() {
            self.status = self.child.try_wait()?;
        }
        Ok(self.status)
    }
}

/// Registry of children spawned by this process.
#[derive(Debug, Default)]
pub struct ProcessTable {
    children: Mutex<HashMap<ChildId, Tracked>>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `spec` with inherited stdio under the process-wide spawn
    /// strategy and start tracking it.
    pub fn spawn(&self, spec: &CommandSpec) -> Result<ChildId> {
        let strategy = spawn_strategy();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).envs(&spec.env);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        apply_strategy(&mut cmd, strategy);

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning process for unit '{}'", spec.name))?;
        let id = ChildId(child.id());

        info!(
            unit = %spec.name,
            pid = %id,
            %strategy,
            program = %spec.program,
            "spawned child process"
        );

        self.lock().insert(
            id,
            Tracked {
                name: spec.name.clone(),
                child,
                leads_group: strategy.leads_group(),
                status: None,
            },
        );

        Ok(id)
    }

    /// Exit status of `id` if it has exited, without blocking.
    pub fn try_status(&self, id: ChildId) -> Result<Option<ExitStatus>> {
        let mut children = self.lock();
        let tracked = children.get_mut(&id).ok_or(SafeRunError::UnknownChild(id))?;
        Ok(tracked.poll()?)
    }

    /// Wait for `id` to exit without blocking the async runtime.
    pub async fn wait_for(&self, id: ChildId) -> Result<ExitStatus> {
        loop {
            if let Some(status) = self.try_status(id)? {
                return Ok(status);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChildId, Tracked>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal(&self, id: ChildId, kind: SignalKind) -> Result<()> {
        let mut children = self.lock();
        let tracked = children.get_mut(&id).ok_or(SafeRunError::UnknownChild(id))?;

        if tracked.poll()?.is_some() {
            debug!(unit = %tracked.name, pid = %id, "child already exited; not signalling");
            return Ok(());
        }

        debug!(unit = %tracked.name, pid = %id, ?kind, "signalling child process");
        deliver(id, tracked, kind)
    }
}

impl ChildProcessRegistry for ProcessTable {
    fn list_active(&self) -> Result<Vec<ChildId>> {
        let mut children = self.lock();
        let mut active = Vec::new();
        for (id, tracked) in children.iter_mut() {
            if tracked.poll()?.is_none() {
                active.push(*id);
            }
        }
        active.sort();
        Ok(active)
    }

    fn request_terminate(&self, id: ChildId) -> Result<()> {
        self.signal(id, SignalKind::Terminate)
    }

    fn force_kill(&self, id: ChildId) -> Result<()> {
        self.signal(id, SignalKind::Kill)
    }

    fn wait_exit(&self, id: ChildId, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_status(id)?.is_some() {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SignalKind {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn apply_strategy(cmd: &mut Command, strategy: SpawnStrategy) {
    use std::os::unix::process::CommandExt;

    match strategy {
        SpawnStrategy::Inherit => {}
        SpawnStrategy::ProcessGroup => {
            cmd.process_group(0);
        }
        SpawnStrategy::Session => {
            // SAFETY: setsid() is async-signal-safe and runs in the forked
            // child before exec.
            unsafe {
                cmd.pre_exec(|| {
                    nix::unistd::setsid()
                        .map(|_| ())
                        .map_err(std::io::Error::from)
                });
            }
        }
    }
}

#[cfg(not(unix))]
fn apply_strategy(_cmd: &mut Command, _strategy: SpawnStrategy) {}

/// Signal the child, or its whole process group when it leads one.
///
/// ESRCH means the target is already gone and counts as success.
#[cfg(unix)]
fn deliver(id: ChildId, tracked: &mut Tracked, kind: SignalKind) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::Pid;

    let signal = match kind {
        SignalKind::Terminate => Signal::SIGTERM,
        SignalKind::Kill => Signal::SIGKILL,
    };
    let pid = Pid::from_raw(id.0 as i32);

    let res = if tracked.leads_group {
        killpg(pid, signal)
    } else {
        kill(pid, signal)
    };

    match res {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(SafeRunError::Signal {
            id,
            reason: format!("{signal}: {e}"),
        }),
    }
}

/// Without signals, polite termination degrades to a kill.
#[cfg(not(unix))]
fn deliver(id: ChildId, tracked: &mut Tracked, _kind: SignalKind) -> Result<()> {
    tracked.child.kill().map_err(|e| SafeRunError::Signal {
        id,
        reason: e.to_string(),
    })
}
