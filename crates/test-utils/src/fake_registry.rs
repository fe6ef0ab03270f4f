use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use safe_runner::errors::{Result, SafeRunError};
use safe_runner::process::ChildProcessRegistry;
use safe_runner::types::ChildId;

/// How a fake child reacts to the cleanup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildBehaviour {
    /// Exits as soon as it is asked to terminate.
    ExitsOnTerminate,
    /// Ignores the termination request; only a kill stops it.
    IgnoresTerminate,
    /// Delivering the termination request fails; the child stays alive.
    TerminateFails,
    /// Waiting for the child fails after the termination request.
    WaitFails,
    /// Both the termination request and the kill fail.
    Unkillable,
}

#[derive(Debug)]
struct FakeChild {
    behaviour: ChildBehaviour,
    exited: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: u32,
    children: BTreeMap<ChildId, FakeChild>,
    fail_listing: bool,
    list_calls: usize,
    terminate_calls: Vec<ChildId>,
    kill_calls: Vec<ChildId>,
    wait_calls: Vec<ChildId>,
}

/// A fake child registry that:
/// - hands out sequential `ChildId`s
/// - records every call the cleanup pass makes
/// - never touches real processes or sleeps.
///
/// Clones share state, so a test can keep one handle while the controller
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeRegistry {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        let reg = Self::default();
        reg.state.lock().unwrap().next_id = 1000;
        reg
    }

    pub fn add_child(&self, behaviour: ChildBehaviour) -> ChildId {
        let mut state = self.state.lock().unwrap();
        let id = ChildId(state.next_id);
        state.next_id += 1;
        state.children.insert(
            id,
            FakeChild {
                behaviour,
                exited: false,
            },
        );
        id
    }

    pub fn with_children(self, behaviour: ChildBehaviour, count: usize) -> Self {
        for _ in 0..count {
            self.add_child(behaviour);
        }
        self
    }

    /// Make `list_active` fail.
    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn terminate_calls(&self) -> Vec<ChildId> {
        self.state.lock().unwrap().terminate_calls.clone()
    }

    pub fn kill_calls(&self) -> Vec<ChildId> {
        self.state.lock().unwrap().kill_calls.clone()
    }

    pub fn wait_calls(&self) -> Vec<ChildId> {
        self.state.lock().unwrap().wait_calls.clone()
    }

    pub fn alive(&self) -> Vec<ChildId> {
        let state = self.state.lock().unwrap();
        state
            .children
            .iter()
            .filter(|(_, c)| !c.exited)
            .map(|(id, _)| *id)
            .collect()
    }
}

fn signal_error(id: ChildId, what: &str) -> SafeRunError {
    SafeRunError::Signal {
        id,
        reason: format!("fake {what} failure"),
    }
}

impl ChildProcessRegistry for FakeRegistry {
    fn list_active(&self) -> Result<Vec<ChildId>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.fail_listing {
            return Err(SafeRunError::Other(anyhow::anyhow!("fake listing failure")));
        }
        Ok(state
            .children
            .iter()
            .filter(|(_, c)| !c.exited)
            .map(|(id, _)| *id)
            .collect())
    }

    fn request_terminate(&self, id: ChildId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.terminate_calls.push(id);
        let child = state
            .children
            .get_mut(&id)
            .ok_or(SafeRunError::UnknownChild(id))?;
        match child.behaviour {
            ChildBehaviour::ExitsOnTerminate | ChildBehaviour::WaitFails => {
                child.exited = true;
                Ok(())
            }
            ChildBehaviour::IgnoresTerminate => Ok(()),
            ChildBehaviour::TerminateFails | ChildBehaviour::Unkillable => {
                Err(signal_error(id, "terminate"))
            }
        }
    }

    fn force_kill(&self, id: ChildId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.kill_calls.push(id);
        let child = state
            .children
            .get_mut(&id)
            .ok_or(SafeRunError::UnknownChild(id))?;
        if child.behaviour == ChildBehaviour::Unkillable {
            return Err(signal_error(id, "kill"));
        }
        child.exited = true;
        Ok(())
    }

    fn wait_exit(&self, id: ChildId, _timeout: Duration) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.wait_calls.push(id);
        let child = state
            .children
            .get(&id)
            .ok_or(SafeRunError::UnknownChild(id))?;
        if child.behaviour == ChildBehaviour::WaitFails {
            return Err(SafeRunError::IoError(std::io::Error::other("fake wait failure")));
        }
        Ok(child.exited)
    }
}
