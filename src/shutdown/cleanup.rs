// src/shutdown/cleanup.rs

//! Child-process cleanup pass.
//!
//! This is the pure algorithm behind `ShutdownController::cleanup`: it only
//! talks to a [`ChildProcessRegistry`], never to the OS, so it can be driven
//! by a fake registry in tests.
//!
//! For every active child: one polite termination request, one bounded wait,
//! and a forced kill if the child is still around. Every failure becomes a
//! [`CleanupWarning`]; nothing is propagated and nothing stops the pass.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::errors::SafeRunError;
use crate::process::ChildProcessRegistry;
use crate::types::ChildId;

/// Something that went wrong while cleaning up. Logged, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    /// The child being handled, or `None` for enumeration failures.
    pub child: Option<ChildId>,
    pub message: String,
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.child {
            Some(id) => write!(f, "child {id}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Summary of one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Polite termination requests that were delivered.
    pub terminated: usize,
    /// Children that outlived the timeout and were killed.
    pub killed: usize,
    pub warnings: Vec<CleanupWarning>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, child: Option<ChildId>, err: &SafeRunError) {
        let warning = CleanupWarning {
            child,
            message: err.to_string(),
        };
        warn!(warning = %warning, "cleanup warning");
        self.warnings.push(warning);
    }
}

/// Run-once barrier around a cleanup pass.
///
/// The first caller of [`run_once`](Self::run_once) runs the pass. Callers
/// that arrive while it is in progress block until it has finished, then
/// get `None` like every later caller.
#[derive(Debug, Default)]
pub struct CleanupLatch(OnceLock<CleanupReport>);

impl CleanupLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the report only to the caller whose `pass` actually ran.
    pub fn run_once(&self, pass: impl FnOnce() -> CleanupReport) -> Option<CleanupReport> {
        let mut ran = false;
        let report = self.0.get_or_init(|| {
            ran = true;
            pass()
        });
        ran.then(|| report.clone())
    }

    /// Whether a cleanup pass has finished.
    pub fn is_set(&self) -> bool {
        self.0.get().is_some()
    }

    pub fn report(&self) -> Option<&CleanupReport> {
        self.0.get()
    }
}

/// Terminate every active child of `registry`, escalating to a kill after
/// `timeout`.
pub fn run_cleanup(registry: &dyn ChildProcessRegistry, timeout: Duration) -> CleanupReport {
    let mut report = CleanupReport::default();

    let children = match registry.list_active() {
        Ok(children) => children,
        Err(err) => {
            report.warn(None, &err);
            return report;
        }
    };

    debug!(count = children.len(), ?timeout, "cleaning up child processes");

    for id in children {
        stop_child(registry, id, timeout, &mut report);
    }

    if report.is_clean() {
        info!(
            terminated = report.terminated,
            killed = report.killed,
            "cleaned up child processes"
        );
    } else {
        warn!(
            terminated = report.terminated,
            killed = report.killed,
            warnings = report.warnings.len(),
            "child process cleanup finished with warnings"
        );
    }

    report
}

fn stop_child(
    registry: &dyn ChildProcessRegistry,
    id: ChildId,
    timeout: Duration,
    report: &mut CleanupReport,
) {
    match registry.request_terminate(id) {
        Ok(()) => report.terminated += 1,
        Err(err) => report.warn(Some(id), &err),
    }

    let exited = match registry.wait_exit(id, timeout) {
        Ok(exited) => exited,
        Err(err) => {
            report.warn(Some(id), &err);
            false
        }
    };

    if exited {
        debug!(pid = %id, "child exited after termination request");
        return;
    }

    match registry.force_kill(id) {
        Ok(()) => {
            report.killed += 1;
            warn!(pid = %id, ?timeout, "child ignored termination request; killed");
        }
        Err(err) => report.warn(Some(id), &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_runs_the_pass_once() {
        let latch = CleanupLatch::new();
        assert!(!latch.is_set());

        let first = latch.run_once(|| CleanupReport {
            terminated: 2,
            ..CleanupReport::default()
        });
        assert_eq!(first.map(|r| r.terminated), Some(2));
        assert!(latch.is_set());

        assert!(latch.run_once(|| unreachable!("second pass")).is_none());
        assert_eq!(latch.report().map(|r| r.terminated), Some(2));
    }

    #[test]
    fn late_callers_wait_for_the_running_pass() {
        use std::sync::Arc;
        use std::sync::mpsc;
        use std::thread;

        let latch = Arc::new(CleanupLatch::new());
        let (started_tx, started_rx) = mpsc::channel();

        let first = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || {
                latch.run_once(|| {
                    started_tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(100));
                    CleanupReport {
                        killed: 1,
                        ..CleanupReport::default()
                    }
                })
            })
        };

        started_rx.recv().unwrap();
        assert!(latch.run_once(CleanupReport::default).is_none());
        // Only returns once the first pass has stored its report.
        assert!(latch.is_set());
        assert_eq!(latch.report().map(|r| r.killed), Some(1));

        assert!(first.join().unwrap().is_some());
    }

    #[test]
    fn warning_display_names_the_child() {
        let w = CleanupWarning {
            child: Some(ChildId(42)),
            message: "boom".to_string(),
        };
        assert_eq!(w.to_string(), "child 42: boom");

        let w = CleanupWarning {
            child: None,
            message: "listing failed".to_string(),
        };
        assert_eq!(w.to_string(), "listing failed");
    }
}
