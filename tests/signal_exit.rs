// tests/signal_exit.rs
//
// Drives the real binary: a termination signal while `exec` is waiting on a
// child must clean the child up and end the runner with status 0.
#![cfg(unix)]

mod common;
use crate::common::TestResult;

use std::fs;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

const ROUNDS: usize = 5;

/// Start `safe-runner exec` on a shell that records its pid and then becomes
/// `sleep 30`. Returns the runner and the sleeper's pid.
fn start_runner(dir: &Path) -> Result<(Child, Pid), Box<dyn std::error::Error>> {
    let pid_file = dir.join("sleeper.pid");
    let _ = fs::remove_file(&pid_file);

    let script = format!("echo $$ > '{}'; exec sleep 30", pid_file.display());
    let runner = Command::new(env!("CARGO_BIN_EXE_safe-runner"))
        .arg("--config")
        .arg(dir.join("SafeRunner.toml"))
        .args(["exec", "--", "sh", "-c", &script])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(contents) = fs::read_to_string(&pid_file) {
            if let Ok(pid) = contents.trim().parse::<i32>() {
                return Ok((runner, Pid::from_raw(pid)));
            }
        }
        if Instant::now() > deadline {
            return Err("sleeper never wrote its pid".into());
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn wait_with_deadline(child: &mut Child, limit: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }
        thread::sleep(Duration::from_millis(20));
    }
    let _ = child.kill();
    let _ = child.wait();
    None
}

fn is_gone(pid: Pid) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if kill(pid, None) == Err(Errno::ESRCH) {
            return true;
        }
        if Instant::now() > deadline {
            // Don't leave a stray sleeper behind a failing test.
            let _ = kill(pid, Signal::SIGKILL);
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn signal_ends_runner_cleanly(signal: Signal) -> TestResult {
    let dir = tempfile::tempdir()?;

    for round in 0..ROUNDS {
        let (mut runner, sleeper) = start_runner(dir.path())?;
        thread::sleep(Duration::from_millis(100));

        kill(Pid::from_raw(runner.id() as i32), signal)?;

        let status = wait_with_deadline(&mut runner, Duration::from_secs(10));
        assert_eq!(
            status.and_then(|s| s.code()),
            Some(0),
            "round {round}: runner should exit 0 after {signal:?}, got {status:?}"
        );
        assert!(
            is_gone(sleeper),
            "round {round}: child {sleeper} survived {signal:?}"
        );
    }
    Ok(())
}

#[test]
fn sigterm_cleans_up_and_exits_zero() -> TestResult {
    signal_ends_runner_cleanly(Signal::SIGTERM)
}

#[test]
fn sigint_cleans_up_and_exits_zero() -> TestResult {
    signal_ends_runner_cleanly(Signal::SIGINT)
}
