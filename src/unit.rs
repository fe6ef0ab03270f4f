// src/unit.rs

//! Units of work run under the shutdown wrapper.
//!
//! A unit is a configured external command. Resolving it, spawning it through
//! the [`ProcessTable`], and waiting for it all happen *inside* the scoped
//! execution, so an unknown name or a failing child is reported as the work
//! failing and cleanup still runs.

use std::process::ExitStatus;

use tracing::{error, info};

use crate::config::{ConfigFile, UnitConfig};
use crate::errors::{Result, SafeRunError};
use crate::process::{CommandSpec, ProcessTable};

/// Build the spawn spec for the unit called `name`.
pub fn resolve_unit(cfg: &ConfigFile, name: &str) -> Result<CommandSpec> {
    match cfg.unit.get(name) {
        Some(unit) => Ok(spec_from_config(name, unit)),
        None => {
            let available: Vec<&str> = cfg.unit_names().collect();
            error!(unit = %name, ?available, "unknown unit");
            Err(SafeRunError::UnknownUnit(name.to_string()))
        }
    }
}

/// Spec for an ad-hoc `exec` command line (`program args...`).
pub fn adhoc_spec(command: &[String]) -> Result<CommandSpec> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| SafeRunError::ConfigError("no command given".to_string()))?;
    Ok(CommandSpec::new(program.clone(), program.clone()).args(args.iter().cloned()))
}

fn spec_from_config(name: &str, unit: &UnitConfig) -> CommandSpec {
    // Validation guarantees a non-empty `cmd`.
    let (program, args) = unit
        .cmd
        .split_first()
        .map(|(p, a)| (p.clone(), a.to_vec()))
        .unwrap_or_default();

    CommandSpec {
        name: name.to_string(),
        program,
        args,
        cwd: unit.cwd.clone(),
        env: unit.env.clone(),
    }
}

/// Spawn `spec` through `table` and wait for it to exit.
pub async fn run_command(table: &ProcessTable, spec: CommandSpec) -> Result<()> {
    let id = table.spawn(&spec)?;
    let status = table.wait_for(id).await?;
    classify_exit(&spec.name, status)
}

fn classify_exit(unit: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        info!(unit = %unit, "unit finished");
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if status.signal() == Some(nix::sys::signal::Signal::SIGINT as i32) {
            return Err(SafeRunError::Interrupted);
        }
    }

    Err(SafeRunError::UnitFailed {
        unit: unit.to_string(),
        code: status.code().unwrap_or(-1),
    })
}
