// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod process;
pub mod shutdown;
pub mod types;
pub mod unit;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, ConfigSection, load_and_validate, load_or_default};
use crate::process::{CommandSpec, ProcessTable};
use crate::shutdown::{ShutdownController, ShutdownOptions};

/// High-level entry point used by `main.rs`.
///
/// Returns the exit status the process should end with.
///
/// This wires together:
/// - config loading
/// - unit resolution
/// - the process table
/// - the shutdown controller and its scoped execution
pub async fn run(args: CliArgs) -> Result<i32> {
    match args.command {
        Command::List => {
            let cfg = load_and_validate(&args.config)?;
            print_units(&cfg);
            Ok(0)
        }
        Command::Run { unit: name, dry_run } => {
            let cfg = load_and_validate(&args.config)?;
            if dry_run {
                let spec = unit::resolve_unit(&cfg, &name)?;
                print_dry_run(&cfg.config, &spec);
                return Ok(0);
            }
            info!(unit = %name, "running unit safely");
            let spec = unit::resolve_unit(&cfg, &name);
            execute(&cfg.config, spec).await
        }
        Command::Exec { command } => {
            let cfg = load_or_default(&args.config)?;
            let spec = unit::adhoc_spec(&command);
            execute(&cfg.config, spec).await
        }
    }
}

/// Run one command inside a fresh shutdown controller.
///
/// `spec` is resolved before the call but only inspected inside the scoped
/// work, so a bad unit name still goes through cleanup like any other
/// failure.
async fn execute(section: &ConfigSection, spec: errors::Result<CommandSpec>) -> Result<i32> {
    let table = Arc::new(ProcessTable::new());
    let mut controller =
        ShutdownController::install(table.clone(), ShutdownOptions::from(section))?;

    let work_table = Arc::clone(&table);
    let outcome = controller
        .scoped(move || async move {
            let spec = spec?;
            unit::run_command(&work_table, spec).await
        })
        .await;

    controller.dispose();
    debug!(?outcome, "scoped execution finished");

    Ok(outcome.exit_code())
}

fn print_units(cfg: &ConfigFile) {
    println!("units ({}):", cfg.unit.len());
    for (name, unit) in cfg.unit.iter() {
        match unit.description {
            Some(ref d) => println!("  - {name}: {d}"),
            None => println!("  - {name}"),
        }
    }
}

fn print_dry_run(section: &ConfigSection, spec: &CommandSpec) {
    println!("safe-runner dry-run");
    println!("  config.terminate_timeout_ms = {}", section.terminate_timeout_ms);
    println!("  config.spawn_strategy = {}", section.spawn_strategy);
    println!();
    println!("unit: {}", spec.name);
    println!("  program: {}", spec.program);
    if !spec.args.is_empty() {
        println!("  args: {:?}", spec.args);
    }
    if let Some(ref cwd) = spec.cwd {
        println!("  cwd: {}", cwd.display());
    }
    for (k, v) in spec.env.iter() {
        println!("  env: {k}={v}");
    }

    debug!("dry-run complete (no execution)");
}
