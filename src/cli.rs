// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_CONFIG_PATH;

/// Command-line arguments for `safe-runner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "safe-runner",
    version,
    about = "Run a unit of work and always clean up the child processes it leaves behind.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `SafeRunner.toml` in the current working directory.
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SAFE_RUNNER_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a unit defined in the config file.
    Run {
        /// Name of the `[unit.<name>]` section.
        unit: String,

        /// Print what would be executed, but don't spawn anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run an ad-hoc command under the same shutdown wrapper.
    Exec {
        /// Program followed by its arguments.
        #[arg(
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "COMMAND"
        )]
        command: Vec<String>,
    },

    /// List the units defined in the config file.
    List,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_global_flags() {
        let args = CliArgs::try_parse_from([
            "safe-runner",
            "run",
            "linkedlist",
            "--config",
            "units.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.config, "units.toml");
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        match args.command {
            Command::Run { unit, dry_run } => {
                assert_eq!(unit, "linkedlist");
                assert!(!dry_run);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn exec_keeps_hyphenated_child_args() {
        let args =
            CliArgs::try_parse_from(["safe-runner", "exec", "--", "python3", "-u", "script.py"])
                .unwrap();

        assert_eq!(args.config, DEFAULT_CONFIG_PATH);
        match args.command {
            Command::Exec { command } => assert_eq!(command, vec!["python3", "-u", "script.py"]),
            other => panic!("expected exec, got {other:?}"),
        }
    }

    #[test]
    fn exec_requires_a_command() {
        assert!(CliArgs::try_parse_from(["safe-runner", "exec"]).is_err());
    }
}
