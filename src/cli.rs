// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::LaunchType;

/// Command-line arguments for `launchkit`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "launchkit",
    version,
    about = "Launch applications through hooks and track the processes they start.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `LAUNCHKIT_CONFIG`, then `Launchkit.toml` in the current
    /// directory. A missing default file means built-in defaults.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LAUNCHKIT_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Launch an application by full name (`group/variant`).
    Launch {
        app: String,

        /// Launch type hooks are filtered on.
        #[arg(long, default_value = "local", value_name = "TYPE")]
        launch_type: LaunchType,

        /// Environment group recorded on the launch context.
        #[arg(long, value_name = "NAME")]
        env_group: Option<String>,

        /// Run the pre-launch hooks and print the resulting command line and
        /// environment without spawning anything.
        #[arg(long)]
        dry_run: bool,

        /// Wait for the process to exit (direct spawns only).
        #[arg(long)]
        wait: bool,

        /// Extra arguments passed to the application.
        #[arg(last = true, value_name = "ARGS")]
        args: Vec<String>,
    },

    /// List configured applications.
    Apps,

    /// List recorded processes, newest first.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show one recorded process.
    Show {
        /// Record hash or a unique prefix of it.
        hash: String,
    },

    /// Print a process's captured output.
    Output {
        hash: String,

        /// Keep printing as output is appended (Ctrl-C to stop).
        #[arg(long, short)]
        follow: bool,
    },

    /// Delete one record and its output file.
    Rm { hash: String },

    /// Delete every record whose process is no longer running.
    Clean,

    /// Watch the registry and report processes starting and exiting.
    Monitor {
        /// Poll interval in seconds.
        #[arg(long, default_value_t = 2, value_name = "SECS")]
        interval: u64,
    },
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
    use clap::CommandFactory;

    use crate::config::DEFAULT_CONFIG_FILE;

    #[test]
    fn config_help_names_the_default_file() {
        let cmd = CliArgs::command();
        let config = cmd
            .get_arguments()
            .find(|arg| arg.get_id() == "config")
            .unwrap();
        let help = config.get_long_help().unwrap().to_string();
        assert!(help.contains(DEFAULT_CONFIG_FILE));
        assert!(help.contains("current directory"));
    }

    #[test]
    fn launch_collects_trailing_args() {
        let args = CliArgs::try_parse_from([
            "launchkit",
            "launch",
            "maya/2025",
            "--launch-type",
            "farm-render",
            "--",
            "-file",
            "scene.ma",
        ])
        .unwrap();
        match args.command {
            Command::Launch {
                app,
                launch_type,
                args,
                ..
            } => {
                assert_eq!(app, "maya/2025");
                assert_eq!(launch_type, LaunchType::FarmRender);
                assert_eq!(args, vec!["-file", "scene.ma"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let args = CliArgs::try_parse_from(["launchkit", "list", "--log-level", "debug"]).unwrap();
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}
