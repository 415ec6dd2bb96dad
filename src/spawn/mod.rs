// src/spawn/mod.rs

//! Spawning launched applications.
//!
//! A [`SpawnStrategy`] starts the OS process; the [`ProcessSpawner`] wraps
//! the configured strategy, filters the environment and records every
//! successful spawn in the process registry.
//!
//! Two strategies exist:
//! - [`DirectStrategy`]: spawn the target ourselves, detached, with output
//!   redirected to a capture file.
//! - [`MidprocessStrategy`]: hand the launch to the `launchkit-mid`
//!   intermediary through a JSON handshake file, so the target is fully
//!   detached from our session.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::sync::Arc;

use tracing::{error, info};

use crate::config::{ConfigFile, SpawnSection, SpawnStrategyKind};
use crate::context::{OutputTarget, SpawnOptions};
use crate::errors::{LaunchError, Result};
use crate::registry::{ProcessRecord, ProcessRegistry};

pub mod detach;
pub mod direct;
pub mod env;
pub mod midprocess;

pub use direct::DirectStrategy;
pub use midprocess::{Handshake, MidprocessStrategy, run_intermediary};

/// Everything a strategy needs to start one process.
///
/// `args` is the final flattened argument list, starting with the program.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    /// Application full name, used for the registry record.
    pub name: String,
    /// Host identifier, used to name the output-capture file.
    pub host_name: Option<String>,
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub creation_flags: Option<u32>,
    pub stdout: OutputTarget,
    pub stderr: OutputTarget,
    pub detach: bool,
}

impl SpawnRequest {
    pub fn new(name: impl Into<String>, executable: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self::from_options(name, None, executable, args, &SpawnOptions::default())
    }

    pub fn from_options(
        name: impl Into<String>,
        host_name: Option<String>,
        executable: impl Into<PathBuf>,
        args: Vec<String>,
        options: &SpawnOptions,
    ) -> Self {
        Self {
            name: name.into(),
            host_name,
            executable: executable.into(),
            args,
            env: options.env.clone(),
            cwd: options.cwd.clone(),
            creation_flags: options.creation_flags,
            stdout: options.stdout,
            stderr: options.stderr,
            detach: options.detach,
        }
    }

    /// Program to execute and its arguments.
    ///
    /// Falls back to the executable when the argument list is empty.
    pub fn program_and_args(&self) -> (String, &[String]) {
        match self.args.split_first() {
            Some((program, rest)) => (program.clone(), rest),
            None => (self.executable.to_string_lossy().into_owned(), &[]),
        }
    }

    pub fn captures_output(&self) -> bool {
        self.stdout == OutputTarget::Capture || self.stderr == OutputTarget::Capture
    }
}

/// What a strategy reports back after a successful spawn.
#[derive(Debug)]
pub struct SpawnOutcome {
    pub pid: u32,
    /// Handle to the child, when we are its parent.
    pub child: Option<Child>,
    pub start_time: Option<f64>,
    pub output: Option<PathBuf>,
}

/// A way of starting processes.
pub trait SpawnStrategy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnOutcome>;
}

/// Pick the strategy for a `[spawn]` section.
///
/// `auto` uses the intermediary on Linux and a direct spawn elsewhere.
pub fn strategy_for(section: &SpawnSection, output_dir: PathBuf) -> Arc<dyn SpawnStrategy> {
    let use_midprocess = match section.strategy {
        SpawnStrategyKind::Direct => false,
        SpawnStrategyKind::Midprocess => true,
        SpawnStrategyKind::Auto => cfg!(target_os = "linux"),
    };
    if use_midprocess {
        Arc::new(MidprocessStrategy::new(output_dir).with_intermediary(section.midprocess.clone()))
    } else {
        Arc::new(DirectStrategy::new(output_dir))
    }
}

/// A process started by the spawner.
#[derive(Debug)]
pub struct LaunchedProcess {
    pid: u32,
    child: Option<Child>,
    start_time: Option<f64>,
    output: Option<PathBuf>,
    record_hash: Option<String>,
    strategy: &'static str,
}

impl LaunchedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// Output-capture file, if output was redirected.
    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Registry key, if the process was recorded.
    pub fn record_hash(&self) -> Option<&str> {
        self.record_hash.as_deref()
    }

    pub fn strategy(&self) -> &'static str {
        self.strategy
    }

    /// Child handle; `None` when the process was started by the
    /// intermediary.
    pub fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }

    pub fn take_child(&mut self) -> Option<Child> {
        self.child.take()
    }

    /// Wait for the child to exit, if we own it.
    pub fn wait(&mut self) -> io::Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => child.wait().map(Some),
            None => Ok(None),
        }
    }
}

/// Strategy plus registry bookkeeping.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    strategy: Arc<dyn SpawnStrategy>,
    registry: Option<ProcessRegistry>,
    ignored_env: Vec<String>,
}

impl ProcessSpawner {
    pub fn new(strategy: Arc<dyn SpawnStrategy>) -> Self {
        Self {
            strategy,
            registry: None,
            ignored_env: SpawnSection::default().ignored_env,
        }
    }

    /// Spawner for a validated config; the strategy is chosen once here.
    pub fn from_config(config: &ConfigFile, registry: Option<ProcessRegistry>) -> Self {
        let strategy = strategy_for(&config.spawn, config.output_dir());
        info!(strategy = strategy.name(), "selected spawn strategy");
        Self {
            strategy,
            registry,
            ignored_env: config.spawn.ignored_env.clone(),
        }
    }

    pub fn with_registry(mut self, registry: ProcessRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_ignored_env(mut self, ignored_env: Vec<String>) -> Self {
        self.ignored_env = ignored_env;
        self
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn registry(&self) -> Option<&ProcessRegistry> {
        self.registry.as_ref()
    }

    pub fn ignored_env(&self) -> &[String] {
        &self.ignored_env
    }

    /// Start the process and record it.
    ///
    /// A spawn failure is returned and nothing is recorded. A registry
    /// failure after a successful spawn is logged and swallowed: the
    /// process is running either way.
    pub fn spawn(&self, mut request: SpawnRequest) -> Result<LaunchedProcess> {
        request.env = env::filter_environment(&request.env, &self.ignored_env);

        let outcome = self.strategy.spawn(&request)?;
        info!(
            app = %request.name,
            pid = outcome.pid,
            strategy = self.strategy.name(),
            "launched process"
        );

        let record_hash = match &self.registry {
            Some(registry) => {
                let record = build_record(&request, &outcome);
                match registry.store(&record) {
                    Ok(hash) => hash,
                    Err(err) => {
                        error!(
                            app = %request.name,
                            pid = outcome.pid,
                            error = %err,
                            "failed to record launched process in registry"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        Ok(LaunchedProcess {
            pid: outcome.pid,
            child: outcome.child,
            start_time: outcome.start_time,
            output: outcome.output,
            record_hash,
            strategy: self.strategy.name(),
        })
    }
}

fn build_record(request: &SpawnRequest, outcome: &SpawnOutcome) -> ProcessRecord {
    let mut record = ProcessRecord::new(&request.name)
        .with_executable(&request.executable)
        .with_args(request.args.clone())
        .with_env(request.env.clone())
        .with_pid(outcome.pid);
    record.cwd = request
        .cwd
        .clone()
        .or_else(|| std::env::current_dir().ok());
    record.start_time = outcome.start_time;
    record.output = outcome.output.clone();
    record
}

/// Create a fresh, persistent output-capture file in `dir`.
///
/// Named `launchkit_<host>_output_<random>.txt`.
pub(crate) fn create_output_file(dir: &Path, host_name: Option<&str>) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir)?;
    let prefix = format!("launchkit_{}_output_", host_name.unwrap_or("app"));
    let (file, path) = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".txt")
        .tempfile_in(dir)?
        .keep()
        .map_err(|err| LaunchError::Io(err.error))?;
    Ok((file, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_file_name_includes_host() {
        let dir = tempfile::tempdir().unwrap();
        let (_file, path) = create_output_file(dir.path(), Some("maya")).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("launchkit_maya_output_"));
        assert!(name.ends_with(".txt"));
        assert!(path.exists());
    }

    #[test]
    fn empty_args_fall_back_to_executable() {
        let request = SpawnRequest::new("app/1", "/usr/bin/true", Vec::new());
        let (program, rest) = request.program_and_args();
        assert_eq!(program, "/usr/bin/true");
        assert!(rest.is_empty());
    }

    #[test]
    fn direct_strategy_is_chosen_when_configured() {
        let section = SpawnSection {
            strategy: SpawnStrategyKind::Direct,
            ..SpawnSection::default()
        };
        let strategy = strategy_for(&section, std::env::temp_dir());
        assert_eq!(strategy.name(), "direct");
    }
}
