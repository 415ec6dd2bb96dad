// src/context/launch_context.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::args::{ArgSegment, LaunchArgs};
use super::options::SpawnOptions;
use crate::app::Application;
use crate::errors::{LaunchError, Result};
use crate::hooks::{HookCatalog, HookKind, LoadedHook};
use crate::spawn::env::current_environment;
use crate::spawn::{LaunchedProcess, ProcessSpawner, SpawnRequest};
use crate::types::{DEFAULT_ENV_GROUP, LaunchType, current_platform_name};

/// `data` key holding extra arguments appended after the application's own.
pub const DATA_APP_ARGS: &str = "app_args";

/// `data` key holding the source environment (a string map).
pub const DATA_ENV: &str = "env";

/// Where a launch context is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Created,
    PreHooksRun,
    Spawned,
    PostHooksRun,
    /// A pre-launch hook or the spawn failed; the context cannot launch.
    Failed,
}

/// Mutable state of one launch attempt.
///
/// Hooks receive `&mut LaunchContext` and edit `args`, `options` and
/// `data` directly.
pub struct LaunchContext {
    application: Application,
    executable: Option<PathBuf>,
    launch_type: LaunchType,
    env_group: String,
    platform: String,

    pub args: LaunchArgs,
    pub options: SpawnOptions,
    /// Free-form data shared between hooks.
    pub data: BTreeMap<String, Value>,

    catalog: HookCatalog,
    spawner: Option<ProcessSpawner>,
    pre_hooks: Option<Vec<LoadedHook>>,
    post_hooks: Option<Vec<LoadedHook>>,
    prelaunch_done: bool,
    state: LaunchState,
    process: Option<LaunchedProcess>,
}

impl std::fmt::Debug for LaunchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchContext")
            .field("application", &self.application.full_name())
            .field("executable", &self.executable)
            .field("launch_type", &self.launch_type)
            .field("state", &self.state)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl LaunchContext {
    pub fn builder(application: Application) -> LaunchContextBuilder {
        LaunchContextBuilder::new(application)
    }

    pub fn application(&self) -> &Application {
        &self.application
    }

    /// Application full name (`group/variant`).
    pub fn app_name(&self) -> String {
        self.application.full_name()
    }

    pub fn host_name(&self) -> Option<&str> {
        self.application.host_name.as_deref()
    }

    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    /// Swap the executable, keeping the first launch argument in sync.
    pub fn set_executable(&mut self, executable: impl Into<PathBuf>) {
        let executable = executable.into();
        self.args
            .replace_first_token(executable.to_string_lossy().into_owned());
        self.executable = Some(executable);
    }

    pub fn launch_type(&self) -> &LaunchType {
        &self.launch_type
    }

    pub fn env_group(&self) -> &str {
        &self.env_group
    }

    /// Platform name hooks are filtered against.
    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    pub fn process(&self) -> Option<&LaunchedProcess> {
        self.process.as_ref()
    }

    pub fn process_mut(&mut self) -> Option<&mut LaunchedProcess> {
        self.process.as_mut()
    }

    pub fn take_process(&mut self) -> Option<LaunchedProcess> {
        self.process.take()
    }

    /// Names of the discovered hooks of one kind, in execution order.
    pub fn hook_names(&self, kind: HookKind) -> Vec<String> {
        let hooks = match kind {
            HookKind::Pre => &self.pre_hooks,
            HookKind::Post => &self.post_hooks,
        };
        hooks
            .iter()
            .flatten()
            .map(|hook| hook.name().to_string())
            .collect()
    }

    /// Discover hooks for this context.
    ///
    /// The result is cached: repeated calls are no-ops unless `force` is
    /// set, in which case hooks are rediscovered and re-instantiated.
    pub fn discover_hooks(&mut self, force: bool) {
        if self.pre_hooks.is_some() && !force {
            debug!("launch hooks already discovered");
            return;
        }
        let discovered = self.catalog.discover(self);
        self.pre_hooks = Some(discovered.pre);
        self.post_hooks = Some(discovered.post);
    }

    /// Run every pre-launch hook, once.
    ///
    /// The first hook error aborts and is returned unchanged; the context
    /// then stays [`LaunchState::Failed`].
    pub fn run_prelaunch_hooks(&mut self) -> Result<()> {
        if self.state == LaunchState::Failed {
            return Err(failed_context());
        }
        if self.prelaunch_done {
            warn!("pre-launch hooks were already executed");
            return Ok(());
        }

        self.discover_hooks(false);
        let mut hooks = self.pre_hooks.take().unwrap_or_default();
        let mut outcome = Ok(());
        for hook in hooks.iter_mut() {
            debug!(hook = hook.name(), "executing pre-launch hook");
            if let Err(err) = hook.execute(self) {
                error!(hook = hook.name(), error = ?err, "pre-launch hook failed");
                outcome = Err(err);
                break;
            }
        }
        self.pre_hooks = Some(hooks);

        match outcome {
            Ok(()) => {
                self.prelaunch_done = true;
                self.state = LaunchState::PreHooksRun;
                Ok(())
            }
            Err(err) => {
                self.state = LaunchState::Failed;
                Err(LaunchError::Hook(err))
            }
        }
    }

    /// Launch the application.
    ///
    /// Runs pre-launch hooks if they have not run yet, flattens the
    /// arguments, spawns the process and then runs post-launch hooks, whose
    /// failures are only logged. A second call logs a warning and returns
    /// `Ok(None)` without spawning again.
    pub fn launch(&mut self) -> Result<Option<&mut LaunchedProcess>> {
        match self.state {
            LaunchState::Spawned | LaunchState::PostHooksRun => {
                warn!(app = %self.app_name(), "application was already launched");
                return Ok(None);
            }
            LaunchState::Failed => return Err(failed_context()),
            LaunchState::Created | LaunchState::PreHooksRun => {}
        }

        if self.executable.is_none() {
            return Err(self.missing_executable());
        }
        let Some(spawner) = self.spawner.clone() else {
            return Err(LaunchError::Config(
                "launch context has no process spawner".to_string(),
            ));
        };

        if !self.prelaunch_done {
            self.run_prelaunch_hooks()?;
        }

        // Pre-hooks may swap the program; the record follows what is spawned.
        let args = self.args.flatten();
        let Some(executable) = args
            .first()
            .map(PathBuf::from)
            .or_else(|| self.executable.clone())
        else {
            return Err(self.missing_executable());
        };
        self.executable = Some(executable.clone());
        info!(app = %self.app_name(), args = ?args, "launching application");
        let request = SpawnRequest::from_options(
            self.app_name(),
            self.application.host_name.clone(),
            executable,
            args.clone(),
            &self.options,
        );
        let process = match spawner.spawn(request) {
            Ok(process) => process,
            Err(err) => {
                self.state = LaunchState::Failed;
                return Err(err);
            }
        };
        self.args = LaunchArgs::from_tokens(args);
        self.process = Some(process);
        self.state = LaunchState::Spawned;

        self.run_postlaunch_hooks();
        self.state = LaunchState::PostHooksRun;
        Ok(self.process.as_mut())
    }

    fn missing_executable(&self) -> LaunchError {
        LaunchError::executable_not_found(
            &self.application.full_name(),
            &self.application.full_label(),
            &self.application.executables,
        )
    }

    fn run_postlaunch_hooks(&mut self) {
        let mut hooks = self.post_hooks.take().unwrap_or_default();
        for hook in hooks.iter_mut() {
            debug!(hook = hook.name(), "executing post-launch hook");
            if let Err(err) = hook.execute(self) {
                warn!(hook = hook.name(), error = ?err, "post-launch hook failed");
            }
        }
        self.post_hooks = Some(hooks);
    }
}

fn failed_context() -> LaunchError {
    LaunchError::LaunchFailed("launch context already failed and cannot be launched".to_string())
}

/// Builder for [`LaunchContext`].
///
/// Initial arguments are the executable, then the application's configured
/// arguments, then `data["app_args"]`, which is consumed. The environment comes from
/// `data["env"]` when it is a string map, an explicit [`env`](Self::env),
/// or the current process environment, minus ignored keys.
pub struct LaunchContextBuilder {
    application: Application,
    executable: Option<Option<PathBuf>>,
    launch_type: LaunchType,
    env_group: Option<String>,
    platform: Option<String>,
    env: Option<BTreeMap<String, String>>,
    data: BTreeMap<String, Value>,
    catalog: HookCatalog,
    spawner: Option<ProcessSpawner>,
}

impl LaunchContextBuilder {
    fn new(application: Application) -> Self {
        Self {
            application,
            executable: None,
            launch_type: LaunchType::default(),
            env_group: None,
            platform: None,
            env: None,
            data: BTreeMap::new(),
            catalog: HookCatalog::new(),
            spawner: None,
        }
    }

    /// Explicit executable; when never called the application's first
    /// available executable is used.
    pub fn executable(mut self, executable: Option<PathBuf>) -> Self {
        self.executable = Some(executable);
        self
    }

    pub fn launch_type(mut self, launch_type: LaunchType) -> Self {
        self.launch_type = launch_type;
        self
    }

    pub fn env_group(mut self, env_group: impl Into<String>) -> Self {
        self.env_group = Some(env_group.into());
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Source environment used instead of the current process environment.
    pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn hooks(mut self, catalog: HookCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn spawner(mut self, spawner: ProcessSpawner) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn build(mut self) -> LaunchContext {
        let executable = match self.executable {
            Some(explicit) => explicit,
            None => self.application.find_executable(),
        };

        let mut args = LaunchArgs::new();
        if let Some(executable) = &executable {
            args.push(executable.to_string_lossy().into_owned());
        }
        args.push_segment(ArgSegment::new(self.application.arguments.iter().cloned()));
        if let Some(extra) = self.data.remove(DATA_APP_ARGS) {
            match LaunchArgs::from_nested(&extra) {
                Ok(extra) => {
                    for segment in extra.segments() {
                        args.push_segment(segment.clone());
                    }
                }
                Err(err) => warn!(error = %err, "ignoring invalid app_args"),
            }
        }

        let source_env = match self.data.get(DATA_ENV) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect(),
            Some(_) => {
                warn!("`env` launch data is not a mapping; using the process environment");
                self.env.unwrap_or_else(current_environment)
            }
            None => self.env.unwrap_or_else(current_environment),
        };
        let ignored = self
            .spawner
            .as_ref()
            .map(|s| s.ignored_env().to_vec())
            .unwrap_or_default();

        let options = SpawnOptions {
            env: crate::spawn::env::filter_environment(&source_env, &ignored),
            ..SpawnOptions::default()
        };

        LaunchContext {
            application: self.application,
            executable,
            launch_type: self.launch_type,
            env_group: self
                .env_group
                .unwrap_or_else(|| DEFAULT_ENV_GROUP.to_string()),
            platform: self
                .platform
                .unwrap_or_else(|| current_platform_name().to_string()),
            args,
            options,
            data: self.data,
            catalog: self.catalog,
            spawner: self.spawner,
            pre_hooks: None,
            post_hooks: None,
            prelaunch_done: false,
            state: LaunchState::Created,
            process: None,
        }
    }
}
