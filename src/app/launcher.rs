// src/app/launcher.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::application::Application;
use crate::config::ConfigFile;
use crate::context::{DATA_APP_ARGS, LaunchContext};
use crate::errors::{LaunchError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::hooks::HookCatalog;
use crate::registry::ProcessRegistry;
use crate::spawn::ProcessSpawner;
use crate::types::LaunchType;

/// Caller-provided inputs for one launch.
#[derive(Debug, Clone, Default)]
pub struct LaunchRequest {
    pub launch_type: LaunchType,
    pub env_group: Option<String>,
    pub data: BTreeMap<String, Value>,
}

impl LaunchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launch_type(mut self, launch_type: LaunchType) -> Self {
        self.launch_type = launch_type;
        self
    }

    pub fn env_group(mut self, env_group: impl Into<String>) -> Self {
        self.env_group = Some(env_group.into());
        self
    }

    /// Extra arguments appended after the application's own.
    pub fn app_args(self, args: Vec<String>) -> Self {
        self.data(DATA_APP_ARGS, Value::from(args))
    }

    pub fn data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// Entry point tying applications, hooks and the spawner together.
#[derive(Debug, Clone)]
pub struct Launcher {
    applications: BTreeMap<String, Application>,
    catalog: HookCatalog,
    spawner: ProcessSpawner,
}

impl Launcher {
    pub fn new(
        applications: impl IntoIterator<Item = Application>,
        catalog: HookCatalog,
        spawner: ProcessSpawner,
    ) -> Self {
        Self {
            applications: applications
                .into_iter()
                .map(|app| (app.full_name(), app))
                .collect(),
            catalog,
            spawner,
        }
    }

    /// Build from a validated config, using the real filesystem and the
    /// configured registry.
    pub fn from_config(config: &ConfigFile) -> Result<Self> {
        Self::from_config_with_fs(config, Arc::new(RealFileSystem))
    }

    pub fn from_config_with_fs(config: &ConfigFile, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let applications: Vec<Application> = config
            .app
            .iter()
            .flat_map(|(group, variants)| {
                variants
                    .iter()
                    .map(move |(variant, app)| Application::from_config(group, variant, app))
            })
            .collect();
        let catalog = HookCatalog::from_config(config, fs)?;
        let registry = ProcessRegistry::new(config.registry_path());
        debug!(registry = %registry.path().display(), "using process registry");
        let spawner = ProcessSpawner::from_config(config, Some(registry));

        info!(applications = applications.len(), "launcher ready");
        Ok(Self::new(applications, catalog, spawner))
    }

    pub fn applications(&self) -> impl Iterator<Item = &Application> {
        self.applications.values()
    }

    /// Enabled application by full name.
    pub fn application(&self, full_name: &str) -> Result<&Application> {
        self.applications
            .get(full_name)
            .filter(|app| app.enabled)
            .ok_or_else(|| LaunchError::ApplicationNotFound(full_name.to_string()))
    }

    pub fn catalog(&self) -> &HookCatalog {
        &self.catalog
    }

    pub fn spawner(&self) -> &ProcessSpawner {
        &self.spawner
    }

    pub fn registry(&self) -> Option<&ProcessRegistry> {
        self.spawner.registry()
    }

    /// Fresh launch context for an application; nothing runs yet.
    pub fn create_launch_context(&self, full_name: &str, request: LaunchRequest) -> Result<LaunchContext> {
        let application = self.application(full_name)?.clone();

        let mut builder = LaunchContext::builder(application)
            .launch_type(request.launch_type)
            .hooks(self.catalog.clone())
            .spawner(self.spawner.clone());
        if let Some(env_group) = request.env_group {
            builder = builder.env_group(env_group);
        }
        for (key, value) in request.data {
            builder = builder.data(key, value);
        }
        Ok(builder.build())
    }

    /// Create a context and launch it. The returned context holds the
    /// launched process.
    pub fn launch(&self, full_name: &str, request: LaunchRequest) -> Result<LaunchContext> {
        let mut ctx = self.create_launch_context(full_name, request)?;
        ctx.launch()?;
        Ok(ctx)
    }
}
