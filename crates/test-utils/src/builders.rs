#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use launchkit::config::{AppConfig, ConfigFile, RawConfigFile, SpawnStrategyKind};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.hooks.disable_builtin = true;
        Self { config }
    }

    /// Keep registry and output files inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new()
            .registry(dir.join("registry.db"))
            .output_dir(dir.join("output"))
    }

    pub fn with_app(mut self, group: &str, variant: &str, app: AppConfig) -> Self {
        self.config
            .app
            .entry(group.to_string())
            .or_default()
            .insert(variant.to_string(), app);
        self
    }

    pub fn registry(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.registry.path = Some(path.into());
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.spawn.output_dir = Some(path.into());
        self
    }

    pub fn strategy(mut self, strategy: SpawnStrategyKind) -> Self {
        self.config.spawn.strategy = strategy;
        self
    }

    pub fn midprocess(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.spawn.midprocess = Some(path.into());
        self
    }

    pub fn hook_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.hooks.dirs.push(dir.into());
        self
    }

    pub fn builtin_hooks(mut self, enabled: bool) -> Self {
        self.config.hooks.disable_builtin = !enabled;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `AppConfig`.
pub struct AppConfigBuilder {
    app: AppConfig,
}

impl AppConfigBuilder {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            app: AppConfig {
                executables: vec![executable.into()],
                ..AppConfig::default()
            },
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.app.host = Some(host.to_string());
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.app.arguments.push(arg.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.app.environment.insert(key.to_string(), value.to_string());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.app.enabled = enabled;
        self
    }

    pub fn build(self) -> AppConfig {
        self.app
    }
}

/// Environment containing only `PATH`, so launched shells still find tools.
pub fn minimal_env() -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    if let Ok(path) = std::env::var("PATH") {
        env.insert("PATH".to_string(), path);
    }
    env
}
