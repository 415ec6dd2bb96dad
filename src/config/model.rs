// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Environment variable that overrides the registry location.
pub const REGISTRY_ENV_VAR: &str = "LAUNCHKIT_REGISTRY";

/// File name of the process registry inside the per-user data directory.
pub const REGISTRY_FILE_NAME: &str = "process_handlers.db";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [registry]
/// path = "/custom/process_handlers.db"
///
/// [spawn]
/// strategy = "auto"
/// ignored_env = ["QT_API"]
///
/// [hooks]
/// dirs = ["hooks"]
///
/// [app.maya.2025]
/// host = "maya"
/// executables = ["/usr/autodesk/maya2025/bin/maya"]
/// ```
///
/// All sections are optional and have reasonable defaults.
///
/// This is the *raw* config as parsed from TOML. It may contain invalid
/// names or patterns. Use `ConfigFile::try_from(raw)` to validate.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub spawn: SpawnSection,

    #[serde(default)]
    pub hooks: HooksSection,

    /// Applications keyed by group, then by variant: `[app.<group>.<variant>]`.
    #[serde(default)]
    pub app: BTreeMap<String, BTreeMap<String, AppConfig>>,
}

/// Validated configuration.
///
/// Constructed via `ConfigFile::try_from(RawConfigFile)`, which guarantees
/// that application names are usable as `group/variant` full names and that
/// hook manifest patterns compile.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub registry: RegistrySection,
    pub spawn: SpawnSection,
    pub hooks: HooksSection,
    pub app: BTreeMap<String, BTreeMap<String, AppConfig>>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            registry: raw.registry,
            spawn: raw.spawn,
            hooks: raw.hooks,
            app: raw.app,
        }
    }

    /// Effective registry database path.
    ///
    /// `[registry].path` wins, then `LAUNCHKIT_REGISTRY`, then the per-user
    /// data directory (`<data_local_dir>/launchkit/process_handlers.db`).
    pub fn registry_path(&self) -> PathBuf {
        if let Some(path) = &self.registry.path {
            return path.clone();
        }
        if let Some(path) = std::env::var_os(REGISTRY_ENV_VAR) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("launchkit")
            .join(REGISTRY_FILE_NAME)
    }

    /// Directory output-capture files are created in.
    pub fn output_dir(&self) -> PathBuf {
        self.spawn
            .output_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }
}

/// `[registry]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RegistrySection {
    /// Explicit path to the SQLite registry file.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Which spawn strategy to use.
///
/// - `auto`: midprocess on Linux, direct elsewhere.
/// - `direct`: always spawn directly with output captured to a file.
/// - `midprocess`: always go through the intermediary (falls back to a
///   direct spawn when the intermediary binary is missing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpawnStrategyKind {
    #[default]
    Auto,
    Direct,
    Midprocess,
}

/// `[spawn]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SpawnSection {
    #[serde(default)]
    pub strategy: SpawnStrategyKind,

    /// Path to the `launchkit-mid` intermediary.
    ///
    /// If `None`, a binary named `launchkit-mid` next to the current
    /// executable is used when present.
    #[serde(default)]
    pub midprocess: Option<PathBuf>,

    /// Environment keys never passed down to launched processes.
    #[serde(default = "default_ignored_env")]
    pub ignored_env: Vec<String>,

    /// Where output-capture files go; defaults to the system temp dir.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_ignored_env() -> Vec<String> {
    vec!["QT_API".to_string()]
}

impl Default for SpawnSection {
    fn default() -> Self {
        Self {
            strategy: SpawnStrategyKind::default(),
            midprocess: None,
            ignored_env: default_ignored_env(),
            output_dir: None,
        }
    }
}

/// `[hooks]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct HooksSection {
    /// Directories scanned for hook manifests.
    #[serde(default)]
    pub dirs: Vec<PathBuf>,

    /// File name globs a hook manifest must match.
    #[serde(default = "default_hook_patterns")]
    pub patterns: Vec<String>,

    /// Skip the built-in hooks entirely.
    #[serde(default)]
    pub disable_builtin: bool,
}

fn default_hook_patterns() -> Vec<String> {
    vec!["*.toml".to_string()]
}

impl Default for HooksSection {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            patterns: default_hook_patterns(),
            disable_builtin: false,
        }
    }
}

/// `[app.<group>.<variant>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Human readable variant label; defaults to the variant name.
    #[serde(default)]
    pub label: Option<String>,

    /// Logical host identifier (e.g. `"maya"`), used by hook filters.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Candidate executables; the first one that exists is used.
    #[serde(default)]
    pub executables: Vec<String>,

    /// Arguments always passed after the executable.
    #[serde(default)]
    pub arguments: Vec<String>,

    /// Static environment overlay merged in by the built-in environment hook.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            label: None,
            host: None,
            enabled: default_enabled(),
            executables: Vec::new(),
            arguments: Vec::new(),
            environment: BTreeMap::new(),
        }
    }
}
