// src/app/application.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;

/// A launchable application variant, e.g. `maya/2025`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub group: String,
    pub variant: String,
    pub label: String,
    /// Logical host identifier used by hook filters.
    pub host_name: Option<String>,
    pub enabled: bool,
    /// Candidate executables, in preference order.
    pub executables: Vec<String>,
    pub arguments: Vec<String>,
    pub environment: BTreeMap<String, String>,
}

impl Application {
    pub fn new(group: impl Into<String>, variant: impl Into<String>) -> Self {
        let variant = variant.into();
        Self {
            group: group.into(),
            label: variant.clone(),
            variant,
            host_name: None,
            enabled: true,
            executables: Vec::new(),
            arguments: Vec::new(),
            environment: BTreeMap::new(),
        }
    }

    pub fn from_config(group: &str, variant: &str, config: &AppConfig) -> Self {
        Self {
            group: group.to_string(),
            variant: variant.to_string(),
            label: config.label.clone().unwrap_or_else(|| variant.to_string()),
            host_name: config.host.clone(),
            enabled: config.enabled,
            executables: config.executables.clone(),
            arguments: config.arguments.clone(),
            environment: config.environment.clone(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host_name = Some(host.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executables.push(executable.into());
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.group, self.variant)
    }

    pub fn full_label(&self) -> String {
        format!("{} {}", self.group, self.label)
    }

    /// First configured executable that exists on this machine.
    pub fn find_executable(&self) -> Option<PathBuf> {
        self.executables
            .iter()
            .find_map(|candidate| resolve_executable(candidate))
    }
}

/// Resolve an executable candidate.
///
/// Candidates containing a path separator must exist as files. Bare names
/// are looked up on `PATH` (with `.exe` appended on Windows).
pub fn resolve_executable(candidate: &str) -> Option<PathBuf> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    let path = Path::new(candidate);
    if path.components().count() > 1 || path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search).find_map(|dir| {
        let direct = dir.join(candidate);
        if direct.is_file() {
            return Some(direct);
        }
        if cfg!(windows) && path.extension().is_none() {
            let exe = dir.join(format!("{candidate}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_joins_group_and_variant() {
        let app = Application::new("maya", "2025").with_label("2025 (beta)");
        assert_eq!(app.full_name(), "maya/2025");
        assert_eq!(app.full_label(), "maya 2025 (beta)");
    }

    #[test]
    fn first_existing_executable_wins() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("app");
        std::fs::write(&real, "").unwrap();

        let app = Application::new("x", "1")
            .with_executable(dir.path().join("missing").to_string_lossy())
            .with_executable(real.to_string_lossy());
        assert_eq!(app.find_executable(), Some(real));
    }

    #[cfg(unix)]
    #[test]
    fn bare_names_are_found_on_path() {
        assert!(resolve_executable("sh").is_some());
        assert!(resolve_executable("definitely-not-a-real-binary-name").is_none());
        assert!(resolve_executable("").is_none());
    }
}
