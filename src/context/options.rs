// src/context/options.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a launched process's stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputTarget {
    /// Redirect into the per-process output-capture file.
    #[default]
    Capture,
    /// Share the parent's stream (e.g. a terminal that opens its own console).
    Inherit,
    /// Discard.
    Null,
}

/// Options handed to the spawner: environment, working directory,
/// OS-specific flags and output redirection.
///
/// Hooks mutate these in place; replacing `env` wholesale would discard what
/// earlier hooks contributed.
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    /// Windows process creation flags. `None` means "detached" defaults.
    pub creation_flags: Option<u32>,
    pub stdout: OutputTarget,
    pub stderr: OutputTarget,
    /// Run the child in its own session/process group so it outlives us.
    pub detach: bool,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            env: BTreeMap::new(),
            cwd: None,
            creation_flags: None,
            stdout: OutputTarget::Capture,
            stderr: OutputTarget::Capture,
            detach: true,
        }
    }
}

impl SpawnOptions {
    pub fn captures_output(&self) -> bool {
        self.stdout == OutputTarget::Capture || self.stderr == OutputTarget::Capture
    }
}
