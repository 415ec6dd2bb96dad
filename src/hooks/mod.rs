// src/hooks/mod.rs

//! Launch hooks.
//!
//! Hooks are small units of launch-time behaviour: prepare environment
//! variables, add arguments, open a console window, notify something after
//! the process started. They come from [`HookProvider`]s, are filtered
//! against the [`LaunchContext`](crate::context::LaunchContext), instantiated
//! once per context and run in `order`.

pub mod builtin;
pub mod discovery;
pub mod filters;
pub mod hook;
pub mod manifest;

use std::sync::Arc;

pub use builtin::{ApplicationEnvironmentHook, BuiltinHooks, TerminalNewConsoleHook};
pub use discovery::{DiscoveredHooks, HookCatalog, HookProvider, StaticHookProvider};
pub use filters::HookFilters;
pub use hook::{HookDescriptor, HookFactory, HookKind, LaunchHook, LoadedHook};
pub use manifest::{HookManifest, ManifestHookProvider};

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::fs::FileSystem;

impl HookCatalog {
    /// Catalog for a validated config: built-in hooks (unless disabled)
    /// followed by manifests from the configured directories.
    pub fn from_config(config: &ConfigFile, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let mut catalog = HookCatalog::new();
        if !config.hooks.disable_builtin {
            catalog = catalog.with_provider(BuiltinHooks);
        }
        if !config.hooks.dirs.is_empty() {
            catalog = catalog.with_provider(ManifestHookProvider::new(
                config.hooks.dirs.clone(),
                &config.hooks.patterns,
                fs,
            )?);
        }
        Ok(catalog)
    }
}
