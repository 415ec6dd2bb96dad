// src/hooks/manifest.rs

//! Hooks declared in TOML manifests.
//!
//! A manifest directory is scanned for files whose name matches one of the
//! configured globs. Each file declares one hook:
//!
//! ```toml
//! [hook]
//! name = "studio-scripts"     # defaults to the file stem
//! kind = "pre"                # "pre" or "post"
//! order = 10                  # optional; unordered hooks run last
//! hosts = ["maya"]
//! app_groups = []
//! app_names = ["maya/2025"]
//! platforms = ["linux", "darwin"]
//! launch_types = ["local"]    # default
//! require_env = ["STUDIO_ROOT"]
//! args = [["-command", "source studio"]]
//! prepend_args = ["-hideConsole"]
//! cwd = "/studio/work"
//! command = ["/studio/bin/sync-prefs", "--quiet"]
//!
//! [hook.env]
//! MAYA_SCRIPT_PATH = "/studio/scripts:{MAYA_SCRIPT_PATH}"
//! ```
//!
//! Each top-level `args` entry is one atomic segment. A manifest that
//! declares no action at all is abstract and never runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{Context, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::discovery::HookProvider;
use super::filters::HookFilters;
use super::hook::{HookDescriptor, HookKind, LaunchHook};
use crate::context::{ArgSegment, LaunchContext};
use crate::fs::FileSystem;
use crate::spawn::env::expand_placeholders;
use crate::types::LaunchType;

#[derive(Debug, Clone, Deserialize)]
struct ManifestFile {
    hook: HookManifest,
}

/// One declarative hook.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookManifest {
    #[serde(default)]
    pub name: Option<String>,
    pub kind: HookKind,
    #[serde(default)]
    pub order: Option<i32>,

    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub app_groups: Vec<String>,
    #[serde(default)]
    pub app_names: Vec<String>,
    #[serde(default = "default_launch_types")]
    pub launch_types: Vec<LaunchType>,
    /// Environment keys that must be present for the hook to be valid.
    #[serde(default)]
    pub require_env: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub args: Vec<toml::Value>,
    #[serde(default)]
    pub prepend_args: Vec<toml::Value>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub command: Vec<String>,
}

fn default_launch_types() -> Vec<LaunchType> {
    vec![LaunchType::Local]
}

impl HookManifest {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let file: ManifestFile = toml::from_str(text)?;
        Ok(file.hook)
    }

    fn has_actions(&self) -> bool {
        !self.env.is_empty()
            || !self.args.is_empty()
            || !self.prepend_args.is_empty()
            || self.cwd.is_some()
            || !self.command.is_empty()
    }

    fn filters(&self) -> HookFilters {
        HookFilters::any()
            .platforms(self.platforms.iter().cloned())
            .hosts(self.hosts.iter().cloned())
            .app_groups(self.app_groups.iter().cloned())
            .app_names(self.app_names.iter().cloned())
            .launch_types(self.launch_types.iter().cloned())
    }

    /// Convert into a descriptor named `fallback_name` unless the manifest
    /// names itself.
    pub fn into_descriptor(self, fallback_name: &str) -> anyhow::Result<HookDescriptor> {
        let name = self.name.clone().unwrap_or_else(|| fallback_name.to_string());
        let filters = self.filters();
        let order = self.order;

        let mut descriptor = if self.has_actions() {
            let args = to_segments(&self.args).context("invalid `args`")?;
            let prepend_args = to_segments(&self.prepend_args).context("invalid `prepend_args`")?;
            let runner = Arc::new(ManifestRunner {
                name: name.clone(),
                require_env: self.require_env,
                env: self.env,
                args,
                prepend_args,
                cwd: self.cwd,
                command: self.command,
            });
            HookDescriptor::new(&name, self.kind, move |_| Ok(ManifestHook(Arc::clone(&runner))))
        } else {
            HookDescriptor::abstract_hook(&name, self.kind)
        };

        descriptor = descriptor.with_filters(filters);
        if let Some(order) = order {
            descriptor = descriptor.with_order(order);
        }
        Ok(descriptor)
    }
}

fn to_segments(values: &[toml::Value]) -> anyhow::Result<Vec<ArgSegment>> {
    values
        .iter()
        .map(|value| {
            let json = serde_json::to_value(value)?;
            Ok(ArgSegment::from_nested(&json)?)
        })
        .collect()
}

#[derive(Debug)]
struct ManifestRunner {
    name: String,
    require_env: Vec<String>,
    env: BTreeMap<String, String>,
    args: Vec<ArgSegment>,
    prepend_args: Vec<ArgSegment>,
    cwd: Option<PathBuf>,
    command: Vec<String>,
}

struct ManifestHook(Arc<ManifestRunner>);

impl LaunchHook for ManifestHook {
    fn validate(&self, ctx: &LaunchContext) -> bool {
        self.0
            .require_env
            .iter()
            .all(|key| ctx.options.env.contains_key(key))
    }

    fn execute(&mut self, ctx: &mut LaunchContext) -> anyhow::Result<()> {
        let runner = &self.0;

        for (key, value) in &runner.env {
            let expanded = expand_placeholders(value, &ctx.options.env);
            ctx.options.env.insert(key.clone(), expanded);
        }
        // Reverse so the manifest's own order survives repeated inserts.
        for segment in runner.prepend_args.iter().rev() {
            ctx.args.insert_after_executable(segment.clone());
        }
        for segment in &runner.args {
            ctx.args.push_segment(segment.clone());
        }
        if let Some(cwd) = &runner.cwd {
            ctx.options.cwd = Some(cwd.clone());
        }
        if !runner.command.is_empty() {
            run_command(&runner.name, &runner.command, ctx)?;
        }
        Ok(())
    }
}

fn run_command(hook: &str, command: &[String], ctx: &LaunchContext) -> anyhow::Result<()> {
    let Some((program, rest)) = command.split_first() else {
        return Ok(());
    };
    debug!(hook, program = %program, "running hook command");

    let mut cmd = Command::new(program);
    cmd.args(rest)
        .env_clear()
        .envs(&ctx.options.env)
        .stdin(Stdio::null());
    if let Some(cwd) = &ctx.options.cwd {
        cmd.current_dir(cwd);
    }
    let status = cmd
        .status()
        .with_context(|| format!("hook '{hook}' failed to run '{program}'"))?;
    if !status.success() {
        bail!("hook '{hook}' command '{program}' exited with {status}");
    }
    Ok(())
}

/// Provider scanning directories for hook manifests.
#[derive(Debug, Clone)]
pub struct ManifestHookProvider {
    dirs: Vec<PathBuf>,
    patterns: GlobSet,
    fs: Arc<dyn FileSystem>,
}

impl ManifestHookProvider {
    pub fn new(dirs: Vec<PathBuf>, patterns: &[String], fs: Arc<dyn FileSystem>) -> anyhow::Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern).with_context(|| format!("invalid hook pattern '{pattern}'"))?);
        }
        Ok(Self {
            dirs,
            patterns: builder.build()?,
            fs,
        })
    }

    fn manifest_paths(&self, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        Ok(self
            .fs
            .read_dir(dir)?
            .into_iter()
            .filter(|path| self.fs.is_file(path))
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| self.patterns.is_match(Path::new(name)))
            })
            .collect())
    }

    fn load(&self, path: &Path) -> anyhow::Result<HookDescriptor> {
        let text = self.fs.read_to_string(path)?;
        let manifest = HookManifest::parse(&text)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        manifest.into_descriptor(&stem)
    }
}

impl HookProvider for ManifestHookProvider {
    fn name(&self) -> &str {
        "manifests"
    }

    fn descriptors(&self) -> anyhow::Result<Vec<HookDescriptor>> {
        let mut descriptors = Vec::new();
        for dir in &self.dirs {
            if !self.fs.is_dir(dir) {
                info!(dir = %dir.display(), "hook directory does not exist; skipping");
                continue;
            }
            let paths = match self.manifest_paths(dir) {
                Ok(paths) => paths,
                Err(err) => {
                    warn!(dir = %dir.display(), error = ?err, "failed to list hook directory");
                    continue;
                }
            };
            for path in paths {
                match self.load(&path) {
                    Ok(descriptor) => {
                        debug!(hook = descriptor.name(), path = %path.display(), "loaded hook manifest");
                        descriptors.push(descriptor);
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = ?err, "failed to load hook manifest");
                    }
                }
            }
        }
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Application;
    use crate::fs::mock::MockFileSystem;

    fn provider(fs: &MockFileSystem) -> ManifestHookProvider {
        ManifestHookProvider::new(
            vec![PathBuf::from("/hooks")],
            &["*.toml".to_string()],
            Arc::new(fs.clone()),
        )
        .unwrap()
    }

    #[test]
    fn loads_valid_manifests_and_skips_broken_ones() {
        let fs = MockFileSystem::new();
        fs.add_file("/hooks/a_env.toml", "[hook]\nkind = \"pre\"\norder = 5\n[hook.env]\nA = \"1\"\n");
        fs.add_file("/hooks/b_broken.toml", "[hook\nkind = ");
        fs.add_file("/hooks/c_post.toml", "[hook]\nname = \"notify\"\nkind = \"post\"\ncommand = [\"true\"]\n");
        fs.add_file("/hooks/readme.md", "not a hook");

        let descriptors = provider(&fs).descriptors().unwrap();
        let names: Vec<_> = descriptors.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["a_env", "notify"]);
        assert_eq!(descriptors[0].order(), Some(5));
        assert_eq!(descriptors[1].kind(), HookKind::Post);
    }

    #[test]
    fn manifest_without_actions_is_abstract() {
        let manifest = HookManifest::parse("[hook]\nkind = \"pre\"\nhosts = [\"maya\"]\n").unwrap();
        assert!(manifest.into_descriptor("base").unwrap().is_abstract());
    }

    #[test]
    fn manifests_default_to_local_launches() {
        let manifest = HookManifest::parse("[hook]\nkind = \"pre\"\ncwd = \"/tmp\"\n").unwrap();
        let descriptor = manifest.into_descriptor("x").unwrap();
        assert_eq!(
            descriptor.filters().launch_types.iter().collect::<Vec<_>>(),
            vec![&LaunchType::Local]
        );
    }

    #[test]
    fn missing_directory_yields_no_hooks() {
        let fs = MockFileSystem::new();
        assert!(provider(&fs).descriptors().unwrap().is_empty());
    }

    #[test]
    fn manifest_actions_mutate_context() {
        let manifest = HookManifest::parse(
            r#"
            [hook]
            kind = "pre"
            args = [["-command", "source studio"]]
            prepend_args = ["-hideConsole", "-batch"]
            cwd = "/studio"

            [hook.env]
            PATH = "/studio/bin:{PATH}"
            "#,
        )
        .unwrap();
        let descriptor = manifest.into_descriptor("studio").unwrap();

        let app = Application::new("maya", "2025").with_executable("/usr/bin/maya");
        let mut ctx = LaunchContext::builder(app)
            .executable(Some(PathBuf::from("/usr/bin/maya")))
            .env(BTreeMap::from([("PATH".to_string(), "/usr/bin".to_string())]))
            .build();

        let factory = descriptor.factory().unwrap();
        let mut hook = factory(&ctx).unwrap();
        hook.execute(&mut ctx).unwrap();

        assert_eq!(ctx.options.env["PATH"], "/studio/bin:/usr/bin");
        assert_eq!(ctx.options.cwd, Some(PathBuf::from("/studio")));
        assert_eq!(
            ctx.args.flatten(),
            vec!["/usr/bin/maya", "-hideConsole", "-batch", "-command", "source studio"]
        );
    }

    #[test]
    fn unmet_env_requirement_invalidates_hook() {
        let manifest = HookManifest::parse(
            "[hook]\nkind = \"pre\"\nrequire_env = [\"STUDIO_ROOT\"]\ncwd = \"/x\"\n",
        )
        .unwrap();
        let descriptor = manifest.into_descriptor("needs-root").unwrap();
        let ctx = LaunchContext::builder(Application::new("maya", "2025"))
            .env(BTreeMap::new())
            .build();
        let hook = descriptor.factory().unwrap()(&ctx).unwrap();
        assert!(!hook.validate(&ctx));
    }
}
