// src/hooks/discovery.rs

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::hook::{HookDescriptor, HookKind, LoadedHook};
use crate::context::LaunchContext;

/// A source of hook descriptors: built-ins, manifest directories, or hooks
/// registered in code.
pub trait HookProvider: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Load every descriptor this provider knows about.
    ///
    /// An error drops the whole provider from discovery; providers reading
    /// several sources should skip broken ones themselves.
    fn descriptors(&self) -> anyhow::Result<Vec<HookDescriptor>>;
}

/// Provider over descriptors that are already loaded.
#[derive(Debug, Clone)]
pub struct StaticHookProvider {
    name: String,
    hooks: Vec<HookDescriptor>,
}

impl StaticHookProvider {
    pub fn new(name: impl Into<String>, hooks: Vec<HookDescriptor>) -> Self {
        Self {
            name: name.into(),
            hooks,
        }
    }
}

impl HookProvider for StaticHookProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptors(&self) -> anyhow::Result<Vec<HookDescriptor>> {
        Ok(self.hooks.clone())
    }
}

/// Instantiated hooks for one context, in execution order.
#[derive(Debug, Default)]
pub struct DiscoveredHooks {
    pub pre: Vec<LoadedHook>,
    pub post: Vec<LoadedHook>,
}

/// Ordered set of hook providers.
#[derive(Debug, Clone, Default)]
pub struct HookCatalog {
    providers: Vec<Arc<dyn HookProvider>>,
}

impl HookCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: impl HookProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Register already-built descriptors under a provider named `name`.
    pub fn with_hooks(self, name: impl Into<String>, hooks: Vec<HookDescriptor>) -> Self {
        self.with_provider(StaticHookProvider::new(name, hooks))
    }

    pub fn providers(&self) -> impl Iterator<Item = &dyn HookProvider> {
        self.providers.iter().map(|p| p.as_ref())
    }

    /// Every descriptor from every provider, in provider order. Providers
    /// that fail to load are logged and skipped.
    pub fn descriptors(&self) -> Vec<HookDescriptor> {
        let mut all = Vec::new();
        for provider in &self.providers {
            match provider.descriptors() {
                Ok(descriptors) => all.extend(descriptors),
                Err(err) => {
                    warn!(provider = provider.name(), error = ?err, "failed to load hooks");
                }
            }
        }
        all
    }

    /// Select, instantiate and order the hooks that apply to `ctx`.
    ///
    /// Abstract descriptors and descriptors whose filters reject the context
    /// are skipped without being instantiated. Instantiation errors are
    /// logged and the hook is dropped. Instances whose own validation fails
    /// are dropped too. Each phase is sorted stably by `order`, with
    /// unordered hooks after all ordered ones in discovery order.
    pub fn discover(&self, ctx: &LaunchContext) -> DiscoveredHooks {
        let mut discovered = DiscoveredHooks::default();

        for descriptor in self.descriptors() {
            let Some(factory) = descriptor.factory() else {
                debug!(hook = descriptor.name(), "skipping abstract hook");
                continue;
            };
            if !descriptor.filters().matches(ctx) {
                debug!(hook = descriptor.name(), "hook filters do not match launch context");
                continue;
            }

            let hook = match factory(ctx) {
                Ok(hook) => hook,
                Err(err) => {
                    warn!(hook = descriptor.name(), error = ?err, "failed to instantiate hook");
                    continue;
                }
            };
            if !hook.validate(ctx) {
                debug!(hook = descriptor.name(), "hook is not valid for launch context");
                continue;
            }

            let loaded = LoadedHook::new(&descriptor, hook);
            match descriptor.kind() {
                HookKind::Pre => discovered.pre.push(loaded),
                HookKind::Post => discovered.post.push(loaded),
            }
        }

        discovered.pre = sort_by_order(discovered.pre);
        discovered.post = sort_by_order(discovered.post);
        debug!(
            pre = discovered.pre.len(),
            post = discovered.post.len(),
            "discovered launch hooks"
        );
        discovered
    }
}

fn sort_by_order(hooks: Vec<LoadedHook>) -> Vec<LoadedHook> {
    let (mut ordered, unordered): (Vec<_>, Vec<_>) =
        hooks.into_iter().partition(|hook| hook.order().is_some());
    ordered.sort_by_key(|hook| hook.order());
    ordered.extend(unordered);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Application;
    use crate::hooks::HookFilters;
    use crate::hooks::hook::LaunchHook;

    fn ctx() -> LaunchContext {
        LaunchContext::builder(Application::new("maya", "2025").with_host("maya")).build()
    }

    fn noop(name: &str, kind: HookKind) -> HookDescriptor {
        HookDescriptor::from_fn(name, kind, |_| Ok(()))
    }

    fn names(hooks: &[LoadedHook]) -> Vec<&str> {
        hooks.iter().map(LoadedHook::name).collect()
    }

    #[test]
    fn ordered_hooks_run_before_unordered_ones() {
        let catalog = HookCatalog::new().with_hooks(
            "test",
            vec![
                noop("unordered-a", HookKind::Pre),
                noop("late", HookKind::Pre).with_order(10),
                noop("unordered-b", HookKind::Pre),
                noop("early", HookKind::Pre).with_order(-5),
                noop("late-too", HookKind::Pre).with_order(10),
                noop("post", HookKind::Post),
            ],
        );

        let discovered = catalog.discover(&ctx());
        assert_eq!(
            names(&discovered.pre),
            vec!["early", "late", "late-too", "unordered-a", "unordered-b"]
        );
        assert_eq!(names(&discovered.post), vec!["post"]);
    }

    #[test]
    fn abstract_and_filtered_hooks_are_skipped() {
        let catalog = HookCatalog::new().with_hooks(
            "test",
            vec![
                HookDescriptor::abstract_hook("base", HookKind::Pre),
                noop("nuke-only", HookKind::Pre).with_filters(HookFilters::any().hosts(["nuke"])),
                noop("kept", HookKind::Pre),
            ],
        );
        assert_eq!(names(&catalog.discover(&ctx()).pre), vec!["kept"]);
    }

    struct Invalid;

    impl LaunchHook for Invalid {
        fn validate(&self, _ctx: &LaunchContext) -> bool {
            false
        }

        fn execute(&mut self, _ctx: &mut LaunchContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failing_factories_and_invalid_hooks_are_dropped() {
        let catalog = HookCatalog::new().with_hooks(
            "test",
            vec![
                HookDescriptor::new("broken", HookKind::Pre, |_| -> anyhow::Result<Invalid> {
                    anyhow::bail!("cannot build")
                }),
                HookDescriptor::new("invalid", HookKind::Pre, |_| Ok(Invalid)),
                noop("fine", HookKind::Pre),
            ],
        );
        assert_eq!(names(&catalog.discover(&ctx()).pre), vec!["fine"]);
    }

    #[derive(Debug)]
    struct Broken;

    impl HookProvider for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn descriptors(&self) -> anyhow::Result<Vec<HookDescriptor>> {
            anyhow::bail!("unreadable hook source")
        }
    }

    #[test]
    fn failing_provider_does_not_stop_discovery() {
        let catalog = HookCatalog::new()
            .with_provider(Broken)
            .with_hooks("test", vec![noop("survivor", HookKind::Post)]);
        assert_eq!(names(&catalog.discover(&ctx()).post), vec!["survivor"]);
    }
}
