// src/hooks/hook.rs

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use super::filters::HookFilters;
use crate::context::LaunchContext;

/// When a hook runs relative to the spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookKind {
    Pre,
    Post,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookKind::Pre => "pre",
            HookKind::Post => "post",
        })
    }
}

/// Behaviour of an instantiated hook.
pub trait LaunchHook: Send {
    /// Extra validation run after the declarative filters matched. Returning
    /// `false` excludes the hook from this launch.
    fn validate(&self, _ctx: &LaunchContext) -> bool {
        true
    }

    /// Mutate the context. Pre-launch errors abort the launch, post-launch
    /// errors are logged.
    fn execute(&mut self, ctx: &mut LaunchContext) -> anyhow::Result<()>;
}

/// Builds a fresh hook instance for one launch context.
pub type HookFactory =
    Arc<dyn Fn(&LaunchContext) -> anyhow::Result<Box<dyn LaunchHook>> + Send + Sync>;

/// A hook type as produced by a provider, before instantiation.
///
/// A descriptor without a factory is abstract: it may be listed but is never
/// instantiated or run.
#[derive(Clone)]
pub struct HookDescriptor {
    name: String,
    kind: HookKind,
    order: Option<i32>,
    filters: HookFilters,
    factory: Option<HookFactory>,
}

impl fmt::Debug for HookDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("order", &self.order)
            .field("filters", &self.filters)
            .field("abstract", &self.factory.is_none())
            .finish()
    }
}

impl HookDescriptor {
    pub fn new<F, H>(name: impl Into<String>, kind: HookKind, build: F) -> Self
    where
        F: Fn(&LaunchContext) -> anyhow::Result<H> + Send + Sync + 'static,
        H: LaunchHook + 'static,
    {
        let factory: HookFactory = Arc::new(move |ctx: &LaunchContext| {
            build(ctx).map(|hook| Box::new(hook) as Box<dyn LaunchHook>)
        });
        Self {
            name: name.into(),
            kind,
            order: None,
            filters: HookFilters::default(),
            factory: Some(factory),
        }
    }

    /// Hook backed by a plain closure.
    pub fn from_fn<F>(name: impl Into<String>, kind: HookKind, f: F) -> Self
    where
        F: Fn(&mut LaunchContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(name, kind, move |_| Ok(FnHook { f: Arc::clone(&f) }))
    }

    /// Descriptor that is never instantiated.
    pub fn abstract_hook(name: impl Into<String>, kind: HookKind) -> Self {
        Self {
            name: name.into(),
            kind,
            order: None,
            filters: HookFilters::default(),
            factory: None,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_filters(mut self, filters: HookFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> HookKind {
        self.kind
    }

    pub fn order(&self) -> Option<i32> {
        self.order
    }

    pub fn filters(&self) -> &HookFilters {
        &self.filters
    }

    pub fn is_abstract(&self) -> bool {
        self.factory.is_none()
    }

    pub(crate) fn factory(&self) -> Option<&HookFactory> {
        self.factory.as_ref()
    }
}

struct FnHook<F> {
    f: Arc<F>,
}

impl<F> LaunchHook for FnHook<F>
where
    F: Fn(&mut LaunchContext) -> anyhow::Result<()> + Send + Sync,
{
    fn execute(&mut self, ctx: &mut LaunchContext) -> anyhow::Result<()> {
        (self.f)(ctx)
    }
}

/// An instantiated, validated hook bound to one launch context.
pub struct LoadedHook {
    name: String,
    kind: HookKind,
    order: Option<i32>,
    hook: Box<dyn LaunchHook>,
}

impl fmt::Debug for LoadedHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedHook")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl LoadedHook {
    pub(crate) fn new(descriptor: &HookDescriptor, hook: Box<dyn LaunchHook>) -> Self {
        Self {
            name: descriptor.name.clone(),
            kind: descriptor.kind,
            order: descriptor.order,
            hook,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> HookKind {
        self.kind
    }

    pub fn order(&self) -> Option<i32> {
        self.order
    }

    pub(crate) fn execute(&mut self, ctx: &mut LaunchContext) -> anyhow::Result<()> {
        self.hook.execute(ctx)
    }
}
