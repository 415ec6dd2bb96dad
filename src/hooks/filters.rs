// src/hooks/filters.rs

use std::collections::BTreeSet;

use crate::context::LaunchContext;
use crate::types::LaunchType;

/// Declarative constraints a hook can place on the contexts it runs in.
///
/// Every dimension is a set; an empty set means "no constraint". A context
/// matches when it satisfies every non-empty dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookFilters {
    /// `windows`, `linux`, `darwin`; compared case-insensitively.
    pub platforms: BTreeSet<String>,
    pub hosts: BTreeSet<String>,
    pub app_groups: BTreeSet<String>,
    /// Application full names (`group/variant`).
    pub app_names: BTreeSet<String>,
    pub launch_types: BTreeSet<LaunchType>,
}

fn to_set<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl HookFilters {
    /// No constraints at all.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn platforms<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms = values
            .into_iter()
            .map(|p| p.into().to_lowercase())
            .collect();
        self
    }

    pub fn hosts<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = to_set(values);
        self
    }

    pub fn app_groups<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.app_groups = to_set(values);
        self
    }

    pub fn app_names<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.app_names = to_set(values);
        self
    }

    pub fn launch_types<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = LaunchType>,
    {
        self.launch_types = values.into_iter().collect();
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        self.platforms.is_empty()
            && self.hosts.is_empty()
            && self.app_groups.is_empty()
            && self.app_names.is_empty()
            && self.launch_types.is_empty()
    }

    /// Whether a hook with these filters applies to `ctx`.
    ///
    /// A context without a host name never satisfies a host constraint.
    pub fn matches(&self, ctx: &LaunchContext) -> bool {
        if !self.platforms.is_empty() && !self.platforms.contains(&ctx.platform().to_lowercase()) {
            return false;
        }

        if !self.hosts.is_empty() {
            match ctx.host_name() {
                Some(host) if self.hosts.contains(host) => {}
                _ => return false,
            }
        }

        if !self.app_groups.is_empty() && !self.app_groups.contains(ctx.application().group.as_str()) {
            return false;
        }

        if !self.app_names.is_empty() && !self.app_names.contains(&ctx.application().full_name()) {
            return false;
        }

        if !self.launch_types.is_empty() && !self.launch_types.contains(ctx.launch_type()) {
            return false;
        }

        true
    }
}
