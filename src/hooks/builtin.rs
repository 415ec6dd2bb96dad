// src/hooks/builtin.rs

use tracing::debug;

use super::discovery::HookProvider;
use super::filters::HookFilters;
use super::hook::{HookDescriptor, HookKind, LaunchHook};
use crate::context::{LaunchContext, OutputTarget};
use crate::spawn::detach::new_console_flags;
use crate::spawn::env::expand_placeholders;

/// Order of the application environment hook; runs before studio hooks.
pub const APPLICATION_ENVIRONMENT_ORDER: i32 = -100;

/// Order of the terminal console hook; runs after everything else.
pub const TERMINAL_CONSOLE_ORDER: i32 = 1000;

/// Merges the application's static environment into the launch
/// environment, expanding `{NAME}` placeholders against it.
#[derive(Debug, Default)]
pub struct ApplicationEnvironmentHook;

impl LaunchHook for ApplicationEnvironmentHook {
    fn validate(&self, ctx: &LaunchContext) -> bool {
        !ctx.application().environment.is_empty()
    }

    fn execute(&mut self, ctx: &mut LaunchContext) -> anyhow::Result<()> {
        let overlay = ctx.application().environment.clone();
        for (key, value) in overlay {
            let expanded = expand_placeholders(&value, &ctx.options.env);
            debug!(key = %key, "applying application environment");
            ctx.options.env.insert(key, expanded);
        }
        Ok(())
    }
}

/// Gives terminal applications on Windows their own console.
///
/// Without it a detached terminal starts with no window at all.
#[derive(Debug, Default)]
pub struct TerminalNewConsoleHook;

impl LaunchHook for TerminalNewConsoleHook {
    fn execute(&mut self, ctx: &mut LaunchContext) -> anyhow::Result<()> {
        ctx.options.creation_flags = Some(new_console_flags());
        ctx.options.stdout = OutputTarget::Inherit;
        ctx.options.stderr = OutputTarget::Inherit;
        Ok(())
    }
}

/// Hooks shipped with launchkit.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinHooks;

impl HookProvider for BuiltinHooks {
    fn name(&self) -> &str {
        "builtin"
    }

    fn descriptors(&self) -> anyhow::Result<Vec<HookDescriptor>> {
        Ok(vec![
            HookDescriptor::new("application-environment", HookKind::Pre, |_| {
                Ok(ApplicationEnvironmentHook)
            })
            .with_order(APPLICATION_ENVIRONMENT_ORDER),
            HookDescriptor::new("terminal-new-console", HookKind::Pre, |_| {
                Ok(TerminalNewConsoleHook)
            })
            .with_order(TERMINAL_CONSOLE_ORDER)
            .with_filters(
                HookFilters::any()
                    .app_groups(["terminal"])
                    .platforms(["windows"]),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::app::Application;
    use crate::hooks::HookCatalog;

    #[test]
    fn terminal_hook_only_applies_on_windows() {
        let catalog = HookCatalog::new().with_provider(BuiltinHooks);
        let app = Application::new("terminal", "default");

        let linux = LaunchContext::builder(app.clone()).platform("linux").build();
        assert!(catalog.discover(&linux).pre.is_empty());

        let windows = LaunchContext::builder(app).platform("windows").build();
        let pre = catalog.discover(&windows).pre;
        assert_eq!(pre.len(), 1);
        assert_eq!(pre[0].name(), "terminal-new-console");
    }

    #[test]
    fn application_environment_is_merged() {
        let app = Application::new("maya", "2025").with_environment(BTreeMap::from([(
            "MAYA_MODULE_PATH".to_string(),
            "/studio/modules:{MAYA_MODULE_PATH}".to_string(),
        )]));
        let mut ctx = LaunchContext::builder(app)
            .env(BTreeMap::from([(
                "MAYA_MODULE_PATH".to_string(),
                "/opt/modules".to_string(),
            )]))
            .build();

        ApplicationEnvironmentHook.execute(&mut ctx).unwrap();
        assert_eq!(
            ctx.options.env["MAYA_MODULE_PATH"],
            "/studio/modules:/opt/modules"
        );
    }
}
