#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use launchkit::app::Application;
use launchkit::context::LaunchContext;
use launchkit::hooks::{HookCatalog, HookDescriptor};
use launchkit::registry::ProcessRegistry;
use launchkit::spawn::{ProcessSpawner, SpawnStrategy};

pub use launchkit_test_utils::builders::minimal_env;
pub use launchkit_test_utils::init_tracing;

/// Registry stored inside `dir`.
pub fn temp_registry(dir: &Path) -> ProcessRegistry {
    ProcessRegistry::new(dir.join("registry.db"))
}

pub fn spawner(strategy: impl SpawnStrategy + 'static, registry: &ProcessRegistry) -> ProcessSpawner {
    ProcessSpawner::new(Arc::new(strategy)).with_registry(registry.clone())
}

/// `shell/sh` running `script` through `/bin/sh -c`.
pub fn shell_app(script: &str) -> Application {
    Application::new("shell", "sh")
        .with_host("shell")
        .with_executable("/bin/sh")
        .with_arguments(vec!["-c".to_string(), script.to_string()])
}

/// Context for `app` with the given hooks and spawner, and a minimal env.
pub fn context(app: Application, hooks: Vec<HookDescriptor>, spawner: ProcessSpawner) -> LaunchContext {
    LaunchContext::builder(app)
        .env(minimal_env())
        .hooks(HookCatalog::new().with_hooks("test", hooks))
        .spawner(spawner)
        .build()
}
