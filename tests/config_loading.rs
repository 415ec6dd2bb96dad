// tests/config_loading.rs

mod common;

use std::fs;
use std::sync::Arc;

use launchkit::app::{LaunchRequest, Launcher};
use launchkit::config::{SpawnStrategyKind, load_and_validate, load_or_default};
use launchkit::errors::LaunchError;
use launchkit::fs::mock::MockFileSystem;
use launchkit::hooks::HookKind;

use common::init_tracing;

const CONFIG: &str = r#"
[registry]
path = "registry.db"

[spawn]
strategy = "direct"
ignored_env = ["QT_API", "PYTHONHOME"]

[hooks]
dirs = ["/studio/hooks"]

[app.maya.2025]
label = "Maya 2025"
host = "maya"
executables = ["/opt/maya2025/bin/maya", "/usr/autodesk/maya2025/bin/maya"]
arguments = ["-hideConsole"]

[app.maya.2025.environment]
MAYA_DISABLE_CIP = "1"

[app.maya.2019]
host = "maya"
enabled = false
executables = ["/opt/maya2019/bin/maya"]
"#;

#[test]
fn loads_a_full_config_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Launchkit.toml");
    fs::write(&path, CONFIG).unwrap();

    let config = load_and_validate(&path).unwrap();
    assert_eq!(config.spawn.strategy, SpawnStrategyKind::Direct);
    assert_eq!(config.spawn.ignored_env, vec!["QT_API", "PYTHONHOME"]);
    assert_eq!(config.app["maya"].len(), 2);
    assert!(!config.app["maya"]["2019"].enabled);
    assert_eq!(config.app["maya"]["2025"].environment["MAYA_DISABLE_CIP"], "1");

    let explicit = load_or_default(Some(&path)).unwrap();
    assert_eq!(explicit.app.len(), 1);
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_or_default(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, LaunchError::Io(_)));
}

#[test]
fn unknown_strategy_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Launchkit.toml");
    fs::write(&path, "[spawn]\nstrategy = \"teleport\"\n").unwrap();

    assert!(matches!(load_and_validate(&path), Err(LaunchError::Toml(_))));
}

#[test]
fn application_names_cannot_contain_slashes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Launchkit.toml");
    fs::write(&path, "[app.\"maya/x\".2025]\nexecutables = []\n").unwrap();

    let err = load_and_validate(&path).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn launcher_reads_manifests_through_the_filesystem_seam() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Launchkit.toml");
    fs::write(&path, CONFIG).unwrap();
    let config = load_and_validate(&path).unwrap();

    let fs = MockFileSystem::new();
    fs.add_dir("/studio/hooks");
    fs.add_file(
        "/studio/hooks/maya-scripts.toml",
        "[hook]\nkind = \"pre\"\nhosts = [\"maya\"]\nprepend_args = [\"-noAutoloadPlugins\"]\n",
    );
    fs.add_file(
        "/studio/hooks/nuke-scripts.toml",
        "[hook]\nkind = \"pre\"\nhosts = [\"nuke\"]\nargs = [\"--safe\"]\n",
    );
    fs.add_file("/studio/hooks/README.md", "not a manifest");
    fs.add_file("/studio/hooks/broken.toml", "[hook\n");

    let launcher = Launcher::from_config_with_fs(&config, Arc::new(fs)).unwrap();
    assert_eq!(launcher.applications().count(), 2);

    let err = launcher
        .create_launch_context("maya/2019", LaunchRequest::new())
        .unwrap_err();
    assert!(matches!(err, LaunchError::ApplicationNotFound(_)));

    let mut ctx = launcher
        .create_launch_context("maya/2025", LaunchRequest::new())
        .unwrap();
    ctx.discover_hooks(false);
    assert_eq!(
        ctx.hook_names(HookKind::Pre),
        vec!["application-environment", "maya-scripts"]
    );
    assert_eq!(ctx.executable(), None);
}
