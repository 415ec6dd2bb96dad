// src/lib.rs

pub mod app;
pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod fs;
pub mod hooks;
pub mod liveness;
pub mod logging;
pub mod monitor;
pub mod registry;
pub mod spawn;
pub mod types;

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::{LaunchRequest, Launcher};
use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, load_or_default};
use crate::hooks::HookKind;
use crate::monitor::ActivityChange;
use crate::registry::{ProcessRecord, ProcessRegistry};

/// High-level entry point used by `main.rs`.
///
/// Loads the config once, then dispatches the subcommand. Registry and
/// launch work is synchronous and runs on the blocking pool; `monitor` and
/// `output --follow` run until Ctrl-C.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(args.config.as_deref())?;
    debug!(registry = %cfg.registry_path().display(), "configuration loaded");

    match args.command {
        Command::Launch {
            app,
            launch_type,
            env_group,
            dry_run,
            wait,
            args,
        } => {
            let mut request = LaunchRequest::new().launch_type(launch_type).app_args(args);
            if let Some(env_group) = env_group {
                request = request.env_group(env_group);
            }
            blocking(move || launch(&cfg, &app, request, dry_run, wait)).await
        }
        Command::Apps => {
            print_apps(&cfg)?;
            Ok(())
        }
        Command::List { json } => {
            let registry = registry_for(&cfg);
            let rows = blocking(move || Ok(registry.list_with_hashes()?)).await?;
            print_records(&rows, json)
        }
        Command::Show { hash } => {
            let registry = registry_for(&cfg);
            let record = blocking(move || {
                let hash = resolve_hash(&registry, &hash)?;
                let record = registry
                    .get(&hash)?
                    .ok_or_else(|| anyhow!("no process record {hash}"))?;
                Ok((hash, record))
            })
            .await?;
            print_json(&RecordView {
                hash: &record.0,
                record: &record.1,
            })
        }
        Command::Output { hash, follow } => {
            let registry = registry_for(&cfg);
            let output = blocking(move || {
                let hash = resolve_hash(&registry, &hash)?;
                let record = registry
                    .get(&hash)?
                    .ok_or_else(|| anyhow!("no process record {hash}"))?;
                record
                    .output
                    .ok_or_else(|| anyhow!("process {hash} has no captured output"))
            })
            .await?;
            if follow {
                monitor::follow_output(output, std::io::stdout(), ctrl_c()).await?;
            } else {
                print!("{}", monitor::read_output(&output)?);
            }
            Ok(())
        }
        Command::Rm { hash } => {
            let registry = registry_for(&cfg);
            blocking(move || {
                let hash = resolve_hash(&registry, &hash)?;
                if registry.delete(&hash)? {
                    println!("removed {hash}");
                }
                Ok(())
            })
            .await
        }
        Command::Clean => {
            let registry = registry_for(&cfg);
            let removed = blocking(move || Ok(registry.delete_inactive()?)).await?;
            println!("removed {removed} inactive process record(s)");
            Ok(())
        }
        Command::Monitor { interval } => {
            let registry = registry_for(&cfg);
            info!(registry = %registry.path().display(), interval, "monitoring processes");
            monitor::monitor_registry(
                registry,
                Duration::from_secs(interval.max(1)),
                ctrl_c(),
                |_, changes| {
                    for change in changes {
                        match change {
                            ActivityChange::Started { hash, name } => {
                                println!("started  {} {name}", short_hash(hash));
                            }
                            ActivityChange::Exited { hash, name } => {
                                println!("exited   {} {name}", short_hash(hash));
                            }
                            ActivityChange::Removed { hash, name } => {
                                println!("removed  {} {name}", short_hash(hash));
                            }
                        }
                    }
                },
            )
            .await?;
            Ok(())
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("blocking task panicked")?
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

fn registry_for(cfg: &ConfigFile) -> ProcessRegistry {
    ProcessRegistry::new(cfg.registry_path())
}

fn launch(cfg: &ConfigFile, app: &str, request: LaunchRequest, dry_run: bool, wait: bool) -> Result<()> {
    let launcher = Launcher::from_config(cfg)?;

    if dry_run {
        let mut ctx = launcher.create_launch_context(app, request)?;
        ctx.run_prelaunch_hooks()?;
        println!("launchkit dry-run");
        println!("  app: {}", ctx.app_name());
        match ctx.executable() {
            Some(exe) => println!("  executable: {}", exe.display()),
            None => println!("  executable: <not found>"),
        }
        println!("  launch_type: {}", ctx.launch_type());
        println!("  spawn strategy: {}", launcher.spawner().strategy_name());
        println!("  pre-launch hooks: {:?}", ctx.hook_names(HookKind::Pre));
        println!("  post-launch hooks: {:?}", ctx.hook_names(HookKind::Post));
        println!("  args: {:?}", ctx.args.flatten());
        if let Some(cwd) = &ctx.options.cwd {
            println!("  cwd: {}", cwd.display());
        }
        println!("  env:");
        for (key, value) in &ctx.options.env {
            println!("    {key}={value}");
        }
        return Ok(());
    }

    let mut ctx = launcher.launch(app, request)?;
    let Some(process) = ctx.process_mut() else {
        bail!("{app} was not launched");
    };
    println!("launched {app} (pid {})", process.pid());
    if let Some(hash) = process.record_hash() {
        println!("  record: {hash}");
    }
    if let Some(output) = process.output() {
        println!("  output: {}", output.display());
    }

    if wait {
        match process.wait()? {
            Some(status) => println!("{app} exited with {status}"),
            None => println!("{app} was started by the intermediary; not waiting"),
        }
    }
    Ok(())
}

fn print_apps(cfg: &ConfigFile) -> Result<()> {
    let launcher = Launcher::from_config(cfg)?;
    let mut stdout = std::io::stdout().lock();
    for app in launcher.applications() {
        let exe = app
            .find_executable()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<no executable>".to_string());
        let state = if app.enabled { "" } else { " (disabled)" };
        writeln!(stdout, "{:<24} {}{state}", app.full_name(), exe)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct RecordView<'a> {
    hash: &'a str,
    #[serde(flatten)]
    record: &'a ProcessRecord,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_records(rows: &[(String, ProcessRecord)], json: bool) -> Result<()> {
    if json {
        let views: Vec<RecordView<'_>> = rows
            .iter()
            .map(|(hash, record)| RecordView { hash, record })
            .collect();
        return print_json(&views);
    }

    let mut stdout = std::io::stdout().lock();
    for (hash, record) in rows {
        let status = if record.active { "running" } else { "exited" };
        let pid = record.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
        let created = record
            .created_at
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        writeln!(
            stdout,
            "{}  {status:<7}  {pid:>7}  {:<24} {created}",
            short_hash(hash),
            record.name
        )?;
    }
    Ok(())
}

fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}

/// Full hash for an exact hash or a unique prefix of one.
fn resolve_hash(registry: &ProcessRegistry, prefix: &str) -> Result<String> {
    let matches: Vec<String> = registry
        .list_with_hashes()?
        .into_iter()
        .map(|(hash, _)| hash)
        .filter(|hash| hash.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [hash] => Ok(hash.clone()),
        [] => bail!("no process record matches '{prefix}'"),
        _ => bail!("'{prefix}' is ambiguous ({} records match)", matches.len()),
    }
}
