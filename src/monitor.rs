// src/monitor.rs

//! Long-running observers used by the CLI: periodic registry polling and
//! live following of a process's output-capture file.

use std::collections::BTreeMap;
use std::fs::File;
use std::future::Future;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{LaunchError, Result};
use crate::registry::{ProcessRecord, ProcessRegistry};

/// Liveness change between two registry snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityChange {
    Started { hash: String, name: String },
    Exited { hash: String, name: String },
    Removed { hash: String, name: String },
}

/// Remembers the last snapshot and reports what changed.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    last: BTreeMap<String, (String, bool)>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, snapshot: &[(String, ProcessRecord)]) -> Vec<ActivityChange> {
        let mut changes = Vec::new();
        let mut next = BTreeMap::new();

        for (hash, record) in snapshot {
            match self.last.get(hash) {
                Some((_, true)) if !record.active => changes.push(ActivityChange::Exited {
                    hash: hash.clone(),
                    name: record.name.clone(),
                }),
                None if record.active => changes.push(ActivityChange::Started {
                    hash: hash.clone(),
                    name: record.name.clone(),
                }),
                _ => {}
            }
            next.insert(hash.clone(), (record.name.clone(), record.active));
        }
        for (hash, (name, _)) in &self.last {
            if !next.contains_key(hash) {
                changes.push(ActivityChange::Removed {
                    hash: hash.clone(),
                    name: name.clone(),
                });
            }
        }

        self.last = next;
        changes
    }
}

/// Poll the registry every `interval` until `shutdown` resolves.
///
/// Each snapshot is read on the blocking pool and handed to `on_snapshot`
/// together with the changes since the previous one.
pub async fn monitor_registry<S, F>(
    registry: ProcessRegistry,
    interval: Duration,
    shutdown: S,
    mut on_snapshot: F,
) -> Result<()>
where
    S: Future<Output = ()>,
    F: FnMut(&[(String, ProcessRecord)], &[ActivityChange]),
{
    let mut ticker = tokio::time::interval(interval);
    let mut tracker = ActivityTracker::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("registry monitor stopped");
                return Ok(());
            }
            _ = ticker.tick() => {
                let registry = registry.clone();
                let snapshot = tokio::task::spawn_blocking(move || registry.list_with_hashes())
                    .await
                    .map_err(|err| LaunchError::Other(err.into()))??;
                let changes = tracker.update(&snapshot);
                for change in &changes {
                    debug!(?change, "process activity changed");
                }
                on_snapshot(&snapshot, &changes);
            }
        }
    }
}

/// Whole output file as text; invalid UTF-8 is replaced.
pub fn read_output(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Copy bytes appended to `path` since `offset` into `out`.
///
/// Returns the new offset. A file that shrank is treated as truncated and
/// read from the start.
pub fn copy_new_output(path: &Path, offset: u64, out: &mut impl Write) -> Result<u64> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = if len < offset { 0 } else { offset };
    if len == start {
        return Ok(start);
    }

    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut buf)?;
    out.write_all(&buf)?;
    out.flush()?;
    Ok(start + buf.len() as u64)
}

/// Stream an output file to `out`: existing content first, then whatever
/// gets appended, until `shutdown` resolves.
///
/// Appends are picked up from filesystem notifications, with a periodic
/// poll as a fallback for filesystems that do not deliver them.
pub async fn follow_output<S, W>(path: PathBuf, mut out: W, shutdown: S) -> Result<()>
where
    S: Future<Output = ()>,
    W: Write,
{
    let mut offset = copy_new_output(&path, 0, &mut out)?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(err) => warn!(error = %err, "output watch error"),
        },
        Config::default(),
    )
    .map_err(|err| LaunchError::Other(err.into()))?;
    let watched = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    watcher
        .watch(watched, RecursiveMode::NonRecursive)
        .map_err(|err| LaunchError::Other(err.into()))?;
    debug!(path = %path.display(), "following output file");

    let mut poll = tokio::time::interval(Duration::from_secs(1));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                if !event.paths.iter().any(|p| p.ends_with(path.file_name().unwrap_or_default())) {
                    continue;
                }
            }
            _ = poll.tick() => {}
        }

        match copy_new_output(&path, offset, &mut out) {
            Ok(next) => offset = next,
            Err(LaunchError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "output file was removed");
                break;
            }
            Err(err) => return Err(err),
        }
    }

    drop(watcher);
    Ok(())
}
