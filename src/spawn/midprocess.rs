// src/spawn/midprocess.rs

//! Launching through the `launchkit-mid` intermediary.
//!
//! The parent writes a [`Handshake`] to a temporary JSON file, runs the
//! intermediary with the file path as its only argument and waits for it.
//! The intermediary starts the target with the requested output targets,
//! detach mode and creation flags, writes the PID back into the same file
//! and exits, leaving the target orphaned.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{DirectStrategy, SpawnOutcome, SpawnRequest, SpawnStrategy, create_output_file, detach};
use crate::context::OutputTarget;
use crate::errors::{LaunchError, Result};
use crate::liveness::process_start_time;

/// Name of the intermediary binary.
pub const INTERMEDIARY_NAME: &str = "launchkit-mid";

/// Data exchanged with the intermediary through the handshake file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handshake {
    pub name: String,
    pub cwd: PathBuf,
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Output-capture file; absent when neither stream is captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub stdout: OutputTarget,
    #[serde(default)]
    pub stderr: OutputTarget,
    #[serde(default = "detach_by_default")]
    pub detach: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_flags: Option<u32>,
    /// Written back by the intermediary once the target is running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Written back by the intermediary when the target failed to start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn detach_by_default() -> bool {
    true
}

impl Handshake {
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

/// Spawn through the intermediary, or directly when it cannot be found.
#[derive(Debug, Clone)]
pub struct MidprocessStrategy {
    output_dir: PathBuf,
    intermediary: Option<PathBuf>,
    fallback: DirectStrategy,
}

impl MidprocessStrategy {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            fallback: DirectStrategy::without_capture(output_dir.clone()),
            output_dir,
            intermediary: None,
        }
    }

    /// Explicit intermediary path; `None` searches next to the current
    /// executable.
    pub fn with_intermediary(mut self, intermediary: Option<PathBuf>) -> Self {
        self.intermediary = intermediary;
        self
    }

    /// Resolve the intermediary binary, if it is available.
    pub fn locate_intermediary(&self) -> Option<PathBuf> {
        if let Some(path) = &self.intermediary {
            return path.is_file().then(|| path.clone());
        }
        let exe = std::env::current_exe().ok()?;
        let sibling = exe
            .parent()?
            .join(format!("{INTERMEDIARY_NAME}{}", std::env::consts::EXE_SUFFIX));
        sibling.is_file().then_some(sibling)
    }
}

impl SpawnStrategy for MidprocessStrategy {
    fn name(&self) -> &'static str {
        "midprocess"
    }

    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnOutcome> {
        let Some(intermediary) = self.locate_intermediary() else {
            warn!("launch intermediary not found; spawning directly without output capture");
            return self.fallback.spawn(request);
        };

        let output = if request.captures_output() {
            Some(create_output_file(&self.output_dir, request.host_name.as_deref())?.1)
        } else {
            None
        };
        let cwd = match &request.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir()?,
        };
        let handshake = Handshake {
            name: request.name.clone(),
            cwd,
            args: request.args.clone(),
            env: request.env.clone(),
            output: output.clone(),
            stdout: request.stdout,
            stderr: request.stderr,
            detach: request.detach,
            creation_flags: request.creation_flags,
            pid: None,
            error: None,
        };

        let (_, handshake_path) = tempfile::Builder::new()
            .prefix("launchkit_args")
            .suffix(".json")
            .tempfile()?
            .keep()
            .map_err(|err| LaunchError::Io(err.error))?;
        handshake.write(&handshake_path)?;

        debug!(
            intermediary = %intermediary.display(),
            handshake = %handshake_path.display(),
            "running launch intermediary"
        );
        // Inherited target streams pass through the intermediary's own.
        let inherits = request.stdout == OutputTarget::Inherit
            || request.stderr == OutputTarget::Inherit;
        let status = Command::new(&intermediary)
            .arg(&handshake_path)
            .env_clear()
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(if inherits { Stdio::inherit() } else { Stdio::null() })
            .status();

        let reply = Handshake::read(&handshake_path);
        if let Err(err) = fs::remove_file(&handshake_path) {
            warn!(path = %handshake_path.display(), error = %err, "failed to remove handshake file");
        }

        let status = status.map_err(|source| LaunchError::Spawn {
            program: intermediary.to_string_lossy().into_owned(),
            source,
        })?;
        let reply = reply?;

        if let Some(error) = reply.error {
            discard_output(output.as_deref());
            return Err(LaunchError::Handshake(error));
        }
        let Some(pid) = reply.pid else {
            discard_output(output.as_deref());
            return Err(LaunchError::Handshake(format!(
                "intermediary exited with {status} without reporting a pid"
            )));
        };

        Ok(SpawnOutcome {
            pid,
            child: None,
            start_time: process_start_time(pid),
            output,
        })
    }
}

fn discard_output(output: Option<&Path>) {
    if let Some(path) = output {
        let _ = fs::remove_file(path);
    }
}

/// Intermediary side of the handshake.
///
/// Reads the handshake at `path`, starts the target with captured streams
/// appended to the output file, then writes the target PID (or
/// the spawn error) back to `path`. Never waits for the target.
pub fn run_intermediary(path: &Path) -> Result<u32> {
    let mut handshake = Handshake::read(path)?;

    match spawn_target(&handshake) {
        Ok(pid) => {
            handshake.pid = Some(pid);
            handshake.write(path)?;
            info!(app = %handshake.name, pid, "intermediary started target");
            Ok(pid)
        }
        Err(err) => {
            handshake.error = Some(err.to_string());
            handshake.write(path)?;
            Err(err)
        }
    }
}

fn spawn_target(handshake: &Handshake) -> Result<u32> {
    let Some((program, rest)) = handshake.args.split_first() else {
        return Err(LaunchError::LaunchFailed(
            "handshake carries no arguments to launch".to_string(),
        ));
    };

    let capture = match &handshake.output {
        Some(path) => Some(File::options().create(true).append(true).open(path)?),
        None => None,
    };

    let mut cmd = Command::new(program);
    cmd.args(rest)
        .env_clear()
        .envs(&handshake.env)
        .current_dir(&handshake.cwd)
        .stdin(Stdio::null())
        .stdout(target_stdio(handshake.stdout, capture.as_ref())?)
        .stderr(target_stdio(handshake.stderr, capture.as_ref())?);
    detach::configure(&mut cmd, handshake.detach, handshake.creation_flags);

    let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        program: program.clone(),
        source,
    })?;
    Ok(child.id())
}

fn target_stdio(target: OutputTarget, capture: Option<&File>) -> io::Result<Stdio> {
    Ok(match (target, capture) {
        (OutputTarget::Capture, Some(file)) => file.try_clone()?.into(),
        (OutputTarget::Inherit, _) => Stdio::inherit(),
        _ => Stdio::null(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake(dir: &Path, args: Vec<String>) -> Handshake {
        Handshake {
            name: "shell/sh".into(),
            cwd: dir.to_path_buf(),
            args,
            env: crate::spawn::env::current_environment(),
            output: Some(dir.join("out.txt")),
            stdout: OutputTarget::Capture,
            stderr: OutputTarget::Capture,
            detach: true,
            creation_flags: None,
            pid: None,
            error: None,
        }
    }

    #[test]
    fn missing_explicit_intermediary_is_not_located() {
        let strategy = MidprocessStrategy::new(std::env::temp_dir())
            .with_intermediary(Some(PathBuf::from("/no/such/launchkit-mid")));
        assert!(strategy.locate_intermediary().is_none());
    }

    #[test]
    fn intermediary_reports_spawn_errors_in_handshake() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handshake.json");
        handshake(dir.path(), vec!["/definitely/not/here".into()])
            .write(&path)
            .unwrap();

        assert!(run_intermediary(&path).is_err());
        let reply = Handshake::read(&path).unwrap();
        assert!(reply.pid.is_none());
        assert!(reply.error.unwrap().contains("/definitely/not/here"));
    }

    #[cfg(unix)]
    #[test]
    fn intermediary_writes_pid_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handshake.json");
        handshake(
            dir.path(),
            vec!["/bin/sh".into(), "-c".into(), "echo from-mid".into()],
        )
        .write(&path)
        .unwrap();

        let pid = run_intermediary(&path).unwrap();
        let reply = Handshake::read(&path).unwrap();
        assert_eq!(reply.pid, Some(pid));
        assert!(reply.error.is_none());
    }

    #[test]
    fn handshake_without_stream_fields_uses_defaults() {
        let reply: Handshake = serde_json::from_str(
            r#"{"name": "shell/sh", "cwd": "/tmp", "args": ["/bin/true"]}"#,
        )
        .unwrap();
        assert!(reply.output.is_none());
        assert_eq!(reply.stdout, OutputTarget::Capture);
        assert_eq!(reply.stderr, OutputTarget::Capture);
        assert!(reply.detach);
        assert!(reply.creation_flags.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn intermediary_honours_output_targets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handshake.json");
        let mut request = handshake(
            dir.path(),
            vec!["/bin/sh".into(), "-c".into(), "echo to-stdout; echo to-stderr >&2".into()],
        );
        request.stdout = OutputTarget::Null;
        request.write(&path).unwrap();

        run_intermediary(&path).unwrap();

        let out = dir.path().join("out.txt");
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !fs::read_to_string(&out).unwrap_or_default().contains("to-stderr") {
            assert!(std::time::Instant::now() < deadline, "target never wrote stderr");
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(!fs::read_to_string(&out).unwrap().contains("to-stdout"));
    }
}
