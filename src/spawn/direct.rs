// src/spawn/direct.rs

use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use super::{SpawnOutcome, SpawnRequest, SpawnStrategy, create_output_file, detach};
use crate::context::OutputTarget;
use crate::errors::{LaunchError, Result};
use crate::liveness::process_start_time;

/// Spawn the target ourselves.
///
/// With capture enabled, stdout and stderr marked [`OutputTarget::Capture`]
/// go to a fresh output file. Without it (the intermediary fallback),
/// captured streams are inherited instead.
#[derive(Debug, Clone)]
pub struct DirectStrategy {
    output_dir: PathBuf,
    capture: bool,
}

impl DirectStrategy {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            capture: true,
        }
    }

    pub fn without_capture(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            capture: false,
        }
    }
}

impl SpawnStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnOutcome> {
        let (program, rest) = request.program_and_args();

        let mut cmd = Command::new(&program);
        cmd.args(rest)
            .env_clear()
            .envs(&request.env)
            .stdin(Stdio::null());
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        detach::configure(&mut cmd, request.detach, request.creation_flags);

        let mut output = None;
        if self.capture && request.captures_output() {
            let (file, path) = create_output_file(&self.output_dir, request.host_name.as_deref())?;
            debug!(path = %path.display(), "capturing output");
            if request.stdout == OutputTarget::Capture {
                cmd.stdout(file.try_clone()?);
            } else {
                cmd.stdout(stdio_for(request.stdout));
            }
            if request.stderr == OutputTarget::Capture {
                cmd.stderr(file);
            } else {
                cmd.stderr(stdio_for(request.stderr));
            }
            output = Some(path);
        } else {
            cmd.stdout(stdio_for(request.stdout));
            cmd.stderr(stdio_for(request.stderr));
        }

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                if let Some(path) = &output {
                    let _ = std::fs::remove_file(path);
                }
                return Err(LaunchError::Spawn { program, source });
            }
        };
        let pid = child.id();

        Ok(SpawnOutcome {
            pid,
            child: Some(child),
            start_time: process_start_time(pid),
            output,
        })
    }
}

fn stdio_for(target: OutputTarget) -> Stdio {
    match target {
        OutputTarget::Null => Stdio::null(),
        OutputTarget::Capture | OutputTarget::Inherit => Stdio::inherit(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::spawn::env::current_environment;

    #[test]
    fn captures_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = DirectStrategy::new(dir.path());
        let mut request = SpawnRequest::new(
            "shell/sh",
            "/bin/sh",
            vec!["/bin/sh".into(), "-c".into(), "echo hello-direct".into()],
        );
        request.env = current_environment();
        request.host_name = Some("shell".into());

        let mut outcome = strategy.spawn(&request).unwrap();
        outcome.child.as_mut().unwrap().wait().unwrap();

        let output = outcome.output.unwrap();
        assert!(std::fs::read_to_string(output).unwrap().contains("hello-direct"));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = DirectStrategy::new(dir.path());
        let request = SpawnRequest::new(
            "ghost/1",
            "/definitely/not/here",
            vec!["/definitely/not/here".into()],
        );
        let err = strategy.spawn(&request).unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
