// src/liveness/sysinfo_probe.rs

use std::time::{SystemTime, UNIX_EPOCH};

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};

use super::{
    LivenessProbe, ProbeUnavailable, ProcessIdentity, START_TIME_TOLERANCE_SECS,
    executable_matches, path_to_candidate,
};

/// Tier 1: inspect the process table through `sysinfo`.
///
/// A process is alive when its PID exists, it is not a zombie, its start
/// time is within tolerance of the recorded one and one of its executable
/// path, process name or first command-line token matches the recorded
/// executable.
#[derive(Debug, Clone)]
pub struct SysinfoProbe {
    pub tolerance_secs: f64,
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self {
            tolerance_secs: START_TIME_TOLERANCE_SECS,
        }
    }
}

impl LivenessProbe for SysinfoProbe {
    fn name(&self) -> &'static str {
        "sysinfo"
    }

    fn check(&self, batch: &[ProcessIdentity]) -> Result<Vec<bool>, ProbeUnavailable> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ProbeUnavailable(
                "sysinfo does not support this platform".into(),
            ));
        }

        let pids: Vec<Pid> = batch
            .iter()
            .filter(|identity| identity.pid != 0)
            .map(|identity| Pid::from_u32(identity.pid))
            .collect();

        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&pids),
            true,
            ProcessRefreshKind::new()
                .with_exe(UpdateKind::OnlyIfNotSet)
                .with_cmd(UpdateKind::OnlyIfNotSet),
        );

        Ok(batch
            .iter()
            .map(|identity| self.matches(&system, identity))
            .collect())
    }
}

impl SysinfoProbe {
    fn matches(&self, system: &System, identity: &ProcessIdentity) -> bool {
        if identity.pid == 0 {
            return false;
        }
        let Some(process) = system.process(Pid::from_u32(identity.pid)) else {
            return false;
        };
        if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
            return false;
        }

        if let Some(expected) = identity.start_time {
            let observed = process.start_time() as f64;
            if (observed - expected).abs() > self.tolerance_secs {
                return false;
            }
        }

        let Some(expected) = identity.executable.as_deref() else {
            return true;
        };

        let mut candidates = Vec::with_capacity(3);
        if let Some(exe) = process.exe() {
            candidates.push(path_to_candidate(exe));
        }
        candidates.push(process.name().to_string_lossy().into_owned());
        if let Some(first) = process.cmd().first() {
            candidates.push(first.to_string_lossy().into_owned());
        }
        executable_matches(expected, &candidates)
    }
}

/// Start time of a running process, in seconds since the Unix epoch.
///
/// Used right after a spawn to capture the identity of the new process.
pub fn process_start_time(pid: u32) -> Option<f64> {
    if !sysinfo::IS_SUPPORTED_SYSTEM || pid == 0 {
        return None;
    }
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::new(),
    );
    system
        .process(pid)
        .map(|process| process.start_time() as f64)
}

/// Current time in seconds since the Unix epoch.
pub(crate) fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
