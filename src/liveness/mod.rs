// src/liveness/mod.rs

//! Tiered process liveness verification.
//!
//! A PID alone is not an identity: operating systems recycle PIDs, so a
//! record is only considered alive when the process behind its PID still
//! looks like the one that was launched. Verification goes through a fixed
//! list of probes; the first probe that is *available* on this machine
//! answers for the whole batch.
//!
//! 1. [`SysinfoProbe`]: full process inspection (start time + executable).
//! 2. [`SystemToolProbe`]: `ps` / `tasklist` output (executable only).
//! 3. [`SignalProbe`]: bare existence check, trusted only when the record
//!    carries no identity to compare against.
//!
//! When no probe is available every entry is reported dead.

use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

pub mod signal;
pub mod sysinfo_probe;
pub mod system_tool;

pub use signal::SignalProbe;
pub use sysinfo_probe::{SysinfoProbe, process_start_time};
pub use system_tool::SystemToolProbe;

/// Maximum difference, in seconds, between a recorded and an observed start
/// time for them to be considered the same process.
pub const START_TIME_TOLERANCE_SECS: f64 = 1.0;

/// What we remember about a launched process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessIdentity {
    pub pid: u32,
    /// Executable path (or name) recorded at launch.
    pub executable: Option<String>,
    /// Start time in seconds since the Unix epoch.
    pub start_time: Option<f64>,
}

impl ProcessIdentity {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            executable: None,
            start_time: None,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// True when nothing beyond the PID was recorded.
    pub fn is_bare(&self) -> bool {
        self.executable.is_none() && self.start_time.is_none()
    }
}

/// Returned by a probe that cannot run on this machine.
#[derive(Debug, thiserror::Error)]
#[error("liveness probe unavailable: {0}")]
pub struct ProbeUnavailable(pub String);

/// One verification tier.
pub trait LivenessProbe: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Check a whole batch; the result has one entry per input, in order.
    ///
    /// Per-entry failures must be reported as `false`, not as an error.
    fn check(&self, batch: &[ProcessIdentity]) -> Result<Vec<bool>, ProbeUnavailable>;
}

/// Runs the probes in tier order.
#[derive(Debug)]
pub struct LivenessVerifier {
    probes: Vec<Box<dyn LivenessProbe>>,
}

impl Default for LivenessVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessVerifier {
    /// Verifier with the default tiers.
    pub fn new() -> Self {
        Self::with_probes(vec![
            Box::new(SysinfoProbe::default()),
            Box::new(SystemToolProbe),
            Box::new(SignalProbe),
        ])
    }

    pub fn with_probes(probes: Vec<Box<dyn LivenessProbe>>) -> Self {
        Self { probes }
    }

    pub fn verify(&self, batch: &[ProcessIdentity]) -> Vec<bool> {
        if batch.is_empty() {
            return Vec::new();
        }

        for probe in &self.probes {
            match probe.check(batch) {
                Ok(results) if results.len() == batch.len() => {
                    debug!(probe = probe.name(), count = batch.len(), "verified liveness");
                    return results;
                }
                Ok(results) => {
                    warn!(
                        probe = probe.name(),
                        expected = batch.len(),
                        got = results.len(),
                        "liveness probe returned a mismatched batch; trying next tier"
                    );
                }
                Err(err) => {
                    debug!(probe = probe.name(), error = %err, "skipping liveness tier");
                }
            }
        }

        warn!("no liveness probe is available; reporting all processes as inactive");
        vec![false; batch.len()]
    }

    pub fn is_alive(&self, identity: &ProcessIdentity) -> bool {
        self.verify(std::slice::from_ref(identity))
            .first()
            .copied()
            .unwrap_or(false)
    }
}

/// Whether executable names compare case-insensitively on this platform.
fn case_insensitive_names() -> bool {
    cfg!(any(windows, target_os = "macos"))
}

fn names_equal(a: &str, b: &str) -> bool {
    if case_insensitive_names() {
        a.to_lowercase() == b.to_lowercase()
    } else {
        a == b
    }
}

/// Final path component of an executable, accepting either separator.
pub(crate) fn executable_basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// True if any candidate identifies the expected executable, by full path or
/// by basename.
pub(crate) fn executable_matches<S: AsRef<str>>(expected: &str, candidates: &[S]) -> bool {
    let expected_base = executable_basename(expected);
    candidates.iter().map(AsRef::as_ref).any(|candidate| {
        !candidate.is_empty()
            && (names_equal(candidate, expected)
                || names_equal(executable_basename(candidate), expected_base))
    })
}

pub(crate) fn path_to_candidate(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(&'static str, Option<bool>);

    impl LivenessProbe for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn check(&self, batch: &[ProcessIdentity]) -> Result<Vec<bool>, ProbeUnavailable> {
            match self.1 {
                Some(v) => Ok(vec![v; batch.len()]),
                None => Err(ProbeUnavailable(self.0.to_string())),
            }
        }
    }

    #[test]
    fn first_available_tier_answers() {
        let verifier = LivenessVerifier::with_probes(vec![
            Box::new(Fixed("missing", None)),
            Box::new(Fixed("dead", Some(false))),
            Box::new(Fixed("alive", Some(true))),
        ]);
        let batch = vec![ProcessIdentity::new(1), ProcessIdentity::new(2)];
        assert_eq!(verifier.verify(&batch), vec![false, false]);
    }

    #[test]
    fn no_tiers_means_everything_is_dead() {
        let verifier = LivenessVerifier::with_probes(vec![Box::new(Fixed("missing", None))]);
        assert!(!verifier.is_alive(&ProcessIdentity::new(42)));
    }

    #[test]
    fn empty_batch_short_circuits() {
        let verifier = LivenessVerifier::with_probes(Vec::new());
        assert!(verifier.verify(&[]).is_empty());
    }

    #[test]
    fn executable_matching_by_path_or_basename() {
        assert!(executable_matches("/usr/bin/python3", &["python3"]));
        assert!(executable_matches("/usr/bin/python3", &["/usr/bin/python3"]));
        assert!(executable_matches(r"C:\Apps\maya.exe", &["maya.exe"]));
        assert!(!executable_matches("/usr/bin/python3", &["bash", ""]));
    }
}
