// src/registry/record.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::liveness::ProcessIdentity;

/// Everything the registry remembers about one launched process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Application full name (`group/variant`).
    pub name: String,
    /// Resolved executable path; doubles as the identity checked by the
    /// liveness verifier.
    pub executable: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub pid: Option<u32>,
    /// Seconds since the Unix epoch.
    pub start_time: Option<f64>,
    /// Output-capture file, if output was redirected.
    pub output: Option<PathBuf>,
    pub created_at: Option<DateTime<Utc>>,
    /// Computed by the liveness verifier on read; never stored.
    #[serde(default)]
    pub active: bool,
}

impl ProcessRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable: None,
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            pid: None,
            start_time: None,
            output: None,
            created_at: None,
            active: false,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Content hash identifying this record.
    ///
    /// Derived from name, PID, executable and start time, so the same
    /// process stored twice maps to the same key while a recycled PID
    /// (different start time) gets a new one. Environment, arguments and the
    /// output path do not take part.
    pub fn hash(&self) -> String {
        let pid = self.pid.map(|p| p.to_string()).unwrap_or_default();
        let executable = self
            .executable
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let start = self.start_time.map(|s| s.to_string()).unwrap_or_default();

        let mut hasher = blake3::Hasher::new();
        for (i, part) in [self.name.as_str(), &pid, &executable, &start]
            .into_iter()
            .enumerate()
        {
            if i > 0 {
                hasher.update(b"\0");
            }
            hasher.update(part.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Identity handed to the liveness verifier, if the record has a PID.
    pub fn identity(&self) -> Option<ProcessIdentity> {
        let pid = self.pid?;
        Some(ProcessIdentity {
            pid,
            executable: self
                .executable
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            start_time: self.start_time,
        })
    }
}

/// Timestamp format stored in `created_at`; sorts lexicographically.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored `created_at`, accepting SQLite's `CURRENT_TIMESTAMP`
/// format used by older registries.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ProcessRecord {
        ProcessRecord::new("maya/2025")
            .with_executable("/usr/bin/maya")
            .with_pid(4242)
            .with_start_time(1_700_000_000.0)
    }

    #[test]
    fn hash_ignores_env_args_and_output() {
        let base = record();
        let other = record()
            .with_args(vec!["-x".into()])
            .with_output("/tmp/out.txt")
            .with_env(BTreeMap::from([("A".into(), "1".into())]));
        assert_eq!(base.hash(), other.hash());
    }

    #[test]
    fn hash_changes_with_start_time() {
        let reused = record().with_start_time(1_700_000_500.0);
        assert_ne!(record().hash(), reused.hash());
    }

    #[test]
    fn parses_both_timestamp_formats() {
        let now = Utc::now();
        let parsed = parse_timestamp(&format_timestamp(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
        assert!(parse_timestamp("2024-05-01 10:11:12").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
