// src/registry/store.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info, warn};

use super::record::{ProcessRecord, format_timestamp, parse_timestamp};
use crate::errors::Result;
use crate::liveness::LivenessVerifier;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Columns added after the first schema version; created on open when
/// missing so older registry files keep working.
const ADDITIVE_COLUMNS: &[(&str, &str)] = &[
    ("output_file", "TEXT"),
    ("start_time", "REAL"),
    ("created_at", "TEXT"),
];

const SELECT_COLUMNS: &str =
    "hash, name, executable, args, env, cwd, pid, output_file, start_time, created_at";

/// Persistent, content-addressed store of launched processes.
///
/// Every operation opens its own short-lived connection, so independent
/// launcher processes can share one registry file. Cloning is cheap and
/// clones share the verifier and schema state.
#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    path: PathBuf,
    verifier: Arc<LivenessVerifier>,
    schema_ready: Arc<AtomicBool>,
}

impl ProcessRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_verifier(path, LivenessVerifier::new())
    }

    pub fn with_verifier(path: impl Into<PathBuf>, verifier: LivenessVerifier) -> Self {
        Self {
            path: path.into(),
            verifier: Arc::new(verifier),
            schema_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn verifier(&self) -> &LivenessVerifier {
        &self.verifier
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // A registry file removed behind our back needs its schema again.
        let missing = !self.path.is_file();
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        if missing || !self.schema_ready.load(Ordering::Acquire) {
            init_schema(&conn)?;
            self.schema_ready.store(true, Ordering::Release);
        }
        Ok(conn)
    }

    /// Insert or update a record keyed by its content hash.
    ///
    /// Records without a PID are skipped with a warning. On conflict every
    /// field except `created_at` is overwritten. Returns the hash of the
    /// stored row.
    pub fn store(&self, record: &ProcessRecord) -> Result<Option<String>> {
        let Some(pid) = record.pid else {
            warn!(name = %record.name, "process record has no pid; not storing it");
            return Ok(None);
        };

        let hash = record.hash();
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO process_info
                (hash, name, executable, args, env, cwd, pid, output_file, start_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(hash) DO UPDATE SET
                name = excluded.name,
                executable = excluded.executable,
                args = excluded.args,
                env = excluded.env,
                cwd = excluded.cwd,
                pid = excluded.pid,
                output_file = excluded.output_file,
                start_time = excluded.start_time",
            params![
                hash,
                record.name,
                path_text(record.executable.as_deref()),
                serde_json::to_string(&record.args)?,
                serde_json::to_string(&record.env)?,
                path_text(record.cwd.as_deref()),
                pid,
                path_text(record.output.as_deref()),
                record.start_time,
                format_timestamp(&record.created_at.unwrap_or_else(Utc::now)),
            ],
        )?;

        debug!(hash = %hash, name = %record.name, pid, "stored process record");
        Ok(Some(hash))
    }

    /// Record by hash, with `active` freshly verified.
    pub fn get(&self, hash: &str) -> Result<Option<ProcessRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM process_info WHERE hash = ?1"),
                params![hash],
                record_from_row,
            )
            .optional()?;
        Ok(record.map(|(_, record)| self.with_liveness(record)))
    }

    /// Most recently created record for an application name.
    pub fn get_by_name(&self, name: &str) -> Result<Option<ProcessRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM process_info WHERE name = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![name],
                record_from_row,
            )
            .optional()?;
        Ok(record.map(|(_, record)| self.with_liveness(record)))
    }

    /// All records, newest first, verified in one batch.
    pub fn list_all(&self) -> Result<Vec<ProcessRecord>> {
        Ok(self
            .list_with_hashes()?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// Like [`list_all`](Self::list_all) but also returns the stored key of
    /// each row.
    pub fn list_with_hashes(&self) -> Result<Vec<(String, ProcessRecord)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM process_info ORDER BY created_at DESC, rowid DESC"
        ))?;
        let mut rows = stmt
            .query_map([], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        self.apply_liveness(rows.iter_mut().map(|(_, record)| record));
        Ok(rows)
    }

    /// Delete one record and its output file. Returns whether a row existed.
    pub fn delete(&self, hash: &str) -> Result<bool> {
        let conn = self.connect()?;
        let output: Option<Option<String>> = conn
            .query_row(
                "SELECT output_file FROM process_info WHERE hash = ?1",
                params![hash],
                |row| row.get(0),
            )
            .optional()?;
        let Some(output) = output else {
            return Ok(false);
        };

        conn.execute("DELETE FROM process_info WHERE hash = ?1", params![hash])?;
        if let Some(output) = output {
            remove_output_file(Path::new(&output));
        }
        info!(hash, "deleted process record");
        Ok(true)
    }

    /// Remove every record whose process is no longer alive, together with
    /// its output file. Returns the number of records removed.
    pub fn delete_inactive(&self) -> Result<usize> {
        let inactive: Vec<(String, ProcessRecord)> = self
            .list_with_hashes()?
            .into_iter()
            .filter(|(_, record)| !record.active)
            .collect();
        if inactive.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; inactive.len()].join(", ");
        let conn = self.connect()?;
        let deleted = conn.execute(
            &format!("DELETE FROM process_info WHERE hash IN ({placeholders})"),
            params_from_iter(inactive.iter().map(|(hash, _)| hash.as_str())),
        )?;

        for (_, record) in &inactive {
            if let Some(output) = &record.output {
                remove_output_file(output);
            }
        }

        info!(deleted, "removed inactive process records");
        Ok(deleted)
    }

    fn with_liveness(&self, mut record: ProcessRecord) -> ProcessRecord {
        self.apply_liveness(std::iter::once(&mut record));
        record
    }

    fn apply_liveness<'a>(&self, records: impl Iterator<Item = &'a mut ProcessRecord>) {
        let mut records: Vec<&mut ProcessRecord> = records.collect();
        let mut batch = Vec::with_capacity(records.len());
        let mut indices = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if let Some(identity) = record.identity() {
                batch.push(identity);
                indices.push(i);
            }
        }

        for record in records.iter_mut() {
            record.active = false;
        }
        let results = self.verifier.verify(&batch);
        for (i, alive) in indices.into_iter().zip(results) {
            records[i].active = alive;
        }
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    // journal_mode returns the resulting mode as a row.
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    debug!(mode = %mode, "registry journal mode");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS process_info (
            hash TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            executable TEXT,
            args TEXT,
            env TEXT,
            cwd TEXT,
            pid INTEGER,
            output_file TEXT,
            start_time REAL,
            created_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_process_info_name ON process_info(name);",
    )?;

    let existing: Vec<String> = {
        let mut stmt = conn.prepare("PRAGMA table_info('process_info')")?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        columns
    };
    for (column, decl) in ADDITIVE_COLUMNS {
        if !existing.iter().any(|c| c == column) {
            info!(column, "adding missing registry column");
            conn.execute_batch(&format!(
                "ALTER TABLE process_info ADD COLUMN {column} {decl}"
            ))?;
        }
    }
    Ok(())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(String, ProcessRecord)> {
    let hash: String = row.get(0)?;
    let args: Option<String> = row.get(3)?;
    let env: Option<String> = row.get(4)?;
    let created_at: Option<String> = row.get(9)?;

    let args: Vec<String> = match args {
        Some(text) => serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        None => Vec::new(),
    };
    let env: BTreeMap<String, String> = match env {
        Some(text) => serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        None => BTreeMap::new(),
    };

    let record = ProcessRecord {
        name: row.get(1)?,
        executable: row.get::<_, Option<String>>(2)?.map(PathBuf::from),
        args,
        env,
        cwd: row.get::<_, Option<String>>(5)?.map(PathBuf::from),
        pid: row.get(6)?,
        output: row.get::<_, Option<String>>(7)?.map(PathBuf::from),
        start_time: row.get(8)?,
        created_at: created_at.as_deref().and_then(parse_timestamp),
        active: false,
    };
    Ok((hash, record))
}

fn path_text(path: Option<&Path>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
}

fn remove_output_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed output file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove output file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::{LivenessProbe, ProbeUnavailable, ProcessIdentity};

    /// Alive iff the PID is odd.
    #[derive(Debug)]
    struct OddPidsAlive;

    impl LivenessProbe for OddPidsAlive {
        fn name(&self) -> &'static str {
            "odd"
        }

        fn check(&self, batch: &[ProcessIdentity]) -> std::result::Result<Vec<bool>, ProbeUnavailable> {
            Ok(batch.iter().map(|i| i.pid % 2 == 1).collect())
        }
    }

    fn registry(dir: &tempfile::TempDir) -> ProcessRegistry {
        ProcessRegistry::with_verifier(
            dir.path().join("nested").join("registry.db"),
            LivenessVerifier::with_probes(vec![Box::new(OddPidsAlive)]),
        )
    }

    fn record(name: &str, pid: u32) -> ProcessRecord {
        ProcessRecord::new(name)
            .with_executable("/usr/bin/app")
            .with_pid(pid)
            .with_start_time(1_700_000_000.0)
    }

    #[test]
    fn store_and_get_by_hash() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        let rec = record("maya/2025", 11).with_args(vec!["maya".into(), "-x".into()]);

        let hash = registry.store(&rec).unwrap().unwrap();
        let loaded = registry.get(&hash).unwrap().unwrap();

        assert_eq!(loaded.args, rec.args);
        assert_eq!(loaded.pid, Some(11));
        assert!(loaded.active);
        assert!(loaded.created_at.is_some());
    }

    #[test]
    fn records_without_pid_are_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        let stored = registry.store(&ProcessRecord::new("nuke/15")).unwrap();
        assert!(stored.is_none());
        assert!(registry.list_all().unwrap().is_empty());
    }

    #[test]
    fn upsert_keeps_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        let rec = record("maya/2025", 11);
        let hash = registry.store(&rec).unwrap().unwrap();
        let first = registry.get(&hash).unwrap().unwrap().created_at;

        let updated = rec.clone().with_output("/tmp/other.txt");
        registry.store(&updated).unwrap();
        let loaded = registry.get(&hash).unwrap().unwrap();

        assert_eq!(loaded.created_at, first);
        assert_eq!(loaded.output, Some(PathBuf::from("/tmp/other.txt")));
        assert_eq!(registry.list_all().unwrap().len(), 1);
    }

    #[test]
    fn delete_inactive_removes_rows_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        let out = dir.path().join("out.txt");
        fs::write(&out, "log").unwrap();

        registry.store(&record("alive", 11)).unwrap();
        registry.store(&record("dead", 12).with_output(&out)).unwrap();

        assert_eq!(registry.delete_inactive().unwrap(), 1);
        assert!(!out.exists());
        let names: Vec<_> = registry.list_all().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alive"]);
    }

    #[test]
    fn delete_reports_missing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        let hash = registry.store(&record("maya/2025", 11)).unwrap().unwrap();
        assert!(registry.delete(&hash).unwrap());
        assert!(!registry.delete(&hash).unwrap());
    }

    #[test]
    fn old_schema_gains_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE process_info (
                    hash TEXT PRIMARY KEY, name TEXT NOT NULL, executable TEXT,
                    args TEXT, env TEXT, cwd TEXT, pid INTEGER
                 );
                 INSERT INTO process_info (hash, name, pid) VALUES ('abc', 'legacy', 13);",
            )
            .unwrap();
        }

        let registry = ProcessRegistry::with_verifier(
            &path,
            LivenessVerifier::with_probes(vec![Box::new(OddPidsAlive)]),
        );
        let legacy = registry.get("abc").unwrap().unwrap();
        assert_eq!(legacy.name, "legacy");
        assert!(legacy.args.is_empty());
        assert!(legacy.created_at.is_none());
        registry.store(&record("fresh", 15)).unwrap();
        assert_eq!(registry.list_all().unwrap().len(), 2);
    }

    #[test]
    fn deleted_registry_file_is_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        registry.store(&record("maya/2025", 11)).unwrap().unwrap();

        for suffix in ["", "-wal", "-shm"] {
            let mut path = registry.path().as_os_str().to_owned();
            path.push(suffix);
            let _ = fs::remove_file(path);
        }

        let hash = registry.store(&record("nuke/15", 13)).unwrap().unwrap();
        let all = registry.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "nuke/15");
        assert!(registry.get(&hash).unwrap().is_some());
    }
}

