// src/registry/mod.rs

//! SQLite-backed registry of launched processes.
//!
//! Records are keyed by a content hash of (name, pid, executable, start
//! time). `active` is never stored: it is recomputed by the liveness
//! verifier on every read.

pub mod record;
pub mod store;

pub use record::ProcessRecord;
pub use store::ProcessRegistry;
