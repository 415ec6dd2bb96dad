// src/context/mod.rs

//! Per-launch state: arguments, spawn options, hook results and the
//! launched process.

pub mod args;
pub mod launch_context;
pub mod options;

pub use args::{ArgSegment, LaunchArgs};
pub use launch_context::{DATA_APP_ARGS, DATA_ENV, LaunchContext, LaunchContextBuilder, LaunchState};
pub use options::{OutputTarget, SpawnOptions};
