// src/bin/launchkit-mid.rs

//! Launch intermediary.
//!
//! Usage: `launchkit-mid <handshake.json>`. Starts the process described by
//! the handshake file, writes its PID back and exits without waiting.

use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let _ = launchkit::logging::init_intermediary_logging();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: launchkit-mid <handshake.json>");
        return ExitCode::from(2);
    };

    match launchkit::spawn::run_intermediary(&path) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, handshake = %path.display(), "intermediary failed");
            ExitCode::FAILURE
        }
    }
}
