// src/errors.rs

//! Crate-wide error type and helpers.
//!
//! The variants follow the launch error taxonomy:
//! - configuration problems (`Config`, `ApplicationNotFound`,
//!   `ExecutableNotFound`) fail fast, before any hook runs;
//! - pre-launch hook failures (`Hook`, `LaunchFailed`) abort the launch and
//!   keep the original cause;
//! - spawn failures (`Spawn`, `Handshake`) abort the launch and no process
//!   record is written;
//! - everything else (`Registry`, `Io`, ...) is plumbing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Application \"{0}\" was not found.")]
    ApplicationNotFound(String),

    #[error("{message}")]
    ExecutableNotFound { app: String, message: String },

    /// Known launch failure; the message is meant to be shown as-is.
    #[error("{0}")]
    LaunchFailed(String),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("midprocess handshake failed: {0}")]
    Handshake(String),

    #[error("process registry error: {0}")]
    Registry(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error raised by a pre-launch hook, propagated unmodified.
    #[error(transparent)]
    Hook(anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LaunchError {
    /// Build an `ExecutableNotFound` error for an application.
    ///
    /// `candidates` are the executable paths defined for it; an empty list
    /// means none were configured at all.
    pub fn executable_not_found(app: &str, label: &str, candidates: &[String]) -> Self {
        let message = if candidates.is_empty() {
            format!("Executable paths for application \"{label}\"({app}) are not set.")
        } else {
            let mut msg = format!(
                "Defined executable paths for application \"{label}\"({app}) \
                 are not available on this machine.\n\nDefined paths:"
            );
            for candidate in candidates {
                msg.push_str("\n- ");
                msg.push_str(candidate);
            }
            msg
        };
        LaunchError::ExecutableNotFound {
            app: app.to_string(),
            message,
        }
    }

    /// True for errors caused by configuration rather than by the launch
    /// itself. These are detected before any hook runs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LaunchError::Config(_)
                | LaunchError::ApplicationNotFound(_)
                | LaunchError::ExecutableNotFound { .. }
        )
    }

    /// True for errors that block the user's workflow and should be shown to
    /// them, as opposed to observational failures that only belong in logs.
    pub fn is_user_facing(&self) -> bool {
        self.is_configuration()
            || matches!(
                self,
                LaunchError::LaunchFailed(_)
                    | LaunchError::Hook(_)
                    | LaunchError::Spawn { .. }
                    | LaunchError::Handshake(_)
            )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, LaunchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executable_not_found_lists_candidates() {
        let err = LaunchError::executable_not_found(
            "maya/2025",
            "Maya 2025",
            &["/opt/maya/bin/maya".to_string()],
        );
        let msg = err.to_string();
        assert!(msg.contains("not available on this machine"));
        assert!(msg.contains("- /opt/maya/bin/maya"));
        assert!(err.is_configuration());
    }

    #[test]
    fn executable_not_found_without_candidates() {
        let err = LaunchError::executable_not_found("nuke/15", "Nuke 15", &[]);
        assert!(err.to_string().contains("are not set"));
    }

    #[test]
    fn hook_errors_keep_original_message() {
        let err = LaunchError::Hook(anyhow::anyhow!("rez resolve failed"));
        assert_eq!(err.to_string(), "rez resolve failed");
        assert!(err.is_user_facing());
        assert!(!err.is_configuration());
    }
}
