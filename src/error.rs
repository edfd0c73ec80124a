//! Error taxonomy for hardening operations
//!
//! Transaction and command errors are caught by the step that owns them and
//! turned into a [`StepOutcome`](crate::models::StepOutcome). Only
//! [`HardenError::Privilege`] is surfaced by the orchestrator itself.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for hardening operations
pub type Result<T> = std::result::Result<T, HardenError>;

#[derive(Error, Debug)]
pub enum HardenError {
    /// Not running with the privilege the run requires
    #[error("insufficient privilege: {message}")]
    Privilege { message: String },

    /// File read, write, copy or metadata failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A content transform could not be applied safely
    #[error("cannot rewrite {}: {message}", path.display())]
    Format { path: PathBuf, message: String },

    /// The external validator rejected the written file; the original was restored
    #[error("validator rejected {}: {diagnostics}", path.display())]
    ValidationRejected { path: PathBuf, diagnostics: String },

    /// Restoring the backup failed; the target may be inconsistent
    #[error("ROLLBACK FAILED for {} (backup at {}): {cause}", path.display(), backup.display())]
    RollbackFailed {
        path: PathBuf,
        backup: PathBuf,
        cause: String,
    },

    /// An external command could not be located or launched
    #[error("cannot execute `{command}`: {message}")]
    Execution { command: String, message: String },

    /// A bounded operation exceeded its deadline
    #[error("`{command}` timed out after {}s", after.as_secs())]
    Timeout { command: String, after: Duration },

    /// A transaction was driven out of order
    #[error("transaction on {} is {state}; cannot {operation}", path.display())]
    InvalidState {
        path: PathBuf,
        state: String,
        operation: &'static str,
    },
}

impl HardenError {
    /// Wrap an `std::io::Error` with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HardenError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        HardenError::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True when the failure left the system in a possibly inconsistent state
    pub fn is_rollback_failure(&self) -> bool {
        matches!(self, HardenError::RollbackFailed { .. })
    }
}
