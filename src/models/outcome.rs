//! Typed result of one hardening step

use serde::Serialize;
use std::fmt;

use crate::error::HardenError;

/// Why a step failed without a clean rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub reason: String,
    /// Restoring a backup failed; the host may be in an inconsistent state
    pub rollback_failed: bool,
}

impl Failure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            rollback_failed: false,
        }
    }
}

/// Outcome returned by every step. There are no other states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "kebab-case")]
pub enum StepOutcome {
    Succeeded,
    Skipped(String),
    /// The step failed and its changes were undone
    RolledBack(String),
    FailedFatal(Failure),
}

impl StepOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped(reason.into())
    }

    pub fn rolled_back(reason: impl Into<String>) -> Self {
        StepOutcome::RolledBack(reason.into())
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        StepOutcome::FailedFatal(Failure::new(reason))
    }

    /// Translate an error raised inside a step.
    ///
    /// `rolled_back` tells whether the step's changes were already undone
    /// when the error surfaced (for example a validator that timed out).
    pub fn from_error(err: &HardenError, rolled_back: bool) -> Self {
        match err {
            HardenError::RollbackFailed { .. } => StepOutcome::FailedFatal(Failure {
                reason: err.to_string(),
                rollback_failed: true,
            }),
            HardenError::ValidationRejected { .. } => StepOutcome::RolledBack(err.to_string()),
            _ if rolled_back => StepOutcome::RolledBack(err.to_string()),
            _ => StepOutcome::failed(err.to_string()),
        }
    }

    pub fn is_failed_fatal(&self) -> bool {
        matches!(self, StepOutcome::FailedFatal(_))
    }

    /// Whether the step did not achieve its goal
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::RolledBack(_) | StepOutcome::FailedFatal(_))
    }

    pub fn rollback_failed(&self) -> bool {
        matches!(self, StepOutcome::FailedFatal(f) if f.rollback_failed)
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            StepOutcome::Succeeded => None,
            StepOutcome::Skipped(reason) | StepOutcome::RolledBack(reason) => Some(reason),
            StepOutcome::FailedFatal(failure) => Some(&failure.reason),
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Succeeded => write!(f, "succeeded"),
            StepOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
            StepOutcome::RolledBack(reason) => write!(f, "rolled back: {reason}"),
            StepOutcome::FailedFatal(failure) => write!(f, "failed: {}", failure.reason),
        }
    }
}
