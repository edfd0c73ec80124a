//! Step metadata: criticality and lifecycle status

mod transitions;

use serde::{Deserialize, Serialize};
use std::fmt;

use super::outcome::StepOutcome;

/// How a step's failure affects the rest of the run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Criticality {
    /// A failure stops every later step
    FatalOnFailure,
    /// A failure is reported; the run continues
    Recoverable,
    /// Nice to have; failures are reported and ignored
    BestEffort,
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criticality::FatalOnFailure => write!(f, "fatal-on-failure"),
            Criticality::Recoverable => write!(f, "recoverable"),
            Criticality::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// Status of a step in the run lifecycle.
///
/// State machine transitions:
/// - `Pending` -> `Running` (the orchestrator reached the step)
/// - `Running` -> `Succeeded` | `Skipped` | `RolledBack` | `FailedFatal`
/// - every state other than `Pending` and `Running` is terminal
///
/// A step still `Pending` when the run ends was never executed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Skipped,
    RolledBack,
    FailedFatal,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepStatus::Pending | StepStatus::Running)
    }
}

impl From<&StepOutcome> for StepStatus {
    fn from(outcome: &StepOutcome) -> Self {
        match outcome {
            StepOutcome::Succeeded => StepStatus::Succeeded,
            StepOutcome::Skipped(_) => StepStatus::Skipped,
            StepOutcome::RolledBack(_) => StepStatus::RolledBack,
            StepOutcome::FailedFatal(_) => StepStatus::FailedFatal,
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "Pending"),
            StepStatus::Running => write!(f, "Running"),
            StepStatus::Succeeded => write!(f, "Succeeded"),
            StepStatus::Skipped => write!(f, "Skipped"),
            StepStatus::RolledBack => write!(f, "RolledBack"),
            StepStatus::FailedFatal => write!(f, "FailedFatal"),
        }
    }
}
