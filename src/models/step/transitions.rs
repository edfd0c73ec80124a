use anyhow::{bail, Result};

use super::StepStatus;

impl StepStatus {
    /// Check if transitioning from the current status to the new status is valid.
    ///
    /// Valid transitions:
    /// - `Pending` -> `Running`
    /// - `Running` -> `Succeeded` | `Skipped` | `RolledBack` | `FailedFatal`
    /// - terminal states accept no transition
    pub fn can_transition_to(&self, new_status: &StepStatus) -> bool {
        match self {
            StepStatus::Pending => matches!(new_status, StepStatus::Running),
            StepStatus::Running => new_status.is_terminal(),
            StepStatus::Succeeded
            | StepStatus::Skipped
            | StepStatus::RolledBack
            | StepStatus::FailedFatal => false,
        }
    }

    /// Attempt to transition to a new status, returning an error if invalid.
    pub fn try_transition(&self, new_status: StepStatus) -> Result<StepStatus> {
        if self.can_transition_to(&new_status) {
            Ok(new_status)
        } else {
            bail!("Invalid step status transition: {self} -> {new_status}")
        }
    }
}
