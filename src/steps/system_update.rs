use tracing::info;

use super::{HardeningStep, Host};
use crate::models::{Criticality, RunContext, StepOutcome};

/// Refresh package lists and apply pending upgrades.
///
/// Keeps locally modified configuration files when a package ships a new
/// version, so dpkg never stops to ask.
pub struct SystemUpdate;

impl HardeningStep for SystemUpdate {
    fn name(&self) -> &'static str {
        "system-update"
    }

    fn criticality(&self) -> Criticality {
        Criticality::FatalOnFailure
    }

    fn confirmation_prompt(&self, _ctx: &RunContext) -> String {
        "Update package lists and upgrade installed packages?".to_string()
    }

    fn run(&self, _ctx: &RunContext, host: &Host) -> StepOutcome {
        if let Err(reason) = host.exec_package(&["apt-get", "update"]) {
            return StepOutcome::failed(reason);
        }
        match host.exec_package(&[
            "apt-get",
            "-y",
            "-o",
            "Dpkg::Options::=--force-confdef",
            "-o",
            "Dpkg::Options::=--force-confold",
            "upgrade",
        ]) {
            Ok(output) => {
                info!(duration_ms = output.duration.as_millis() as u64, "Packages upgraded");
                StepOutcome::Succeeded
            }
            Err(reason) => StepOutcome::failed(reason),
        }
    }
}
