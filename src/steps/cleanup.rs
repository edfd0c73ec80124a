use super::{HardeningStep, Host};
use crate::models::{Criticality, RunContext, StepOutcome};

/// Remove unused packages and the downloaded package cache
pub struct Cleanup;

impl HardeningStep for Cleanup {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn criticality(&self) -> Criticality {
        Criticality::BestEffort
    }

    fn requires_confirmation(&self) -> bool {
        false
    }

    fn confirmation_prompt(&self, _ctx: &RunContext) -> String {
        "Remove unused packages?".to_string()
    }

    fn runs_after_abort(&self) -> bool {
        true
    }

    fn run(&self, _ctx: &RunContext, host: &Host) -> StepOutcome {
        let failures: Vec<String> = [
            ["apt-get", "-y", "autoremove"],
            ["apt-get", "-y", "autoclean"],
        ]
        .iter()
        .filter_map(|cmd| host.exec_package(cmd).err())
        .collect();

        if failures.is_empty() {
            StepOutcome::Succeeded
        } else {
            StepOutcome::failed(failures.join("; "))
        }
    }
}
