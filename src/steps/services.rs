use tracing::{debug, info};

use super::{HardeningStep, Host};
use crate::models::{Criticality, RunContext, StepOutcome};

/// Disable services that enlarge the attack surface of a server
pub struct ServiceMinimization {
    services: Vec<String>,
}

impl ServiceMinimization {
    pub fn new(services: Vec<String>) -> Self {
        Self { services }
    }
}

impl HardeningStep for ServiceMinimization {
    fn name(&self) -> &'static str {
        "service-minimization"
    }

    fn criticality(&self) -> Criticality {
        Criticality::BestEffort
    }

    fn confirmation_prompt(&self, _ctx: &RunContext) -> String {
        format!("Disable unneeded services ({})?", self.services.join(", "))
    }

    fn run(&self, _ctx: &RunContext, host: &Host) -> StepOutcome {
        let mut disabled = Vec::new();
        let mut failures = Vec::new();

        for service in &self.services {
            // exits non-zero for disabled, masked and unknown units alike
            let enabled = match host.probe(&["systemctl", "is-enabled", service.as_str()]) {
                Ok(output) => output.success() && output.stdout.trim() == "enabled",
                Err(reason) => {
                    failures.push(reason);
                    continue;
                }
            };
            if !enabled {
                debug!(service = %service, "Not enabled");
                continue;
            }

            match host.exec(&["systemctl", "disable", "--now", service.as_str()]) {
                Ok(_) => {
                    info!(service = %service, "Disabled service");
                    disabled.push(service.as_str());
                }
                Err(reason) => failures.push(reason),
            }
        }

        if !failures.is_empty() {
            StepOutcome::failed(failures.join("; "))
        } else if disabled.is_empty() {
            StepOutcome::skipped("none of the listed services are enabled")
        } else {
            StepOutcome::Succeeded
        }
    }
}
