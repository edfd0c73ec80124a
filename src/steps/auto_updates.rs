use std::path::PathBuf;

use super::{apply_block, finish, HardeningStep, Host, Target};
use crate::models::{Criticality, RunContext, StepOutcome};
use crate::transaction::{ManagedBlock, Validator};

const PERIODIC_KEYS: [&str; 2] = [
    "APT::Periodic::Update-Package-Lists",
    "APT::Periodic::Unattended-Upgrade",
];

/// Turn on unattended security upgrades
pub struct AutomaticUpdates {
    path: PathBuf,
}

impl AutomaticUpdates {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn block() -> ManagedBlock {
        PERIODIC_KEYS.iter().fold(ManagedBlock::new(), |block, key| {
            block.strip_key(key).raw_line(format!("{key} \"1\";"))
        })
    }
}

impl HardeningStep for AutomaticUpdates {
    fn name(&self) -> &'static str {
        "automatic-updates"
    }

    fn criticality(&self) -> Criticality {
        Criticality::BestEffort
    }

    fn confirmation_prompt(&self, _ctx: &RunContext) -> String {
        "Enable automatic security updates?".to_string()
    }

    fn run(&self, _ctx: &RunContext, host: &Host) -> StepOutcome {
        if let Err(reason) = host.exec_package(&["apt-get", "-y", "install", "unattended-upgrades"]) {
            return StepOutcome::failed(reason);
        }

        // apt has no standalone syntax check for a single conf file
        let outcome = match apply_block(host, &self.path, Target::MaybeAbsent, &Self::block(), &Validator::None) {
            Ok(mut tx) => finish(&mut tx),
            Err(outcome) => return outcome,
        };

        match host.exec(&["systemctl", "enable", "--now", "unattended-upgrades"]) {
            Ok(_) => outcome,
            Err(reason) => StepOutcome::failed(reason),
        }
    }
}
