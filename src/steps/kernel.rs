use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::{apply_block, finish, HardeningStep, Host, Target};
use crate::models::{Criticality, RunContext, StepOutcome};
use crate::process::argv;
use crate::transaction::{ManagedBlock, Validator};

/// Persist sysctl parameters and load them with `sysctl -p`.
///
/// `sysctl -p` doubles as the validator: an unknown key or a rejected value
/// makes it exit non-zero and the file is restored. Values it managed to
/// apply before failing stay live until the next reboot.
pub struct KernelParameters {
    params: BTreeMap<String, String>,
    path: PathBuf,
    validator_timeout: Duration,
}

impl KernelParameters {
    pub fn new(params: BTreeMap<String, String>, path: PathBuf, validator_timeout: Duration) -> Self {
        Self {
            params,
            path,
            validator_timeout,
        }
    }

    fn block(&self) -> ManagedBlock {
        self.params
            .iter()
            .fold(ManagedBlock::new(), |block, (key, value)| block.assignment(key, value))
    }
}

impl HardeningStep for KernelParameters {
    fn name(&self) -> &'static str {
        "kernel-parameters"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Recoverable
    }

    fn confirmation_prompt(&self, _ctx: &RunContext) -> String {
        format!(
            "Apply {} kernel hardening parameters in {}?",
            self.params.len(),
            self.path.display()
        )
    }

    fn run(&self, _ctx: &RunContext, host: &Host) -> StepOutcome {
        if self.params.is_empty() {
            return StepOutcome::skipped("no kernel parameters configured");
        }

        // /etc/sysctl.conf is no longer shipped by every release
        let validator = Validator::command(argv(["sysctl", "-p", "{path}"]))
            .with_timeout(self.validator_timeout);
        match apply_block(host, &self.path, Target::MaybeAbsent, &self.block(), &validator) {
            Ok(mut tx) => finish(&mut tx),
            Err(outcome) => outcome,
        }
    }
}
