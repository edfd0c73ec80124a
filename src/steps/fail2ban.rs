use std::path::PathBuf;
use std::time::Duration;

use super::{apply_block, current_ssh_ports, restart_or_rollback, HardeningStep, Host, Target};
use crate::config::Fail2banConfig;
use crate::models::{Criticality, RunContext, StepOutcome};
use crate::process::argv;
use crate::transaction::{ManagedBlock, Validator};

const SERVICE: &str = "fail2ban";

/// Install fail2ban and enable its sshd jail on the ports sshd listens on.
///
/// The ports come from `sshd_config` as it stands when the step runs, so a
/// skipped or rolled back SSH change keeps the jail on the old port.
pub struct Fail2ban {
    settings: Fail2banConfig,
    jail_local: PathBuf,
    sshd_config: PathBuf,
    validator_timeout: Duration,
}

impl Fail2ban {
    pub fn new(
        settings: Fail2banConfig,
        jail_local: PathBuf,
        sshd_config: PathBuf,
        validator_timeout: Duration,
    ) -> Self {
        Self {
            settings,
            jail_local,
            sshd_config,
            validator_timeout,
        }
    }

    fn block(&self, ports: &[u16]) -> ManagedBlock {
        let ports: Vec<String> = ports.iter().map(u16::to_string).collect();
        ManagedBlock::new()
            .raw_line("[sshd]")
            .raw_line("enabled = true")
            .raw_line(format!("port = {}", ports.join(",")))
            .raw_line("backend = systemd")
            .raw_line(format!("bantime = {}", self.settings.bantime))
            .raw_line(format!("findtime = {}", self.settings.findtime))
            .raw_line(format!("maxretry = {}", self.settings.maxretry))
    }
}

impl HardeningStep for Fail2ban {
    fn name(&self) -> &'static str {
        "fail2ban"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Recoverable
    }

    fn confirmation_prompt(&self, _ctx: &RunContext) -> String {
        "Install fail2ban and ban repeated failed SSH logins?".to_string()
    }

    fn run(&self, _ctx: &RunContext, host: &Host) -> StepOutcome {
        if let Err(reason) = host.exec_package(&["apt-get", "-y", "install", SERVICE]) {
            return StepOutcome::failed(reason);
        }

        // fail2ban-client -t checks the whole configuration directory
        let validator =
            Validator::command(argv(["fail2ban-client", "-t"])).with_timeout(self.validator_timeout);
        let mut tx = match apply_block(
            host,
            &self.jail_local,
            Target::MaybeAbsent,
            &self.block(&current_ssh_ports(host.fs, &self.sshd_config)),
            &validator,
        ) {
            Ok(tx) => tx,
            Err(outcome) => return outcome,
        };

        if let Err(reason) = host.exec(&["systemctl", "enable", SERVICE]) {
            return match tx.rollback() {
                Ok(()) => StepOutcome::rolled_back(reason),
                Err(e) => StepOutcome::from_error(&e, false),
            };
        }
        restart_or_rollback(host, &mut tx, SERVICE)
    }
}
