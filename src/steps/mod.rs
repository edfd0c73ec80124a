//! Hardening steps
//!
//! Each step is a [`HardeningStep`]: a name, a criticality, an optional
//! confirmation prompt and a `run` function that turns every failure into a
//! [`StepOutcome`]. Steps that rewrite files do so through
//! [`ConfigTransaction`]; the rest only issue commands.

mod auto_updates;
mod cleanup;
mod fail2ban;
mod firewall;
mod kernel;
mod services;
mod ssh_hardening;
mod ssh_keys;
mod system_update;

use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{Config, TimeoutsConfig};
use crate::fs::FileSystem;
use crate::models::{Criticality, Failure, RunContext, StepOutcome};
use crate::process::{argv, CommandOutput, CommandRunner, DEFAULT_COMMAND_TIMEOUT};
use crate::transaction::{ConfigTransaction, ManagedBlock, Validator};

pub use auto_updates::AutomaticUpdates;
pub use cleanup::Cleanup;
pub use fail2ban::Fail2ban;
pub use firewall::Firewall;
pub use kernel::KernelParameters;
pub use services::ServiceMinimization;
pub use ssh_hardening::{current_ssh_ports, listening_ports, SshHardening, GLOBAL_SECTION_END};
pub use ssh_keys::SshKeys;
pub use system_update::SystemUpdate;

/// Default deadline for package manager operations (30 minutes)
pub const DEFAULT_PACKAGE_TIMEOUT: Duration = Duration::from_secs(1800);

pub trait HardeningStep {
    /// Stable identifier used in logs and the report
    fn name(&self) -> &'static str;

    fn criticality(&self) -> Criticality;

    /// Whether the operator must agree before `run` is called
    fn requires_confirmation(&self) -> bool {
        true
    }

    fn confirmation_prompt(&self, ctx: &RunContext) -> String;

    /// Finalizers still run after a fatal abort
    fn runs_after_abort(&self) -> bool {
        false
    }

    /// Apply the step. Never panics and never returns an error: every
    /// failure is expressed as an outcome.
    fn run(&self, ctx: &RunContext, host: &Host) -> StepOutcome;
}

/// The machine as seen by a step: how to run commands and touch files.
pub struct Host<'a> {
    pub runner: &'a dyn CommandRunner,
    pub fs: &'a dyn FileSystem,
    pub command_timeout: Duration,
    pub package_timeout: Duration,
    /// Commands and writes are simulated; guards that read live state are skipped
    pub dry_run: bool,
}

impl<'a> Host<'a> {
    pub fn new(runner: &'a dyn CommandRunner, fs: &'a dyn FileSystem) -> Self {
        Self {
            runner,
            fs,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            package_timeout: DEFAULT_PACKAGE_TIMEOUT,
            dry_run: false,
        }
    }

    pub fn with_timeouts(mut self, timeouts: &TimeoutsConfig) -> Self {
        self.command_timeout = timeouts.command();
        self.package_timeout = timeouts.package();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run a command that must succeed.
    ///
    /// The error is a one-line reason naming the command, ready for a
    /// [`StepOutcome`].
    pub fn exec(&self, parts: &[&str]) -> Result<CommandOutput, String> {
        self.exec_with_timeout(parts, self.command_timeout)
    }

    /// Like [`Host::exec`] with the package manager deadline
    pub fn exec_package(&self, parts: &[&str]) -> Result<CommandOutput, String> {
        self.exec_with_timeout(parts, self.package_timeout)
    }

    fn exec_with_timeout(&self, parts: &[&str], timeout: Duration) -> Result<CommandOutput, String> {
        match self.runner.run_with_timeout(&argv(parts.iter().copied()), timeout) {
            Ok(output) if output.success() => Ok(output),
            Ok(output) => Err(output.failure_summary()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Run a query whose exit status is an answer rather than a failure
    pub fn probe(&self, parts: &[&str]) -> Result<CommandOutput, String> {
        self.runner
            .run_with_timeout(&argv(parts.iter().copied()), self.command_timeout)
            .map_err(|e| e.to_string())
    }
}

/// Every step in the order they run.
///
/// Updates come first. The firewall opens the new SSH port next to the
/// current one before the daemon moves; ssh-hardening closes the old one
/// only once the move succeeded. fail2ban and service minimization follow;
/// cleanup is last and also runs after a fatal abort.
pub fn standard_plan(config: &Config) -> Vec<Box<dyn HardeningStep>> {
    let validator_timeout = config.timeouts.validator();
    vec![
        Box::new(SystemUpdate),
        Box::new(SshKeys::new(config.paths.clone())),
        Box::new(Firewall::new(
            config.firewall.extra_allow.clone(),
            config.paths.sshd_config.clone(),
        )),
        Box::new(
            SshHardening::new(config.ssh.clone(), config.paths.clone(), validator_timeout)
                .with_kept_rules(config.firewall.extra_allow.clone()),
        ),
        Box::new(KernelParameters::new(
            config.kernel.params.clone(),
            config.paths.sysctl_conf.clone(),
            validator_timeout,
        )),
        Box::new(Fail2ban::new(
            config.fail2ban.clone(),
            config.paths.jail_local.clone(),
            config.paths.sshd_config.clone(),
            validator_timeout,
        )),
        Box::new(AutomaticUpdates::new(config.paths.auto_upgrades.clone())),
        Box::new(ServiceMinimization::new(config.services.disable.clone())),
        Box::new(Cleanup),
    ]
}

/// Whether the target must already exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Existing,
    MaybeAbsent,
}

/// Open a transaction on `path`, apply `block` and validate the result.
///
/// On success the transaction is returned validated (or committed when there
/// is no validator) so the caller can commit it or undo it after a dependent
/// action. On failure the outcome says whether the file was restored.
fn apply_block<'a>(
    host: &Host<'a>,
    path: &Path,
    target: Target,
    block: &ManagedBlock,
    validator: &Validator,
) -> Result<ConfigTransaction<'a>, StepOutcome> {
    let opened = match target {
        Target::Existing => ConfigTransaction::open(host.fs, path),
        Target::MaybeAbsent => ConfigTransaction::open_or_create(host.fs, path),
    };
    let mut tx = opened.map_err(|e| StepOutcome::from_error(&e, false))?;

    if let Err(e) = tx.rewrite(|lines| block.apply(lines)) {
        // nothing was written yet
        let _ = tx.rollback();
        return Err(StepOutcome::rolled_back(e.to_string()));
    }

    if !tx.has_changes() {
        info!(path = %path.display(), "Already up to date");
    }

    if let Err(e) = tx.validate(validator, host.runner) {
        return Err(StepOutcome::from_error(&e, tx.is_rolled_back()));
    }
    Ok(tx)
}

/// Restart `service` to pick up a validated change. If the restart fails,
/// the change is undone and the service restarted on the old configuration.
fn restart_or_rollback(host: &Host, tx: &mut ConfigTransaction, service: &str) -> StepOutcome {
    let restart_failure = match host.exec(&["systemctl", "restart", service]) {
        Ok(_) => return finish(tx),
        Err(reason) => reason,
    };

    warn!(service, reason = %restart_failure, "Restart failed, restoring previous configuration");
    if let Err(e) = tx.rollback() {
        return StepOutcome::from_error(&e, false);
    }

    match host.exec(&["systemctl", "restart", service]) {
        Ok(_) => StepOutcome::rolled_back(format!(
            "{restart_failure}; previous configuration of {} restored",
            tx.target().display()
        )),
        Err(second) => {
            error!(service, reason = %second, "Service does not start on the restored configuration");
            StepOutcome::FailedFatal(Failure::new(format!(
                "{restart_failure}; configuration restored but `{service}` still fails to restart: {second}"
            )))
        }
    }
}

/// Commit a validated transaction
fn finish(tx: &mut ConfigTransaction) -> StepOutcome {
    match tx.commit() {
        Ok(()) => StepOutcome::Succeeded,
        Err(e) => StepOutcome::failed(e.to_string()),
    }
}
