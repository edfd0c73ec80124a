use anyhow::{bail, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

use super::Exit;
use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::error::HardenError;
use crate::fs::{DryRunFs, FileSystem, RealFs};
use crate::gate::{read_line_or, InteractionGate, ScriptedGate, TerminalGate};
use crate::logging;
use crate::models::RunContext;
use crate::orchestrator::{Orchestrator, ROOT_REQUIRED};
use crate::process::{argv, running_as_root, CommandRunner, DryRunRunner, SystemRunner};
use crate::report::{RunState, SummaryReport};
use crate::steps::{standard_plan, Host};
use crate::validation::{parse_port, validate_username};

/// Attempts allowed for each interactive answer before giving up
const PROMPT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub ssh_port: Option<u16>,
    pub user: Option<String>,
    pub generate_keys: bool,
    pub yes: bool,
    pub dry_run: bool,
    pub report_json: Option<PathBuf>,
    pub verbose: bool,
}

/// Harden this host
/// Usage: rampart run [--ssh-port <n>] [--user <name>] [--generate-keys] [--yes] [--dry-run]
pub fn execute(opts: RunOptions, interrupt: Arc<AtomicBool>) -> Result<Exit> {
    // 1. Load configuration
    let explicit = opts.config.is_some();
    let config_path = opts
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = match Config::load(&config_path, explicit) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            return Ok(Exit::Usage);
        }
    };

    logging::init(opts.verbose, &config.logging.level);
    info!(config = %config_path.display(), dry_run = opts.dry_run, "Loaded configuration");

    // 2. Refuse before asking anything
    if let Err(e) = check_privilege(opts.dry_run, running_as_root) {
        eprintln!("{} {e}", "error:".red().bold());
        return Ok(Exit::Privilege);
    }

    // 3. Gather the run context
    let terminal = TerminalGate::new();
    let assume_yes = ScriptedGate::assume_yes();
    let gate: &dyn InteractionGate = if opts.yes { &assume_yes } else { &terminal };

    let sudo_user = std::env::var("SUDO_USER").ok();
    let ctx = match gather_context(&opts, &config, gate, sudo_user.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            return Ok(Exit::Usage);
        }
    };

    // 4. Wire the host boundary
    let system_runner = SystemRunner::new(config.timeouts.command());
    let dry_runner = DryRunRunner;
    let dry_fs = DryRunFs::new();
    let (runner, fs): (&dyn CommandRunner, &dyn FileSystem) = if opts.dry_run {
        (&dry_runner, &dry_fs)
    } else {
        (&system_runner, &RealFs)
    };
    let host = Host::new(runner, fs)
        .with_timeouts(&config.timeouts)
        .with_dry_run(opts.dry_run);

    // 5. Run the plan
    let mut orchestrator = Orchestrator::new(standard_plan(&config)).with_interrupt_flag(interrupt);
    if opts.dry_run {
        orchestrator = orchestrator.with_privilege_probe(|| true);
    }

    let report = match orchestrator.run(&ctx, &host, gate) {
        Ok(report) => report,
        Err(e @ HardenError::Privilege { .. }) => {
            eprintln!("{} {e}", "error:".red().bold());
            return Ok(Exit::Privilege);
        }
        Err(e) => return Err(e.into()),
    };

    // 6. Report
    println!("{}", report.render());
    if opts.dry_run {
        for path in dry_fs.touched_paths() {
            println!("  {} {}", "would change".dimmed(), path.display());
        }
    }
    if let Some(path) = &opts.report_json {
        match report.write_json(&RealFs, path) {
            Ok(()) => println!("Report written to {}", path.display()),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write JSON report"),
        }
    }

    // 7. Offer a reboot
    if should_offer_reboot(&report, &opts) && gate.confirm("Reboot now to apply all changes?") {
        info!("Rebooting");
        let out = runner.run(&argv(["systemctl", "reboot"]))?;
        if !out.success() {
            bail!("{}", out.failure_summary());
        }
    }

    Ok(exit_for(&report))
}

/// A dry run changes nothing, so it needs no privilege
fn check_privilege(dry_run: bool, is_root: fn() -> bool) -> std::result::Result<(), HardenError> {
    if dry_run || is_root() {
        Ok(())
    } else {
        Err(HardenError::Privilege {
            message: ROOT_REQUIRED.to_string(),
        })
    }
}

/// Resolve the SSH port, admin user and key generation choice.
///
/// Flags win over prompts. With `--yes` nothing is asked: the port comes from
/// the configuration and `--user` is mandatory.
pub fn gather_context(
    opts: &RunOptions,
    config: &Config,
    gate: &dyn InteractionGate,
    sudo_user: Option<&str>,
) -> Result<RunContext> {
    let port = match opts.ssh_port {
        Some(port) => port,
        None if opts.yes => config.ssh.port,
        None => ask(|| {
            parse_port(&read_line_or(gate, "SSH port", &config.ssh.port.to_string()))
        })?,
    };

    let username = match &opts.user {
        Some(user) => user.clone(),
        None if opts.yes => bail!("--user is required with --yes"),
        None => ask(|| {
            let answer = match sudo_user {
                Some(default) => read_line_or(gate, "Admin user", default),
                None => gate.read_line("Admin user"),
            };
            validate_username(&answer)?;
            Ok(answer)
        })?,
    };

    let generate_keys = opts.generate_keys
        || (!opts.yes && gate.confirm(&format!("Generate an SSH key pair for {username}?")));

    RunContext::new(port, generate_keys, username)
}

fn ask<T>(mut attempt: impl FnMut() -> Result<T>) -> Result<T> {
    let mut last = None;
    for _ in 0..PROMPT_ATTEMPTS {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(e) => {
                eprintln!("  {} {e}", "invalid:".yellow());
                last = Some(e);
            }
        }
    }
    match last {
        Some(e) => Err(e.context("too many invalid answers")),
        None => bail!("no answer given"),
    }
}

fn should_offer_reboot(report: &SummaryReport, opts: &RunOptions) -> bool {
    report.state == RunState::Completed && !opts.dry_run && !opts.yes && report.made_changes()
}

/// Map a finished run to its exit status
pub fn exit_for(report: &SummaryReport) -> Exit {
    match report.state {
        RunState::Completed if !report.has_urgent() => Exit::Success,
        _ => Exit::Failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Criticality, StepOutcome};
    use crate::report::StepEntry;
    use std::time::Duration;

    #[test]
    fn test_flags_skip_prompts() {
        let opts = RunOptions {
            ssh_port: Some(2222),
            user: Some("admin".to_string()),
            generate_keys: true,
            ..Default::default()
        };
        let gate = ScriptedGate::new();

        let ctx = gather_context(&opts, &Config::default(), &gate, None).unwrap();
        assert_eq!(ctx.ssh_port(), 2222);
        assert_eq!(ctx.username(), "admin");
        assert!(ctx.generate_keys());
        assert!(gate.prompts().is_empty());
    }

    #[test]
    fn test_prompts_use_defaults() {
        let opts = RunOptions::default();
        let gate = ScriptedGate::new()
            .with_lines(["", ""])
            .with_confirmations([false]);

        let ctx = gather_context(&opts, &Config::default(), &gate, Some("deploy")).unwrap();
        assert_eq!(ctx.ssh_port(), 22);
        assert_eq!(ctx.username(), "deploy");
        assert!(!ctx.generate_keys());
        assert!(gate.asked("SSH port [22]"));
        assert!(gate.asked("Admin user [deploy]"));
    }

    #[test]
    fn test_invalid_port_is_asked_again() {
        let opts = RunOptions {
            user: Some("admin".to_string()),
            ..Default::default()
        };
        let gate = ScriptedGate::new().with_lines(["0", "70000", "2222"]);

        let ctx = gather_context(&opts, &Config::default(), &gate, None).unwrap();
        assert_eq!(ctx.ssh_port(), 2222);
    }

    #[test]
    fn test_gives_up_after_repeated_invalid_answers() {
        let opts = RunOptions {
            ssh_port: Some(22),
            ..Default::default()
        };
        let gate = ScriptedGate::new().with_lines(["root;", "-x", "bad user"]);

        assert!(gather_context(&opts, &Config::default(), &gate, None).is_err());
    }

    #[test]
    fn test_yes_requires_user() {
        let opts = RunOptions {
            yes: true,
            ..Default::default()
        };
        let err = gather_context(&opts, &Config::default(), &ScriptedGate::assume_yes(), None)
            .unwrap_err();
        assert!(err.to_string().contains("--user"));
    }

    #[test]
    fn test_yes_uses_configured_port_without_keys() {
        let mut config = Config::default();
        config.ssh.port = 2200;
        let opts = RunOptions {
            yes: true,
            user: Some("admin".to_string()),
            ..Default::default()
        };
        let gate = ScriptedGate::assume_yes();

        let ctx = gather_context(&opts, &config, &gate, None).unwrap();
        assert_eq!(ctx.ssh_port(), 2200);
        assert!(!ctx.generate_keys());
        assert!(gate.prompts().is_empty());
    }

    fn finished(state: RunState, outcome: StepOutcome) -> SummaryReport {
        let ctx = RunContext::new(22, false, "admin").unwrap();
        let mut report = SummaryReport::new(
            ctx,
            vec![StepEntry::new(1, "firewall", Criticality::FatalOnFailure)],
        );
        report.steps[0].begin().unwrap();
        report.steps[0].complete(outcome, Duration::ZERO).unwrap();
        report.finish(state);
        report
    }

    #[test]
    fn test_unprivileged_run_is_refused_before_prompts() {
        let err = check_privilege(false, || false).unwrap_err();
        assert!(matches!(err, HardenError::Privilege { .. }));
        assert!(err.to_string().contains("must run as root"));

        assert!(check_privilege(true, || false).is_ok());
        assert!(check_privilege(false, || true).is_ok());
    }

    #[test]
    fn test_exit_mapping() {
        assert_eq!(exit_for(&finished(RunState::Completed, StepOutcome::Succeeded)), Exit::Success);
        assert_eq!(
            exit_for(&finished(RunState::Completed, StepOutcome::skipped("user declined"))),
            Exit::Success
        );
        assert_eq!(
            exit_for(&finished(RunState::AbortedFatal, StepOutcome::failed("boom"))),
            Exit::Failure
        );
        assert_eq!(exit_for(&finished(RunState::Interrupted, StepOutcome::Succeeded)), Exit::Failure);
    }

    #[test]
    fn test_reboot_offered_only_after_changes() {
        let interactive = RunOptions::default();
        let changed = finished(RunState::Completed, StepOutcome::Succeeded);
        let declined = finished(RunState::Completed, StepOutcome::skipped("user declined"));

        assert!(should_offer_reboot(&changed, &interactive));
        assert!(!should_offer_reboot(&declined, &interactive));
        assert!(!should_offer_reboot(
            &changed,
            &RunOptions {
                yes: true,
                ..Default::default()
            }
        ));
        assert!(!should_offer_reboot(
            &finished(RunState::AbortedFatal, StepOutcome::failed("boom")),
            &interactive
        ));
    }
}
