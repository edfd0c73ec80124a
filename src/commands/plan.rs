use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt::Write;
use std::path::PathBuf;

use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::models::Criticality;
use crate::steps::{standard_plan, HardeningStep};
use crate::LOGO;

/// Print the steps a run would take, in order
/// Usage: rampart plan [--config <path>]
pub fn execute(config: Option<PathBuf>) -> Result<()> {
    let explicit = config.is_some();
    let path = config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Config::load(&path, explicit)
        .with_context(|| format!("Failed to load configuration: {}", path.display()))?;

    print!("{}", describe(&config, &standard_plan(&config)));
    Ok(())
}

fn describe(config: &Config, steps: &[Box<dyn HardeningStep>]) -> String {
    let mut out = String::new();
    // writing to a String cannot fail
    let _ = write_plan(&mut out, config, steps);
    out
}

fn write_plan(
    out: &mut String,
    config: &Config,
    steps: &[Box<dyn HardeningStep>],
) -> std::fmt::Result {
    writeln!(out, "{}", LOGO.cyan())?;
    writeln!(out)?;
    writeln!(out, "{}", "Hardening plan".bold())?;
    writeln!(out, "{}", "─".repeat(56).dimmed())?;

    for (idx, step) in steps.iter().enumerate() {
        let criticality = match step.criticality() {
            Criticality::FatalOnFailure => "fatal on failure".red(),
            Criticality::Recoverable => "recoverable".yellow(),
            Criticality::BestEffort => "best effort".normal(),
        };
        let mut flags = Vec::new();
        if step.requires_confirmation() {
            flags.push("asks first");
        }
        if step.runs_after_abort() {
            flags.push("runs after abort");
        }
        writeln!(
            out,
            "  {:>2}. {:<22} {:<18} {}",
            idx + 1,
            step.name(),
            criticality,
            flags.join(", ").dimmed()
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{}", "Files".bold())?;
    let paths = &config.paths;
    for (label, path) in [
        ("sshd", &paths.sshd_config),
        ("sysctl", &paths.sysctl_conf),
        ("fail2ban", &paths.jail_local),
        ("apt", &paths.auto_upgrades),
    ] {
        writeln!(out, "  {label:<9} {}", path.display())?;
    }
    writeln!(
        out,
        "  {:<9} {} (service {})",
        "ssh port",
        config.ssh.port,
        config.ssh.service
    )?;
    Ok(())
}
