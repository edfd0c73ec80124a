use colored::Colorize;
use std::fmt::Write;
use std::time::Duration;

use super::{RunState, SummaryReport};
use crate::models::StepStatus;
use crate::utils::{format_duration, truncate};

const RULE_WIDTH: usize = 56;

pub(super) fn render(report: &SummaryReport) -> String {
    let mut out = String::new();
    // writing to a String cannot fail
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &SummaryReport) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "{}", "╭──────────────────────────────────────╮".cyan())?;
    writeln!(out, "{}", "│          Hardening Summary           │".cyan().bold())?;
    writeln!(out, "{}", "╰──────────────────────────────────────╯".cyan())?;
    if report.dry_run {
        writeln!(out, "{}", "  dry run: nothing was changed".yellow())?;
    }
    writeln!(out, "{}", "─".repeat(RULE_WIDTH).dimmed())?;

    for entry in &report.steps {
        let (mark, status) = match entry.status {
            StepStatus::Succeeded => ("✓".green().bold(), "succeeded".green()),
            StepStatus::Skipped => ("-".yellow().bold(), "skipped".yellow()),
            StepStatus::RolledBack => ("↺".yellow().bold(), "rolled back".yellow()),
            StepStatus::FailedFatal if entry.rollback_failed => {
                ("!".red().bold(), "ROLLBACK FAILED".red().bold())
            }
            StepStatus::FailedFatal => ("✗".red().bold(), "failed".red()),
            StepStatus::Pending | StepStatus::Running => ("·".dimmed(), "not run".dimmed()),
        };
        let timing = if entry.was_executed() {
            format_duration(Duration::from_millis(entry.duration_ms))
        } else {
            String::new()
        };
        writeln!(
            out,
            "  {mark} {:>2}. {:<22} {:<16} {}",
            entry.ordinal,
            entry.name,
            status,
            timing.dimmed()
        )?;
        if let Some(detail) = &entry.detail {
            writeln!(out, "        {}", truncate(detail, 200).dimmed())?;
        }
    }

    writeln!(out, "{}", "═".repeat(RULE_WIDTH).dimmed())?;
    let state = match report.state {
        RunState::Completed if report.is_success() => "completed".green().bold(),
        RunState::Completed => "completed with failures".yellow().bold(),
        RunState::AbortedFatal => "aborted after a fatal failure".red().bold(),
        RunState::Interrupted => "interrupted".yellow().bold(),
        RunState::NotStarted | RunState::Running => report.state.to_string().normal(),
    };
    writeln!(out, "Run {}: {state}", report.run_id.to_string().dimmed())?;

    if report.has_urgent() {
        writeln!(out)?;
        writeln!(
            out,
            "{} A rollback failed. Inspect the files named above and restore them from their {} copies before rebooting or logging out.",
            "URGENT".red().bold(),
            "*.rampart-backup".bold()
        )?;
    }
    Ok(())
}
