//! Step orchestration
//!
//! Runs the plan in order, one step at a time. Before each step that asks
//! for it, the operator is asked through the [`InteractionGate`]; a refusal
//! skips the step without calling it. A `FailedFatal` outcome from a
//! fatal-on-failure step stops every later step except finalizers.

use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::{HardenError, Result};
use crate::gate::InteractionGate;
use crate::models::{Criticality, RunContext, StepOutcome};
use crate::process::running_as_root;
use crate::report::{RunState, StepEntry, SummaryReport};
use crate::steps::{HardeningStep, Host};

pub const ROOT_REQUIRED: &str = "rampart must run as root (effective UID 0)";

/// Reason recorded when the operator refuses a step
pub const DECLINED: &str = "user declined";

pub struct Orchestrator {
    steps: Vec<Box<dyn HardeningStep>>,
    privilege_probe: fn() -> bool,
    interrupt: Option<Arc<AtomicBool>>,
    state: RunState,
}

impl Orchestrator {
    pub fn new(steps: Vec<Box<dyn HardeningStep>>) -> Self {
        Self {
            steps,
            privilege_probe: running_as_root,
            interrupt: None,
            state: RunState::NotStarted,
        }
    }

    /// Replace the effective-UID check
    pub fn with_privilege_probe(mut self, probe: fn() -> bool) -> Self {
        self.privilege_probe = probe;
        self
    }

    /// Flag set asynchronously (Ctrl-C). The step in progress is finished,
    /// then the run stops.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn steps(&self) -> &[Box<dyn HardeningStep>] {
        &self.steps
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run every step against `host`.
    ///
    /// # Errors
    /// * `Privilege` when not running as root; no step is started
    pub fn run(
        &mut self,
        ctx: &RunContext,
        host: &Host,
        gate: &dyn InteractionGate,
    ) -> Result<SummaryReport> {
        if !(self.privilege_probe)() {
            return Err(HardenError::Privilege {
                message: ROOT_REQUIRED.to_string(),
            });
        }

        let entries = self
            .steps
            .iter()
            .enumerate()
            .map(|(idx, step)| StepEntry::new(idx + 1, step.name(), step.criticality()))
            .collect();
        let mut report = SummaryReport::new(ctx.clone(), entries).with_dry_run(host.dry_run);

        self.state = RunState::Running;
        info!(run_id = %report.run_id, steps = self.steps.len(), "Starting hardening run");

        let total = self.steps.len();
        let mut halted: Option<RunState> = None;

        for (idx, step) in self.steps.iter().enumerate() {
            if halted.is_none() && self.interrupted() {
                warn!(step = step.name(), "Interrupted, remaining steps will not run");
                halted = Some(RunState::Interrupted);
            }
            match halted {
                Some(RunState::AbortedFatal) if step.runs_after_abort() => {}
                Some(_) => {
                    info!(step = step.name(), "Not run");
                    continue;
                }
                None => {}
            }

            println!(
                "\n{} {}",
                format!("[{}/{}]", idx + 1, total).dimmed(),
                step.name().bold()
            );

            let entry = &mut report.steps[idx];
            if let Err(e) = entry.begin() {
                error!(step = step.name(), error = %e, "Report entry not pending");
            }
            let started = Instant::now();

            let outcome = if step.requires_confirmation()
                && !gate.confirm(&step.confirmation_prompt(ctx))
            {
                StepOutcome::skipped(DECLINED)
            } else {
                step.run(ctx, host)
            };
            log_outcome(step.name(), &outcome);

            if outcome.is_failed_fatal() && step.criticality() == Criticality::FatalOnFailure {
                error!(step = step.name(), "Fatal step failed, aborting run");
                halted.get_or_insert(RunState::AbortedFatal);
            }
            if let Err(e) = entry.complete(outcome, started.elapsed()) {
                error!(step = step.name(), error = %e, "Could not record step outcome");
            }
        }

        self.state = halted.unwrap_or(RunState::Completed);
        report.finish(self.state);
        info!(run_id = %report.run_id, state = %self.state, "Hardening run finished");
        Ok(report)
    }
}

fn log_outcome(step: &str, outcome: &StepOutcome) {
    match outcome {
        StepOutcome::Succeeded => {
            info!(step, "Step succeeded");
            println!("  {} {}", "✓".green().bold(), "done".green());
        }
        StepOutcome::Skipped(reason) => {
            info!(step, reason = %reason, "Step skipped");
            println!("  {} skipped: {reason}", "-".yellow().bold());
        }
        StepOutcome::RolledBack(reason) => {
            warn!(step, reason = %reason, "Step rolled back");
            println!("  {} rolled back: {reason}", "↺".yellow().bold());
        }
        StepOutcome::FailedFatal(failure) if failure.rollback_failed => {
            error!(step, reason = %failure.reason, "ROLLBACK FAILED");
            println!("  {} {}", "!".red().bold(), failure.reason.red().bold());
        }
        StepOutcome::FailedFatal(failure) => {
            error!(step, reason = %failure.reason, "Step failed");
            println!("  {} failed: {}", "✗".red().bold(), failure.reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::RealFs;
    use crate::gate::ScriptedGate;
    use crate::models::StepStatus;
    use crate::process::ScriptedRunner;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Probe {
        name: &'static str,
        criticality: Criticality,
        outcome: StepOutcome,
        confirm: bool,
        finalizer: bool,
        calls: Rc<Cell<usize>>,
    }

    impl Probe {
        fn new(name: &'static str, criticality: Criticality, outcome: StepOutcome) -> Self {
            Self {
                name,
                criticality,
                outcome,
                confirm: false,
                finalizer: false,
                calls: Rc::new(Cell::new(0)),
            }
        }
    }

    impl HardeningStep for Probe {
        fn name(&self) -> &'static str {
            self.name
        }
        fn criticality(&self) -> Criticality {
            self.criticality
        }
        fn requires_confirmation(&self) -> bool {
            self.confirm
        }
        fn confirmation_prompt(&self, _ctx: &RunContext) -> String {
            format!("Run {}?", self.name)
        }
        fn runs_after_abort(&self) -> bool {
            self.finalizer
        }
        fn run(&self, _ctx: &RunContext, _host: &Host) -> StepOutcome {
            self.calls.set(self.calls.get() + 1);
            self.outcome.clone()
        }
    }

    fn ctx() -> RunContext {
        RunContext::new(22, false, "admin").unwrap()
    }

    #[test]
    fn test_privilege_failure_runs_nothing() {
        let step = Probe::new("a", Criticality::Recoverable, StepOutcome::Succeeded);
        let calls = step.calls.clone();
        let mut orch = Orchestrator::new(vec![Box::new(step)]).with_privilege_probe(|| false);
        let runner = ScriptedRunner::new();
        let host = Host::new(&runner, &RealFs);

        let err = orch.run(&ctx(), &host, &ScriptedGate::new()).unwrap_err();
        assert!(matches!(err, HardenError::Privilege { .. }));
        assert_eq!(calls.get(), 0);
        assert_eq!(orch.state(), RunState::NotStarted);
    }

    #[test]
    fn test_recoverable_failure_continues() {
        let mut orch = Orchestrator::new(vec![
            Box::new(Probe::new("a", Criticality::Recoverable, StepOutcome::failed("boom"))),
            Box::new(Probe::new("b", Criticality::BestEffort, StepOutcome::Succeeded)),
        ])
        .with_privilege_probe(|| true);
        let runner = ScriptedRunner::new();
        let host = Host::new(&runner, &RealFs);

        let report = orch.run(&ctx(), &host, &ScriptedGate::new()).unwrap();
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.status_of("a"), Some(StepStatus::FailedFatal));
        assert_eq!(report.status_of("b"), Some(StepStatus::Succeeded));
        assert!(!report.is_success());
    }

    #[test]
    fn test_rolled_back_fatal_step_does_not_halt() {
        let mut orch = Orchestrator::new(vec![
            Box::new(Probe::new("a", Criticality::FatalOnFailure, StepOutcome::rolled_back("rejected"))),
            Box::new(Probe::new("b", Criticality::Recoverable, StepOutcome::Succeeded)),
        ])
        .with_privilege_probe(|| true);
        let runner = ScriptedRunner::new();
        let host = Host::new(&runner, &RealFs);

        let report = orch.run(&ctx(), &host, &ScriptedGate::new()).unwrap();
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.executed(), vec!["a", "b"]);
    }

    #[test]
    fn test_finalizer_runs_after_abort() {
        let mut cleanup = Probe::new("cleanup", Criticality::BestEffort, StepOutcome::Succeeded);
        cleanup.finalizer = true;
        let mut orch = Orchestrator::new(vec![
            Box::new(Probe::new("a", Criticality::FatalOnFailure, StepOutcome::failed("boom"))),
            Box::new(Probe::new("b", Criticality::Recoverable, StepOutcome::Succeeded)),
            Box::new(cleanup),
        ])
        .with_privilege_probe(|| true);
        let runner = ScriptedRunner::new();
        let host = Host::new(&runner, &RealFs);

        let report = orch.run(&ctx(), &host, &ScriptedGate::new()).unwrap();
        assert_eq!(report.state, RunState::AbortedFatal);
        assert_eq!(report.executed(), vec!["a", "cleanup"]);
        assert_eq!(report.status_of("b"), Some(StepStatus::Pending));
    }

    #[test]
    fn test_declined_step_is_skipped_without_running() {
        let mut step = Probe::new("a", Criticality::FatalOnFailure, StepOutcome::Succeeded);
        step.confirm = true;
        let calls = step.calls.clone();
        let mut orch = Orchestrator::new(vec![Box::new(step)]).with_privilege_probe(|| true);
        let runner = ScriptedRunner::new();
        let host = Host::new(&runner, &RealFs);
        let gate = ScriptedGate::new().with_confirmations([false]);

        let report = orch.run(&ctx(), &host, &gate).unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(report.steps[0].detail.as_deref(), Some(DECLINED));
        assert_eq!(gate.prompts(), vec!["Run a?"]);
        assert_eq!(report.state, RunState::Completed);
        assert!(!report.made_changes());
    }

    #[test]
    fn test_interrupt_stops_before_next_step() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut cleanup = Probe::new("cleanup", Criticality::BestEffort, StepOutcome::Succeeded);
        cleanup.finalizer = true;
        let mut orch = Orchestrator::new(vec![
            Box::new(Probe::new("a", Criticality::Recoverable, StepOutcome::Succeeded)),
            Box::new(cleanup),
        ])
        .with_privilege_probe(|| true)
        .with_interrupt_flag(flag);
        let runner = ScriptedRunner::new();
        let host = Host::new(&runner, &RealFs);

        let report = orch.run(&ctx(), &host, &ScriptedGate::new()).unwrap();
        assert_eq!(report.state, RunState::Interrupted);
        assert!(report.executed().is_empty());
    }
}
