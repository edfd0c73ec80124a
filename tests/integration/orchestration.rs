//! Integration tests for step ordering, abort handling and confirmation

use std::cell::RefCell;
use std::rc::Rc;

use rampart::config::Config;
use rampart::gate::ScriptedGate;
use rampart::models::{Criticality, RunContext, StepOutcome, StepStatus};
use rampart::orchestrator::{Orchestrator, DECLINED};
use rampart::process::ScriptedRunner;
use rampart::report::RunState;
use rampart::steps::{standard_plan, HardeningStep, Host};

use super::helpers::{HostFixture, RecordingFs};

/// Step that records its name in a shared journal when run
struct Journaled {
    name: &'static str,
    criticality: Criticality,
    outcome: StepOutcome,
    journal: Rc<RefCell<Vec<&'static str>>>,
}

impl HardeningStep for Journaled {
    fn name(&self) -> &'static str {
        self.name
    }

    fn criticality(&self) -> Criticality {
        self.criticality
    }

    fn requires_confirmation(&self) -> bool {
        false
    }

    fn confirmation_prompt(&self, _ctx: &RunContext) -> String {
        String::new()
    }

    fn run(&self, _ctx: &RunContext, _host: &Host) -> StepOutcome {
        self.journal.borrow_mut().push(self.name);
        self.outcome.clone()
    }
}

fn ctx() -> RunContext {
    RunContext::new(2222, false, "admin").expect("Should build run context")
}

#[test]
fn test_fatal_failure_stops_later_steps() {
    let journal = Rc::new(RefCell::new(Vec::new()));
    let step = |name, criticality, outcome| -> Box<dyn HardeningStep> {
        Box::new(Journaled {
            name,
            criticality,
            outcome,
            journal: journal.clone(),
        })
    };
    let mut orchestrator = Orchestrator::new(vec![
        step("a", Criticality::Recoverable, StepOutcome::Succeeded),
        step("b", Criticality::FatalOnFailure, StepOutcome::failed("ufw enable failed")),
        step("c", Criticality::Recoverable, StepOutcome::Succeeded),
    ])
    .with_privilege_probe(|| true);

    let runner = ScriptedRunner::new();
    let fs = RecordingFs::new();
    let host = Host::new(&runner, &fs);
    let report = orchestrator
        .run(&ctx(), &host, &ScriptedGate::assume_yes())
        .expect("Run should produce a report");

    assert_eq!(*journal.borrow(), vec!["a", "b"]);
    assert_eq!(report.executed(), vec!["a", "b"]);
    assert_eq!(report.not_run(), vec!["c"]);
    assert_eq!(report.status_of("c"), Some(StepStatus::Pending));
    assert_eq!(report.state, RunState::AbortedFatal);
    assert_eq!(orchestrator.state(), RunState::AbortedFatal);
    assert!(report.render().contains("not run"));
}

#[test]
fn test_declined_steps_never_touch_the_filesystem() {
    let fixture = HostFixture::new().with_admin_key();
    let mut config = Config::default();
    config.paths = fixture.paths.clone();

    let runner = ScriptedRunner::new();
    let fs = RecordingFs::new();
    let host = Host::new(&runner, &fs);
    let gate = ScriptedGate::new();

    let mut orchestrator = Orchestrator::new(standard_plan(&config)).with_privilege_probe(|| true);
    let report = orchestrator.run(&ctx(), &host, &gate).unwrap();

    assert!(fs.mutations().is_empty(), "{:?}", fs.mutations());
    assert_eq!(report.state, RunState::Completed);
    for name in ["system-update", "firewall", "ssh-hardening", "fail2ban"] {
        let entry = report.entry(name).unwrap();
        assert_eq!(entry.status, StepStatus::Skipped, "{name}");
        assert_eq!(entry.detail.as_deref(), Some(DECLINED));
    }
    // cleanup asks nothing and only runs apt
    assert_eq!(report.status_of("cleanup"), Some(StepStatus::Succeeded));
    assert!(!runner.ran(&["apt-get", "update"]));
    assert!(!runner.ran(&["ufw"]));
    assert!(gate.asked("2222"));
}

#[test]
fn test_privilege_failure_produces_no_report() {
    let runner = ScriptedRunner::new();
    let fs = RecordingFs::new();
    let host = Host::new(&runner, &fs);
    let mut orchestrator =
        Orchestrator::new(standard_plan(&Config::default())).with_privilege_probe(|| false);

    let err = orchestrator
        .run(&ctx(), &host, &ScriptedGate::assume_yes())
        .unwrap_err();
    assert!(err.to_string().contains("root"));
    assert!(runner.calls().is_empty());
    assert!(fs.mutations().is_empty());
}
