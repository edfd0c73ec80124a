//! Summary of a hardening run
//!
//! The report is created with one `Pending` entry per step before anything
//! runs, so it can always be produced, whatever happens afterwards.

mod render;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::fs::FileSystem;
use crate::models::{Criticality, RunContext, StepOutcome, StepStatus};

/// Orchestrator lifecycle.
///
/// `NotStarted` -> `Running` -> `Completed` | `AbortedFatal` | `Interrupted`
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    /// A fatal-on-failure step failed; later ordinary steps were not run
    AbortedFatal,
    /// The operator pressed Ctrl-C; the step in progress was finished
    Interrupted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::NotStarted => write!(f, "not started"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::AbortedFatal => write!(f, "aborted"),
            RunState::Interrupted => write!(f, "interrupted"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepEntry {
    /// 1-based position in the plan
    pub ordinal: usize,
    pub name: String,
    pub criticality: Criticality,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub rollback_failed: bool,
    pub duration_ms: u64,
    #[serde(skip)]
    outcome: Option<StepOutcome>,
}

impl StepEntry {
    pub fn new(ordinal: usize, name: impl Into<String>, criticality: Criticality) -> Self {
        Self {
            ordinal,
            name: name.into(),
            criticality,
            status: StepStatus::Pending,
            detail: None,
            rollback_failed: false,
            duration_ms: 0,
            outcome: None,
        }
    }

    /// Mark the step as started
    pub fn begin(&mut self) -> Result<()> {
        self.status = self.status.try_transition(StepStatus::Running)?;
        Ok(())
    }

    /// Record the outcome of a started step
    pub fn complete(&mut self, outcome: StepOutcome, elapsed: Duration) -> Result<()> {
        self.status = self.status.try_transition(StepStatus::from(&outcome))?;
        self.detail = outcome.detail().map(String::from);
        self.rollback_failed = outcome.rollback_failed();
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.outcome = Some(outcome);
        Ok(())
    }

    /// `None` until the step has run
    pub fn outcome(&self) -> Option<&StepOutcome> {
        self.outcome.as_ref()
    }

    pub fn was_executed(&self) -> bool {
        self.status != StepStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub state: RunState,
    pub dry_run: bool,
    pub context: RunContext,
    pub steps: Vec<StepEntry>,
}

impl SummaryReport {
    pub fn new(context: RunContext, steps: Vec<StepEntry>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            state: RunState::NotStarted,
            dry_run: false,
            context,
            steps,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn finish(&mut self, state: RunState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }

    pub fn entry(&self, name: &str) -> Option<&StepEntry> {
        self.steps.iter().find(|e| e.name == name)
    }

    pub fn status_of(&self, name: &str) -> Option<StepStatus> {
        self.entry(name).map(|e| e.status)
    }

    /// Names of the steps that were started, in order
    pub fn executed(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|e| e.was_executed())
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Names of the steps that never started
    pub fn not_run(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|e| !e.was_executed())
            .map(|e| e.name.as_str())
            .collect()
    }

    /// A rollback failed somewhere; the host needs manual attention
    pub fn has_urgent(&self) -> bool {
        self.steps.iter().any(|e| e.rollback_failed)
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
            && self
                .steps
                .iter()
                .all(|e| !matches!(e.status, StepStatus::RolledBack | StepStatus::FailedFatal))
    }

    /// Whether any step got as far as changing the host
    pub fn made_changes(&self) -> bool {
        self.steps.iter().any(|e| {
            matches!(
                e.status,
                StepStatus::Succeeded | StepStatus::RolledBack | StepStatus::FailedFatal
            )
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON form atomically
    pub fn write_json(&self, fs: &dyn FileSystem, path: &Path) -> Result<()> {
        let mut json = self.to_json()?;
        json.push('\n');
        fs.write_atomic(path, json.as_bytes())?;
        Ok(())
    }

    pub fn render(&self) -> String {
        render::render(self)
    }
}
