//! Captured result of an external command

use std::time::Duration;

use crate::utils::truncate;

/// Exit status and output of a command that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Shell-quoted rendering of the argument vector
    pub command: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn new(
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        Self {
            command,
            exit_code,
            stdout,
            stderr,
            duration,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Short diagnostic for failure messages: stderr if present, stdout otherwise.
    pub fn diagnostics(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        truncate(text, 400)
    }

    /// One-line description of a failed command
    pub fn failure_summary(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        let diag = self.diagnostics();
        if diag.is_empty() {
            format!("`{}` failed ({status})", self.command)
        } else {
            format!("`{}` failed ({status}): {diag}", self.command)
        }
    }
}
