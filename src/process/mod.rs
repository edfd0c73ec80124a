//! External command execution
//!
//! Every interaction with package managers, firewalls, service managers and
//! validators goes through [`CommandRunner`]. A non-zero exit status is
//! returned to the caller, never raised; only a command that cannot be
//! launched or that outlives its deadline is an error.

mod dry_run;
mod output;
pub mod scripted;
mod system;

use std::borrow::Cow;
use std::time::Duration;

use crate::error::Result;

pub use dry_run::DryRunRunner;
pub use output::CommandOutput;
pub use scripted::{Reply, ScriptedRunner};
pub use system::SystemRunner;

/// Default timeout for ordinary commands (5 minutes)
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs external commands and captures their exit status and output.
pub trait CommandRunner {
    /// Timeout applied by [`CommandRunner::run`]
    fn default_timeout(&self) -> Duration;

    /// Run `argv` and wait at most `timeout` for it to exit.
    ///
    /// # Errors
    /// * [`HardenError::Execution`](crate::HardenError::Execution) if the
    ///   executable cannot be located or launched
    /// * [`HardenError::Timeout`](crate::HardenError::Timeout) if the command
    ///   was killed after exceeding `timeout`
    fn run_with_timeout(&self, argv: &[String], timeout: Duration) -> Result<CommandOutput>;

    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        self.run_with_timeout(argv, self.default_timeout())
    }
}

/// Build an owned argument vector from string slices.
pub fn argv<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}

/// Render an argument vector as a shell-quoted command line for logs and reports.
pub fn display_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| shell_escape::escape(Cow::from(arg.as_str())).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether the current process runs with an effective UID of 0
pub fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}
