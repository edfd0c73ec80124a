//! Runner that logs commands instead of executing them

use std::time::Duration;
use tracing::info;

use super::{display_command, CommandOutput, CommandRunner, DEFAULT_COMMAND_TIMEOUT};
use crate::error::Result;

/// Reports every command as a successful no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    fn default_timeout(&self) -> Duration {
        DEFAULT_COMMAND_TIMEOUT
    }

    fn run_with_timeout(&self, argv: &[String], _timeout: Duration) -> Result<CommandOutput> {
        let command = display_command(argv);
        info!(command = %command, "dry run: not executing");
        Ok(CommandOutput::new(
            command,
            Some(0),
            String::new(),
            String::new(),
            Duration::ZERO,
        ))
    }
}
