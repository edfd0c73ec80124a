//! Post-write checks for transactional rewrites

use std::path::Path;
use std::time::Duration;

/// Token in a validator command replaced by the target path
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Default deadline for a validator command
pub const DEFAULT_VALIDATOR_TIMEOUT: Duration = Duration::from_secs(60);

/// External check run over a newly written file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
    /// The write is committed as soon as the rename completes
    None,
    /// A command that exits 0 when the file is acceptable
    Command { argv: Vec<String>, timeout: Duration },
}

impl Validator {
    /// A command validator; `{path}` arguments are replaced by the target path
    pub fn command(argv: Vec<String>) -> Self {
        Validator::Command {
            argv,
            timeout: DEFAULT_VALIDATOR_TIMEOUT,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        match self {
            Validator::Command { argv, .. } => Validator::Command { argv, timeout },
            Validator::None => Validator::None,
        }
    }

    /// Argument vector with placeholders filled in for `target`
    pub fn argv_for(&self, target: &Path) -> Option<Vec<String>> {
        match self {
            Validator::None => None,
            Validator::Command { argv, .. } => Some(
                argv.iter()
                    .map(|arg| arg.replace(PATH_PLACEHOLDER, &target.display().to_string()))
                    .collect(),
            ),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            Validator::None => Duration::ZERO,
            Validator::Command { timeout, .. } => *timeout,
        }
    }
}
