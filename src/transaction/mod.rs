//! Transactional rewrite of a single configuration file
//!
//! Protocol: snapshot the target to a backup and verify the backup, edit an
//! in-memory working copy, replace the target atomically, run the validator,
//! then either commit or restore the backup. At every point the target holds
//! either its original bytes or content that passed validation.
//!
//! ```text
//! open ──► Open ──validate──► Written ──validator ok──► Validated ──commit──► Committed
//!            │                   │  (no validator) ──────────────────────────► Committed
//!            │                   └──validator rejects / fails──► RolledBack
//!            └──rollback──► RolledBack            Validated ──rollback──► RolledBack
//! ```
//!
//! The machine must be exclusively owned for the duration of a run; nothing
//! here guards against another process editing the same file concurrently.

pub mod directives;
pub mod validator;

use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::{HardenError, Result};
use crate::fs::FileSystem;
use crate::process::CommandRunner;

pub use directives::{ManagedBlock, Placement, RewriteError, BLOCK_BEGIN, BLOCK_END};
pub use validator::{Validator, DEFAULT_VALIDATOR_TIMEOUT, PATH_PLACEHOLDER};

/// Suffix of the backup taken by every transaction
pub const BACKUP_SUFFIX: &str = ".rampart-backup";
/// Suffix of the copy taken the first time a file is ever touched
pub const ORIGINAL_SUFFIX: &str = ".rampart-orig";

/// Path of the per-transaction backup for `target`
pub fn backup_path(target: &Path) -> PathBuf {
    with_suffix(target, BACKUP_SUFFIX)
}

/// Path of the first-touch copy for `target`; never overwritten once present
pub fn original_path(target: &Path) -> PathBuf {
    with_suffix(target, ORIGINAL_SUFFIX)
}

fn with_suffix(target: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| target.as_os_str().to_os_string());
    name.push(suffix);
    target.with_file_name(name)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Backup taken, target untouched
    Open,
    /// New content renamed into place, validator not yet passed
    Written,
    /// Validator accepted the new content
    Validated,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Open => write!(f, "open"),
            TransactionState::Written => write!(f, "written"),
            TransactionState::Validated => write!(f, "validated"),
            TransactionState::Committed => write!(f, "committed"),
            TransactionState::RolledBack => write!(f, "rolled back"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkingCopy {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl WorkingCopy {
    fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(String::from).collect(),
            trailing_newline: text.is_empty() || text.ends_with('\n'),
        }
    }

    fn render(&self) -> Vec<u8> {
        let mut out = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out.into_bytes()
    }
}

/// One in-progress mutation of one file, owned by the step that opened it.
pub struct ConfigTransaction<'a> {
    fs: &'a dyn FileSystem,
    target: PathBuf,
    backup: PathBuf,
    /// `None` when the target did not exist before the transaction
    original: Option<Vec<u8>>,
    original_digest: Option<String>,
    /// `None` until the first successful rewrite
    working: Option<WorkingCopy>,
    state: TransactionState,
}

impl<'a> ConfigTransaction<'a> {
    /// Snapshot an existing file.
    ///
    /// # Errors
    /// * `Io` if the target cannot be read, or the backup cannot be written
    ///   or does not read back identical to the target
    pub fn open(fs: &'a dyn FileSystem, target: impl Into<PathBuf>) -> Result<Self> {
        let target = target.into();
        let original = fs.read(&target)?;
        let backup = backup_path(&target);

        fs.copy(&target, &backup)?;
        let digest = sha256_hex(&original);
        let stored = fs.read(&backup)?;
        if sha256_hex(&stored) != digest {
            return Err(HardenError::io(
                &backup,
                std::io::Error::other("backup does not match the original content"),
            ));
        }

        let first_touch = original_path(&target);
        if !fs.exists(&first_touch) {
            if let Err(e) = fs.copy(&target, &first_touch) {
                warn!(path = %first_touch.display(), error = %e, "Could not keep first-touch copy");
            }
        }

        info!(
            path = %target.display(),
            backup = %backup.display(),
            sha256 = %digest,
            "Opened configuration transaction"
        );

        Ok(Self {
            fs,
            target,
            backup,
            original: Some(original),
            original_digest: Some(digest),
            working: None,
            state: TransactionState::Open,
        })
    }

    /// Like [`ConfigTransaction::open`], but a missing target is treated as
    /// empty. Rolling back such a transaction removes the file again.
    pub fn open_or_create(fs: &'a dyn FileSystem, target: impl Into<PathBuf>) -> Result<Self> {
        let target = target.into();
        if fs.exists(&target) {
            return Self::open(fs, target);
        }

        info!(path = %target.display(), "Opened configuration transaction for new file");
        Ok(Self {
            fs,
            backup: backup_path(&target),
            target,
            original: None,
            original_digest: None,
            working: None,
            state: TransactionState::Open,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::Committed
    }

    pub fn is_rolled_back(&self) -> bool {
        self.state == TransactionState::RolledBack
    }

    /// Whether the target existed before the transaction
    pub fn target_existed(&self) -> bool {
        self.original.is_some()
    }

    /// Bytes that `validate` would write
    pub fn content(&self) -> Vec<u8> {
        match (&self.working, &self.original) {
            (Some(working), _) => working.render(),
            (None, Some(original)) => original.clone(),
            (None, None) => Vec::new(),
        }
    }

    /// Whether the working copy differs from the pre-transaction content
    pub fn has_changes(&self) -> bool {
        match &self.original {
            Some(original) => &self.content() != original,
            None => self.working.is_some(),
        }
    }

    /// Apply a pure transformation to the working copy.
    ///
    /// The working copy is replaced only if `transform` succeeds.
    ///
    /// # Errors
    /// * `Format` if the content is not UTF-8 or the transform fails
    /// * `InvalidState` unless the transaction is still open
    pub fn rewrite<F>(&mut self, transform: F) -> Result<()>
    where
        F: FnOnce(&[String]) -> std::result::Result<Vec<String>, RewriteError>,
    {
        self.require(&[TransactionState::Open], "rewrite")?;

        let current = match (&self.working, &self.original) {
            (Some(working), _) => working.clone(),
            (None, Some(original)) => {
                let text = std::str::from_utf8(original)
                    .map_err(|_| HardenError::format(&self.target, "file is not valid UTF-8"))?;
                WorkingCopy::parse(text)
            }
            (None, None) => WorkingCopy::parse(""),
        };

        let lines = transform(&current.lines)
            .map_err(|e| HardenError::format(&self.target, e.to_string()))?;

        debug!(
            path = %self.target.display(),
            before = current.lines.len(),
            after = lines.len(),
            "Rewrote working copy"
        );
        self.working = Some(WorkingCopy {
            lines,
            trailing_newline: true,
        });
        Ok(())
    }

    /// Write the working copy into place and run `validator` over it.
    ///
    /// Without a validator the transaction is committed once the rename
    /// completes. When the validator rejects the file, fails to launch, or
    /// times out, the backup is restored before the error is returned.
    ///
    /// # Errors
    /// * `Io` if the new content could not be written (target unchanged)
    /// * `ValidationRejected` if the validator exited non-zero (target restored)
    /// * `Execution` / `Timeout` from the validator (target restored)
    /// * `RollbackFailed` if restoring the backup failed
    pub fn validate(&mut self, validator: &Validator, runner: &dyn CommandRunner) -> Result<()> {
        self.require(&[TransactionState::Open], "validate")?;

        let content = self.content();
        self.fs.write_atomic(&self.target, &content)?;
        self.state = TransactionState::Written;
        debug!(path = %self.target.display(), bytes = content.len(), "Wrote new content");

        let Some(argv) = validator.argv_for(&self.target) else {
            self.state = TransactionState::Committed;
            info!(path = %self.target.display(), "Committed without validator");
            return Ok(());
        };

        let failure = match runner.run_with_timeout(&argv, validator.timeout()) {
            Ok(output) if output.success() => {
                self.state = TransactionState::Validated;
                info!(path = %self.target.display(), validator = %output.command, "Validator accepted new content");
                return Ok(());
            }
            Ok(output) => HardenError::ValidationRejected {
                path: self.target.clone(),
                diagnostics: output.failure_summary(),
            },
            Err(e) => e,
        };

        warn!(path = %self.target.display(), error = %failure, "Validation failed, restoring backup");
        self.restore()?;
        Err(failure)
    }

    /// Mark the transaction committed. Idempotent.
    pub fn commit(&mut self) -> Result<()> {
        self.require(
            &[TransactionState::Validated, TransactionState::Committed],
            "commit",
        )?;
        if self.state != TransactionState::Committed {
            self.state = TransactionState::Committed;
            info!(path = %self.target.display(), "Committed configuration transaction");
        }
        Ok(())
    }

    /// Put the pre-transaction content back.
    ///
    /// Allowed before the write (a no-op on disk) and after validation, so a
    /// step can undo a validated change when a dependent action fails.
    pub fn rollback(&mut self) -> Result<()> {
        match self.state {
            TransactionState::RolledBack => Ok(()),
            TransactionState::Open => {
                self.state = TransactionState::RolledBack;
                Ok(())
            }
            TransactionState::Written | TransactionState::Validated => self.restore(),
            TransactionState::Committed => Err(HardenError::InvalidState {
                path: self.target.clone(),
                state: self.state.to_string(),
                operation: "roll back",
            }),
        }
    }

    fn restore(&mut self) -> Result<()> {
        let result = match &self.original {
            Some(original) => self
                .fs
                .copy(&self.backup, &self.target)
                .or_else(|copy_err| {
                    warn!(
                        path = %self.target.display(),
                        error = %copy_err,
                        "Copying backup failed, writing retained original bytes"
                    );
                    self.fs.write_atomic(&self.target, original)
                })
                .and_then(|()| self.verify_restored()),
            None if self.fs.exists(&self.target) => self.fs.remove(&self.target),
            None => Ok(()),
        };

        match result {
            Ok(()) => {
                self.state = TransactionState::RolledBack;
                info!(path = %self.target.display(), "Restored pre-transaction content");
                Ok(())
            }
            Err(e) => {
                error!(
                    path = %self.target.display(),
                    backup = %self.backup.display(),
                    error = %e,
                    "ROLLBACK FAILED: target may be inconsistent"
                );
                Err(HardenError::RollbackFailed {
                    path: self.target.clone(),
                    backup: self.backup.clone(),
                    cause: e.to_string(),
                })
            }
        }
    }

    fn verify_restored(&self) -> Result<()> {
        let restored = self.fs.read(&self.target)?;
        match &self.original_digest {
            Some(digest) if &sha256_hex(&restored) != digest => Err(HardenError::io(
                &self.target,
                std::io::Error::other("restored content does not match the backup"),
            )),
            _ => Ok(()),
        }
    }

    fn require(&self, allowed: &[TransactionState], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(HardenError::InvalidState {
                path: self.target.clone(),
                state: self.state.to_string(),
                operation,
            })
        }
    }
}
