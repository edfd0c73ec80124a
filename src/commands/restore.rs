use anyhow::{bail, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::fs::{FileSystem, RealFs};
use crate::gate::{InteractionGate, ScriptedGate, TerminalGate};
use crate::transaction::{backup_path, original_path};

/// Put a configuration file back from the copy a run left next to it
/// Usage: rampart restore <file> [--original] [--yes]
pub fn execute(file: PathBuf, original: bool, yes: bool) -> Result<()> {
    let gate: Box<dyn InteractionGate> = if yes {
        Box::new(ScriptedGate::assume_yes())
    } else {
        Box::new(TerminalGate::new())
    };

    match restore(&RealFs, gate.as_ref(), &file, original)? {
        Some(source) => println!(
            "{} Restored {} from {}",
            "✓".green().bold(),
            file.display(),
            source.display()
        ),
        None => println!("Restore cancelled."),
    }
    Ok(())
}

/// Copy the retained backup (or the first-touch original) over `file`.
///
/// Returns the path restored from, or `None` when the operator declined.
pub fn restore(
    fs: &dyn FileSystem,
    gate: &dyn InteractionGate,
    file: &Path,
    original: bool,
) -> Result<Option<PathBuf>> {
    let source = if original {
        original_path(file)
    } else {
        backup_path(file)
    };
    if !fs.exists(&source) {
        bail!("No saved copy of {} at {}", file.display(), source.display());
    }

    if !gate.confirm(&format!(
        "Overwrite {} with {}?",
        file.display(),
        source.display()
    )) {
        return Ok(None);
    }

    let expected = fs.read(&source)?;
    fs.copy(&source, file)?;
    if fs.read(file)? != expected {
        bail!(
            "{} does not match {} after restore; inspect it manually",
            file.display(),
            source.display()
        );
    }

    info!(path = %file.display(), from = %source.display(), "Restored configuration file");
    Ok(Some(source))
}
