//! Crash-safe file replacement on the real filesystem
//!
//! Writes go to a temporary file in the target's own directory, are flushed
//! to disk, take over the target's permission bits and ownership, and are
//! then renamed over the target. `rename(2)` within one filesystem is atomic,
//! so a crash at any point leaves either the old or the new file in place.

use nix::unistd::{chown, Gid, Uid};
use std::fs::{self, File, Metadata, Permissions};
use std::io::Write;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;
use tracing::{debug, warn};

use super::FileSystem;
use crate::error::{HardenError, Result};

/// Mode given to files that did not exist before
const NEW_FILE_MODE: u32 = 0o644;

#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    fn persist(&self, path: &Path, contents: &[u8], template: Option<&Metadata>) -> Result<()> {
        let dir = parent_dir(path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{file_name}.rampart-"))
            .tempfile_in(dir)
            .map_err(|e| HardenError::io(dir, e))?;

        tmp.write_all(contents)
            .map_err(|e| HardenError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| HardenError::io(tmp.path(), e))?;

        match template {
            Some(meta) => {
                tmp.as_file()
                    .set_permissions(meta.permissions())
                    .map_err(|e| HardenError::io(tmp.path(), e))?;
                let current = tmp
                    .as_file()
                    .metadata()
                    .map_err(|e| HardenError::io(tmp.path(), e))?;
                if current.uid() != meta.uid() || current.gid() != meta.gid() {
                    chown(
                        tmp.path(),
                        Some(Uid::from_raw(meta.uid())),
                        Some(Gid::from_raw(meta.gid())),
                    )
                    .map_err(|e| HardenError::io(tmp.path(), e.into()))?;
                }
            }
            None => {
                tmp.as_file()
                    .set_permissions(Permissions::from_mode(NEW_FILE_MODE))
                    .map_err(|e| HardenError::io(tmp.path(), e))?;
            }
        }

        tmp.persist(path)
            .map_err(|e| HardenError::io(path, e.error))?;

        // The rename is done; a failed directory sync only weakens durability
        if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
            warn!(dir = %dir.display(), error = %e, "Failed to sync directory after rename");
        }

        debug!(path = %path.display(), bytes = contents.len(), "Replaced file atomically");
        Ok(())
    }
}

impl FileSystem for RealFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| HardenError::io(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let existing = fs::metadata(path).ok();
        self.persist(path, contents, existing.as_ref())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        let meta = fs::metadata(from).map_err(|e| HardenError::io(from, e))?;
        let contents = self.read(from)?;
        self.persist(to, &contents, Some(&meta))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| HardenError::io(path, e))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| HardenError::io(path, e))
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        fs::set_permissions(path, Permissions::from_mode(mode))
            .map_err(|e| HardenError::io(path, e))
    }

    fn set_owner(&self, path: &Path, uid: u32, gid: u32) -> Result<()> {
        chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
            .map_err(|e| HardenError::io(path, e.into()))
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
