//! Filesystem that reads the real host but keeps mutations in memory
//!
//! Writes land in an in-process overlay so later reads within the same run
//! observe them, which lets a dry run walk the full transaction protocol
//! (backup, verify, write, restore) without changing anything on disk.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{FileSystem, RealFs};
use crate::error::{HardenError, Result};

#[derive(Debug, Default)]
pub struct DryRunFs {
    /// `None` marks a path removed during the run
    overlay: RefCell<HashMap<PathBuf, Option<Vec<u8>>>>,
}

impl DryRunFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths that would have been written or removed, sorted
    pub fn touched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.overlay.borrow().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl FileSystem for DryRunFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        match self.overlay.borrow().get(path) {
            Some(Some(contents)) => Ok(contents.clone()),
            Some(None) => Err(HardenError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "removed during dry run"),
            )),
            None => RealFs.read(path),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        match self.overlay.borrow().get(path) {
            Some(entry) => entry.is_some(),
            None => RealFs.exists(path),
        }
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        info!(path = %path.display(), bytes = contents.len(), "dry run: not writing");
        self.overlay
            .borrow_mut()
            .insert(path.to_path_buf(), Some(contents.to_vec()));
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        let contents = self.read(from)?;
        info!(from = %from.display(), to = %to.display(), "dry run: not copying");
        self.overlay
            .borrow_mut()
            .insert(to.to_path_buf(), Some(contents));
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "dry run: not removing");
        self.overlay.borrow_mut().insert(path.to_path_buf(), None);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "dry run: not creating directory");
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        info!(path = %path.display(), mode = %format!("{mode:o}"), "dry run: not changing mode");
        Ok(())
    }

    fn set_owner(&self, path: &Path, uid: u32, gid: u32) -> Result<()> {
        info!(path = %path.display(), uid, gid, "dry run: not changing owner");
        Ok(())
    }
}
