//! Filesystem boundary
//!
//! Steps and transactions never touch `std::fs` directly; they go through
//! [`FileSystem`] so tests can observe every mutation and dry runs can
//! suppress them. Every failure carries the path it concerns.

mod atomic;
mod dry_run;

use std::path::Path;

use crate::error::Result;

pub use atomic::RealFs;
pub use dry_run::DryRunFs;

pub trait FileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    fn exists(&self, path: &Path) -> bool;

    /// Replace `path` with `contents` so that readers observe either the old
    /// or the new content, never a mix. Existing permissions and ownership are
    /// kept; new files get mode 0644.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Copy `from` over `to` with the same atomic replace semantics, carrying
    /// over the permission bits of `from`.
    fn copy(&self, from: &Path, to: &Path) -> Result<()>;

    fn remove(&self, path: &Path) -> Result<()>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()>;

    fn set_owner(&self, path: &Path, uid: u32, gid: u32) -> Result<()>;
}

/// Read a file as UTF-8 text.
pub fn read_to_string(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let bytes = fs.read(path)?;
    String::from_utf8(bytes).map_err(|_| crate::HardenError::format(path, "file is not valid UTF-8"))
}
