//! Lock file operations for single-instance enforcement.
//!
//! The lock is an `fs2` exclusive lock on `sunsetter.lock` in the runtime
//! directory. It is held for the lifetime of the daemon and released (and the
//! file removed) when the [`LockFile`] is dropped.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::utils::{private_path, runtime_dir};

pub const LOCK_FILE_NAME: &str = "sunsetter.lock";

/// Path of the main instance lock.
pub fn get_main_lock_path() -> PathBuf {
    runtime_dir().join(LOCK_FILE_NAME)
}

/// An acquired exclusive lock.
#[derive(Debug)]
pub struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    /// Try to take the lock without blocking. `Ok(None)` when someone else holds it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", private_path(parent)))?;
        }

        // No truncation: the current holder's contents must survive a failed attempt
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", private_path(path)))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(LockFile {
                file,
                path: path.to_path_buf(),
            })),
            Err(_) => Ok(None),
        }
    }

    /// Replace the lock file contents.
    pub fn write(&mut self, contents: &str) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(contents.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = FileExt::unlock(&self.file);
    }
}
