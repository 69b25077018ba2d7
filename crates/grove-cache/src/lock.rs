use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard, OnceLock};

use fs2::FileExt as _;

use crate::error::CacheError;

/// Exclusive hold on a cache lockfile, shared by every Grove process and thread using the same
/// cache directory. Released on drop.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Blocks until `path` is held by nobody else, creating the lockfile and its directory if
    /// missing.
    pub fn lock_exclusive(path: &Path) -> Result<Self, CacheError> {
        // Advisory file locks are per process on Unix, so threads queue in `HeldPaths` first.
        held_paths().claim(path);
        match open_and_lock(path) {
            Ok(file) => Ok(Self {
                file,
                path: path.to_path_buf(),
            }),
            Err(err) => {
                held_paths().release(path);
                Err(err.into())
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::debug!(
                target: "grove.cache",
                path = %self.path.display(),
                error = %err,
                "cache lockfile unlock failed"
            );
        }
        held_paths().release(&self.path);
    }
}

fn open_and_lock(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(file)
}

/// Lockfile paths currently held by a thread of this process.
#[derive(Default)]
struct HeldPaths {
    paths: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

impl HeldPaths {
    fn claim(&self, path: &Path) {
        let mut paths = self.guard();
        while paths.contains(path) {
            paths = self
                .released
                .wait(paths)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        paths.insert(path.to_path_buf());
    }

    fn release(&self, path: &Path) {
        self.guard().remove(path);
        self.released.notify_all();
    }

    fn guard(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.paths
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn held_paths() -> &'static HeldPaths {
    static HELD: OnceLock<HeldPaths> = OnceLock::new();
    HELD.get_or_init(HeldPaths::default)
}
