use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CacheError;

static NEXT_STAGING_ID: AtomicU64 = AtomicU64::new(0);

/// Replaces the contents of `path` with `bytes`.
///
/// Bytes are staged in a sibling file and renamed into place, so a reader (or a crash) observes
/// either the previous record or the new one, never a prefix.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let dir = match path.parent() {
        Some(dir) if dir.as_os_str().is_empty() => Path::new("."),
        Some(dir) => dir,
        None => return Err(io::Error::other("cache record path has no parent").into()),
    };
    fs::create_dir_all(dir)?;

    let staged = Staged::create(path, dir)?;
    staged.fill(bytes)?;
    staged.commit(path)?;
    flush_dir(dir);
    Ok(())
}

/// Sibling temp file that deletes itself unless committed.
struct Staged {
    path: PathBuf,
    file: Option<File>,
}

impl Staged {
    fn create(dest: &Path, dir: &Path) -> io::Result<Self> {
        let Some(name) = dest.file_name() else {
            return Err(io::Error::other("cache record path has no file name"));
        };
        loop {
            let id = NEXT_STAGING_ID.fetch_add(1, Ordering::Relaxed);
            let mut staged_name = name.to_os_string();
            staged_name.push(format!(".{}-{id}.staged", std::process::id()));
            let path = dir.join(staged_name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    return Ok(Self {
                        path,
                        file: Some(file),
                    })
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(err),
            }
        }
    }

    fn fill(&self, bytes: &[u8]) -> io::Result<()> {
        let Some(mut file) = self.file.as_ref() else {
            return Err(io::Error::other("staged file already closed"));
        };
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn commit(mut self, dest: &Path) -> io::Result<()> {
        // Close before renaming; Windows refuses to move an open file.
        self.file = None;
        rename_over(&self.path, dest)?;
        self.path = PathBuf::new();
        Ok(())
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        self.file = None;
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => tracing::debug!(
                target: "grove.cache",
                path = %self.path.display(),
                error = %err,
                "could not clean up staged cache file"
            ),
        }
    }
}

#[cfg(not(windows))]
fn rename_over(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

#[cfg(windows)]
fn rename_over(from: &Path, to: &Path) -> io::Result<()> {
    // `rename` refuses an existing target here; another writer may recreate it between the
    // removal and the retry.
    let mut last_err = None;
    for _ in 0..64 {
        match fs::rename(from, to) {
            Ok(()) => return Ok(()),
            Err(err) => {
                match fs::remove_file(to) {
                    Ok(()) => {}
                    Err(remove) if remove.kind() == io::ErrorKind::NotFound => {}
                    Err(remove) => return Err(remove),
                }
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::other("rename did not complete")))
}

fn flush_dir(dir: &Path) {
    #[cfg(unix)]
    if let Err(err) = File::open(dir).and_then(|handle| handle.sync_all()) {
        tracing::trace!(target: "grove.cache", dir = %dir.display(), error = %err, "directory sync failed");
    }
    #[cfg(not(unix))]
    let _ = dir;
}
