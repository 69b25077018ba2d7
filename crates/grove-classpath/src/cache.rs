use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use grove_cache::{atomic_write, CacheError, CacheLock, Fingerprint};
use grove_core::normalize_path;
use rand::seq::SliceRandom;

use crate::error::ClasspathError;
use crate::record::{ClasspathRecord, ProjectRecord, CLASSPATH_CACHE_VERSION};
use crate::resolver::ResolvedClasspath;
use crate::stamp::{project_stamps, DEFAULT_BUILD_FILE_NAMES};

/// Classpath entries spot-checked for existence when validating a project entry.
pub const DEFAULT_SAMPLE_SIZE: usize = 3;

/// Hex characters of the workspace fingerprint used in the cache file name.
const FILE_HASH_PREFIX_LEN: usize = 16;

/// Persistent per-workspace classpath cache.
///
/// One JSON file per workspace lives under the cache directory, named after a hash of the
/// normalized workspace root. All writes replace the file atomically.
#[derive(Clone, Debug)]
pub struct ClasspathCache {
    dir: PathBuf,
    sample_size: usize,
    build_file_names: Vec<String>,
}

impl ClasspathCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            build_file_names: DEFAULT_BUILD_FILE_NAMES
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
        }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_build_file_names(mut self, names: Vec<String>) -> Self {
        self.build_file_names = names;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn build_file_names(&self) -> &[String] {
        &self.build_file_names
    }

    pub fn is_build_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.build_file_names.iter().any(|known| known == name))
    }

    /// Path of the cache file for `workspace_root`.
    pub fn record_path(&self, workspace_root: &Path) -> PathBuf {
        let hash = Fingerprint::for_path(&normalize_path(workspace_root));
        self.dir.join(format!(
            "classpath-{}.json",
            hash.prefix(FILE_HASH_PREFIX_LEN)
        ))
    }

    fn lock_path(&self, workspace_root: &Path) -> PathBuf {
        let mut path = self.record_path(workspace_root).into_os_string();
        path.push(".lock");
        PathBuf::from(path)
    }

    /// Loads the record for `workspace_root`.
    ///
    /// Missing, unreadable, corrupt and version-mismatched files all yield `None`.
    pub fn load(&self, workspace_root: &Path) -> Option<ClasspathRecord> {
        let path = self.record_path(workspace_root);
        match self.read_record(&path) {
            Ok(record) => record,
            Err(err) => {
                tracing::debug!(
                    target: "grove.classpath",
                    path = %path.display(),
                    error = %err,
                    "ignoring unusable classpath cache"
                );
                None
            }
        }
    }

    fn read_record(&self, path: &Path) -> Result<Option<ClasspathRecord>, CacheError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        // Check the version before decoding the rest so a future schema never half-parses.
        #[derive(serde::Deserialize)]
        struct VersionOnly {
            version: u32,
        }
        let VersionOnly { version } = serde_json::from_slice(&bytes)?;
        if version != CLASSPATH_CACHE_VERSION {
            return Err(CacheError::IncompatibleSchemaVersion {
                expected: CLASSPATH_CACHE_VERSION,
                found: version,
            });
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Whether `record` holds a trustworthy classpath for `project_root`.
    ///
    /// Valid iff the stored build-file stamps equal freshly computed ones (no file changed,
    /// appeared or disappeared) and a random sample of the classpath entries still exists.
    pub fn is_valid_for_project(&self, record: &ClasspathRecord, project_root: &Path) -> bool {
        let project_root = normalize_path(project_root);
        let Some(project) = record.project(&project_root) else {
            return false;
        };

        let current = project_stamps(&project_root, self.build_file_names.as_slice());
        if current != project.stamps {
            tracing::debug!(
                target: "grove.classpath",
                project = %project_root.display(),
                "build files changed; classpath cache stale"
            );
            return false;
        }

        let mut rng = rand::thread_rng();
        let missing = project
            .classpath
            .choose_multiple(&mut rng, self.sample_size)
            .find(|entry| !entry.exists());
        if let Some(entry) = missing {
            tracing::debug!(
                target: "grove.classpath",
                project = %project_root.display(),
                entry = %entry.path().display(),
                "classpath entry missing; classpath cache stale"
            );
            return false;
        }
        true
    }

    /// Overwrites the record for `workspace_root` with the given projects, under the same file
    /// lock as [`Self::merge_project`].
    pub fn save(
        &self,
        workspace_root: &Path,
        classpaths: &BTreeMap<PathBuf, ResolvedClasspath>,
        discovered_projects: &[PathBuf],
    ) -> Result<(), ClasspathError> {
        let mut record = ClasspathRecord {
            discovered_projects: normalize_all(discovered_projects),
            ..ClasspathRecord::default()
        };
        for (root, resolved) in classpaths {
            let root = normalize_path(root);
            record
                .projects
                .insert(ClasspathRecord::key(&root), self.project_record(&root, resolved));
        }
        let _lock = CacheLock::lock_exclusive(&self.lock_path(workspace_root))?;
        self.write_record(workspace_root, &record)
    }

    /// Updates one project's entry, leaving every other project untouched.
    ///
    /// The read-modify-write runs under a file lock next to the cache file so concurrent
    /// writers (other threads or other server processes) never lose each other's entries.
    /// `discovered_projects` replaces the stored list when given.
    pub fn merge_project(
        &self,
        workspace_root: &Path,
        project_root: &Path,
        resolved: &ResolvedClasspath,
        discovered_projects: Option<&[PathBuf]>,
    ) -> Result<(), ClasspathError> {
        let _lock = CacheLock::lock_exclusive(&self.lock_path(workspace_root))?;

        let mut record = self.load(workspace_root).unwrap_or_default();
        let project_root = normalize_path(project_root);
        record.projects.insert(
            ClasspathRecord::key(&project_root),
            self.project_record(&project_root, resolved),
        );
        if let Some(discovered) = discovered_projects {
            record.discovered_projects = normalize_all(discovered);
        }
        self.write_record(workspace_root, &record)?;

        tracing::debug!(
            target: "grove.classpath",
            project = %project_root.display(),
            entries = resolved.entries.len(),
            "merged project classpath into cache"
        );
        Ok(())
    }

    /// Deletes the record for `workspace_root`. A missing file is not an error.
    pub fn invalidate(&self, workspace_root: &Path) -> Result<(), ClasspathError> {
        let _lock = CacheLock::lock_exclusive(&self.lock_path(workspace_root))?;
        let path = self.record_path(workspace_root);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(
                    target: "grove.classpath",
                    path = %path.display(),
                    "invalidated classpath cache"
                );
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// The stored project roots, if every one of them still has a valid entry.
    pub fn discovered_projects_if_fresh(&self, workspace_root: &Path) -> Option<Vec<PathBuf>> {
        let record = self.load(workspace_root)?;
        if record.discovered_projects.is_empty() {
            return None;
        }
        record
            .discovered_projects
            .iter()
            .all(|root| self.is_valid_for_project(&record, root))
            .then(|| record.discovered_projects.clone())
    }

    fn project_record(&self, project_root: &Path, resolved: &ResolvedClasspath) -> ProjectRecord {
        ProjectRecord {
            stamps: project_stamps(project_root, self.build_file_names.as_slice()),
            classpath: resolved.entries.clone(),
            runtime_version: resolved.runtime_version.clone(),
        }
    }

    fn write_record(
        &self,
        workspace_root: &Path,
        record: &ClasspathRecord,
    ) -> Result<(), ClasspathError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        atomic_write(&self.record_path(workspace_root), &bytes)?;
        Ok(())
    }
}

fn normalize_all(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = paths.iter().map(|p| normalize_path(p)).collect();
    out.sort();
    out.dedup();
    out
}
