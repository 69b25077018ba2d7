use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use grove_classpath::{ClasspathEntry, ClasspathError, ClasspathResolver, ResolvedClasspath};
use grove_core::normalize_path;

/// Scripted classpath resolution. Projects without a script get the default classpath, which
/// starts out empty.
#[derive(Debug, Default)]
pub struct FakeResolver {
    scripted: Mutex<BTreeMap<PathBuf, Result<ResolvedClasspath, String>>>,
    default: Mutex<ResolvedClasspath>,
    calls: Mutex<Vec<PathBuf>>,
    resolves: AtomicUsize,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, project: &Path, resolved: ResolvedClasspath) {
        lock(&self.scripted).insert(normalize_path(project), Ok(resolved));
    }

    /// Scripts `project` to resolve to `entries` (directories or `.jar` files).
    pub fn set_entries(&self, project: &Path, entries: &[PathBuf]) {
        let entries = entries.iter().map(ClasspathEntry::from_path).collect();
        self.set(project, ResolvedClasspath::new(entries));
    }

    /// Classpath for every project without its own script.
    pub fn set_default_entries(&self, entries: &[PathBuf]) {
        *lock(&self.default) =
            ResolvedClasspath::new(entries.iter().map(ClasspathEntry::from_path).collect());
    }

    pub fn fail(&self, project: &Path, message: impl Into<String>) {
        lock(&self.scripted).insert(normalize_path(project), Err(message.into()));
    }

    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    /// Projects resolved so far, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        lock(&self.calls).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ClasspathResolver for FakeResolver {
    fn resolve(&self, project_root: &Path) -> Result<ResolvedClasspath, ClasspathError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let project = normalize_path(project_root);
        lock(&self.calls).push(project.clone());

        match lock(&self.scripted).get(&project).cloned() {
            Some(Ok(resolved)) => Ok(resolved),
            Some(Err(message)) => Err(ClasspathError::Resolve { project, message }),
            None => Ok(lock(&self.default).clone()),
        }
    }
}
