use std::path::Path;

use crate::entry::ClasspathEntry;
use crate::error::ClasspathError;

/// Result of resolving a project's classpath through its build tool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedClasspath {
    pub entries: Vec<ClasspathEntry>,
    /// Language runtime version detected on the classpath, if any.
    pub runtime_version: Option<String>,
}

impl ResolvedClasspath {
    pub fn new(entries: Vec<ClasspathEntry>) -> Self {
        Self {
            entries,
            runtime_version: None,
        }
    }

    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = Some(version.into());
        self
    }
}

/// Build-tool integration that discovers a project's dependency artifacts.
///
/// Implementations are slow (they typically spawn Gradle or Maven) and are only consulted when
/// the cache has no valid entry for the project.
pub trait ClasspathResolver: Send + Sync {
    fn resolve(&self, project_root: &Path) -> Result<ResolvedClasspath, ClasspathError>;
}
