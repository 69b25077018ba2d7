use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entry::ClasspathEntry;
use crate::resolver::ResolvedClasspath;

/// Schema version of the on-disk record. Any other version is treated as an absent cache.
pub const CLASSPATH_CACHE_VERSION: u32 = 1;

/// On-disk classpath cache for one workspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClasspathRecord {
    pub version: u32,
    /// Keyed by normalized project root.
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectRecord>,
    #[serde(default)]
    pub discovered_projects: Vec<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// `"<root>/<build-file-name>"` -> `"<mtime>:<size>"`
    pub stamps: BTreeMap<String, String>,
    pub classpath: Vec<ClasspathEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
}

impl Default for ClasspathRecord {
    fn default() -> Self {
        Self {
            version: CLASSPATH_CACHE_VERSION,
            projects: BTreeMap::new(),
            discovered_projects: Vec::new(),
        }
    }
}

impl ClasspathRecord {
    pub(crate) fn key(project_root: &Path) -> String {
        project_root.to_string_lossy().into_owned()
    }

    /// The entry for an already-normalized project root.
    pub fn project(&self, project_root: &Path) -> Option<&ProjectRecord> {
        self.projects.get(&Self::key(project_root))
    }
}

impl ProjectRecord {
    pub fn resolved(&self) -> ResolvedClasspath {
        ResolvedClasspath {
            entries: self.classpath.clone(),
            runtime_version: self.runtime_version.clone(),
        }
    }
}
