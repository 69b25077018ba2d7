use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use grove_core::normalize_path;
use walkdir::DirEntry;

/// Directory names never searched for nested projects.
const SKIPPED_DIRS: &[&str] = &["build", "target", "out", "node_modules"];

/// Finds every directory under `workspace_root` (inclusive) that contains one of
/// `build_file_names`. Hidden directories and build output directories are not descended into.
///
/// Returned roots are normalized and sorted.
pub fn discover_projects<S: AsRef<str>>(
    workspace_root: &Path,
    build_file_names: &[S],
) -> Vec<PathBuf> {
    let mut projects = Vec::new();
    let walker = walkdir::WalkDir::new(workspace_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(
                    target: "grove.classpath",
                    error = %err,
                    "skipping unreadable directory during project discovery"
                );
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        if build_file_names
            .iter()
            .any(|name| dir.join(name.as_ref()).is_file())
        {
            projects.push(normalize_path(dir));
        }
    }

    projects.sort();
    projects.dedup();
    tracing::debug!(
        target: "grove.classpath",
        root = %workspace_root.display(),
        projects = projects.len(),
        "discovered projects"
    );
    projects
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name();
    name.to_str().is_some_and(|name| name.starts_with('.'))
        || SKIPPED_DIRS.iter().any(|skip| name == OsStr::new(skip))
}
