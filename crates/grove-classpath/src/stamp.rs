use std::collections::BTreeMap;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Build files whose stamps gate a project's cached classpath when none are configured.
pub const DEFAULT_BUILD_FILE_NAMES: &[&str] = &[
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "settings.gradle.kts",
    "gradle.properties",
    "pom.xml",
];

/// Cheap content proxy for a file: `"<mtime millis>:<size>"`, or `None` if the file cannot be
/// stat'ed.
pub fn file_stamp(path: &Path) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    if !meta.is_file() {
        return None;
    }
    let mtime = meta
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |dur| dur.as_millis());
    Some(format!("{mtime}:{}", meta.len()))
}

/// Stamps of the build files present directly in `project_root`, keyed by
/// `"<root>/<build-file-name>"`.
pub fn project_stamps<S: AsRef<str>>(
    project_root: &Path,
    build_file_names: &[S],
) -> BTreeMap<String, String> {
    build_file_names
        .iter()
        .filter_map(|name| {
            let path = project_root.join(name.as_ref());
            let stamp = file_stamp(&path)?;
            Some((path.to_string_lossy().into_owned(), stamp))
        })
        .collect()
}
