use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use grove_config::CompileConfig;
use grove_core::{is_within, normalize_path, FileId};
use grove_vfs::{FileSystem, OpenDocumentTracker};
use walkdir::{DirEntry, WalkDir};

use crate::compiler::{SourceFile, SourceSet};

const SKIPPED_DIRS: &[&str] = &["build", "target", "out", "node_modules"];

/// How the full compilation unit was brought up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitUpdate {
    /// The previous unit was patched in place.
    Reused {
        added: BTreeSet<FileId>,
        removed: BTreeSet<FileId>,
    },
    /// A new unit replaced the previous one (or there was none).
    Rebuilt,
}

/// The full set of project sources compiled on the full path.
#[derive(Debug, Clone, Default)]
pub struct CompilationUnit {
    sources: SourceSet,
}

impl CompilationUnit {
    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn contains(&self, file: FileId) -> bool {
        self.sources.contains(file)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Refreshes the text of files already compiled elsewhere.
    pub(crate) fn refresh(&mut self, source: SourceFile) {
        self.sources.insert(source);
    }

    /// Builds a fresh unit from `admitted`. Unreadable files are skipped.
    pub(crate) fn build<F: FileSystem>(
        admitted: &[(FileId, PathBuf)],
        tracker: &OpenDocumentTracker<F>,
    ) -> Self {
        let sources = admitted
            .iter()
            .filter_map(|(file, path)| read_source(tracker, *file, path))
            .collect();
        Self { sources }
    }

    /// Patches the unit in place: drops files no longer admitted, re-reads `stale` files and
    /// adds newly admitted ones.
    pub(crate) fn patch<F: FileSystem>(
        &mut self,
        admitted: &[(FileId, PathBuf)],
        stale: &BTreeSet<FileId>,
        tracker: &OpenDocumentTracker<F>,
    ) -> UnitUpdate {
        let admitted_ids: BTreeSet<FileId> = admitted.iter().map(|(file, _)| *file).collect();
        let mut added = BTreeSet::new();
        let mut removed = BTreeSet::new();

        let current: Vec<FileId> = self.sources.file_ids().collect();
        for file in current {
            if !admitted_ids.contains(&file) {
                self.sources.remove(file);
                removed.insert(file);
            }
        }

        for (file, path) in admitted {
            let known = self.sources.contains(*file);
            if known && !stale.contains(file) {
                continue;
            }
            match read_source(tracker, *file, path) {
                Some(source) => {
                    self.sources.insert(source);
                    if !known {
                        added.insert(*file);
                    }
                }
                None => {
                    if self.sources.remove(*file).is_some() {
                        removed.insert(*file);
                    }
                }
            }
        }

        UnitUpdate::Reused { added, removed }
    }
}

pub(crate) fn read_source<F: FileSystem>(
    tracker: &OpenDocumentTracker<F>,
    file: FileId,
    path: &Path,
) -> Option<SourceFile> {
    let text = tracker.contents_by_id(file)?;
    Some(SourceFile {
        file,
        path: path.to_path_buf(),
        text,
    })
}

/// Project source files admitted into the full unit, sorted by path.
///
/// At most `max_compile_files` files are taken from disk. When the project is larger, files in
/// the directories of open documents go first. Open documents under the root are always
/// admitted on top of the bound.
pub(crate) fn admit_sources(
    root: &Path,
    excluded_roots: &[PathBuf],
    open_documents: &[PathBuf],
    config: &CompileConfig,
) -> Vec<PathBuf> {
    let owned = |path: &Path| {
        is_within(root, path) && !excluded_roots.iter().any(|nested| is_within(nested, path))
    };

    let mut on_disk: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::debug!(target: "grove.workspace", error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| normalize_path(entry.path()))
        .filter(|path| config.is_source_file(path) && owned(path))
        .collect();

    let open: Vec<PathBuf> = open_documents
        .iter()
        .map(|path| normalize_path(path))
        .filter(|path| config.is_source_file(path) && owned(path))
        .collect();

    if on_disk.len() > config.max_compile_files {
        let total = on_disk.len();
        let open_dirs: BTreeSet<&Path> = open.iter().filter_map(|path| path.parent()).collect();
        // Stable: keeps path order inside each group.
        on_disk.sort_by_key(|path| {
            !path
                .parent()
                .is_some_and(|parent| open_dirs.contains(parent))
        });
        on_disk.truncate(config.max_compile_files);
        tracing::warn!(
            target: "grove.workspace",
            root = %root.display(),
            total,
            admitted = config.max_compile_files,
            "project exceeds max compile files; compiling a prioritized subset"
        );
    }

    let mut admitted: BTreeSet<PathBuf> = on_disk.into_iter().collect();
    admitted.extend(open);
    admitted.into_iter().collect()
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}
