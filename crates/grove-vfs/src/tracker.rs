use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use grove_core::{is_within, normalize_path, FileId, TextEdit};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};

use crate::change::FileChange;
use crate::document::{ContentChange, Document, DocumentError};
use crate::file_id::FileIdRegistry;
use crate::fs::{FileSystem, LocalFs};

/// Attempts at a lock-free edit before falling back to applying it under the entry lock.
const MAX_EDIT_RETRIES: usize = 8;

#[derive(Debug)]
struct OpenEntry {
    /// Text served to readers; while spliced, the spliced text.
    document: Document,
    /// The editor's document while a splice is active. Edits land here.
    editor: Option<Document>,
    revision: u64,
}

impl OpenEntry {
    fn new(document: Document, revision: u64) -> Self {
        Self {
            document,
            editor: None,
            revision,
        }
    }

    fn editor_document(&self) -> &Document {
        self.editor.as_ref().unwrap_or(&self.document)
    }

    fn editor_document_mut(&mut self) -> &mut Document {
        match self.editor {
            Some(ref mut editor) => editor,
            None => &mut self.document,
        }
    }
}

#[derive(Debug, Clone)]
struct ClosedEntry {
    text: Arc<String>,
    cached_at: Instant,
}

/// Authoritative view of source text across open and closed files.
///
/// - Open documents are served from memory, keyed per file so edits to different documents
///   never contend on a shared lock.
/// - Closed files are read from disk and memoized for a short TTL in a bounded LRU.
/// - Every open, edit, close and watcher notification marks the file as changed until a
///   compile consumes it via [`OpenDocumentTracker::clear_changed`].
#[derive(Debug)]
pub struct OpenDocumentTracker<F: FileSystem = LocalFs> {
    fs: F,
    files: RwLock<FileIdRegistry>,
    open: DashMap<FileId, OpenEntry>,
    changed: Mutex<BTreeSet<FileId>>,
    closed: Mutex<LruCache<FileId, ClosedEntry>>,
    closed_ttl: Duration,
    next_revision: AtomicU64,
}

impl Default for OpenDocumentTracker<LocalFs> {
    fn default() -> Self {
        Self::new(LocalFs, Duration::from_secs(5), 256)
    }
}

impl<F: FileSystem> OpenDocumentTracker<F> {
    pub fn new(fs: F, closed_ttl: Duration, closed_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(closed_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            fs,
            files: RwLock::new(FileIdRegistry::new()),
            open: DashMap::new(),
            changed: Mutex::new(BTreeSet::new()),
            closed: Mutex::new(LruCache::new(capacity)),
            closed_ttl,
            next_revision: AtomicU64::new(1),
        }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Returns the stable id for `path`, allocating one if needed.
    pub fn file_id(&self, path: &Path) -> FileId {
        let path = normalize_path(path);
        if let Some(id) = self.files.read().get_id(&path) {
            return id;
        }
        self.files.write().file_id(&path)
    }

    /// Returns the id for `path` without allocating.
    pub fn get_file_id(&self, path: &Path) -> Option<FileId> {
        self.files.read().get_id(&normalize_path(path))
    }

    pub fn path(&self, file: FileId) -> Option<PathBuf> {
        self.files.read().get_path(file).map(Path::to_path_buf)
    }

    pub fn open(&self, path: &Path, text: impl Into<String>, version: i32) -> FileId {
        let file = self.file_id(path);
        let revision = self.bump_revision();
        self.open.insert(
            file,
            OpenEntry::new(Document::new_string(text, version), revision),
        );
        self.closed.lock().pop(&file);
        self.mark_changed(file);
        tracing::debug!(target: "grove.vfs", path = %path.display(), version, "opened document");
        file
    }

    /// Applies LSP changes to an open document and returns the normalized edits.
    ///
    /// New text is computed outside of the map's entry lock and committed with a
    /// compare-and-swap on the document revision; concurrent edits to the same document retry.
    /// During a splice the edits apply to the editor's text, not the spliced one.
    pub fn change(
        &self,
        path: &Path,
        version: i32,
        changes: &[ContentChange],
    ) -> Result<Vec<TextEdit>, DocumentError> {
        let file = self
            .get_file_id(path)
            .filter(|file| self.open.contains_key(file))
            .ok_or_else(|| DocumentError::DocumentNotOpen(path.display().to_string()))?;

        for _ in 0..MAX_EDIT_RETRIES {
            let (mut next, seen) = match self.open.get(&file) {
                Some(entry) => (entry.editor_document().clone(), entry.revision),
                None => return Err(DocumentError::DocumentNotOpen(path.display().to_string())),
            };
            let edits = next.apply_changes(version, changes);

            match self.open.get_mut(&file) {
                Some(mut entry) if entry.revision == seen => {
                    *entry.editor_document_mut() = next;
                    entry.revision = self.bump_revision();
                    drop(entry);
                    self.mark_changed(file);
                    return Ok(edits);
                }
                Some(_) => continue,
                None => return Err(DocumentError::DocumentNotOpen(path.display().to_string())),
            }
        }

        tracing::debug!(
            target: "grove.vfs",
            path = %path.display(),
            "edit contention; applying under entry lock"
        );
        let mut entry = self
            .open
            .get_mut(&file)
            .ok_or_else(|| DocumentError::DocumentNotOpen(path.display().to_string()))?;
        let edits = entry.editor_document_mut().apply_changes(version, changes);
        entry.revision = self.bump_revision();
        drop(entry);
        self.mark_changed(file);
        Ok(edits)
    }

    /// Closes a document, seeding the closed-file cache with its last known text.
    pub fn close(&self, path: &Path) -> Option<FileId> {
        let file = self.get_file_id(path)?;
        let (_, entry) = self.open.remove(&file)?;
        self.closed.lock().put(
            file,
            ClosedEntry {
                text: entry.editor_document().text_arc(),
                cached_at: Instant::now(),
            },
        );
        self.mark_changed(file);
        tracing::debug!(target: "grove.vfs", path = %path.display(), "closed document");
        Some(file)
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.get_file_id(path)
            .is_some_and(|file| self.open.contains_key(&file))
    }

    pub fn version(&self, path: &Path) -> Option<i32> {
        let file = self.get_file_id(path)?;
        self.open
            .get(&file)
            .map(|entry| entry.editor_document().version())
    }

    /// Paths of all currently open documents, sorted.
    pub fn open_paths(&self) -> Vec<PathBuf> {
        let ids: Vec<FileId> = self.open.iter().map(|entry| *entry.key()).collect();
        let files = self.files.read();
        let mut paths: Vec<PathBuf> = ids
            .into_iter()
            .filter_map(|id| files.get_path(id).map(Path::to_path_buf))
            .collect();
        paths.sort();
        paths
    }

    /// Current text for `path`.
    ///
    /// Resolution order: open document, unexpired closed-file cache entry, disk. Successful
    /// disk reads are cached; failures are not and yield `None`.
    pub fn contents(&self, path: &Path) -> Option<Arc<String>> {
        let file = self.file_id(path);
        self.contents_of(file, path)
    }

    pub fn contents_by_id(&self, file: FileId) -> Option<Arc<String>> {
        let path = self.path(file)?;
        self.contents_of(file, &path)
    }

    fn contents_of(&self, file: FileId, path: &Path) -> Option<Arc<String>> {
        if let Some(entry) = self.open.get(&file) {
            return Some(entry.document.text_arc());
        }

        {
            let mut closed = self.closed.lock();
            let cached = closed
                .get(&file)
                .map(|entry| (Arc::clone(&entry.text), entry.cached_at));
            match cached {
                Some((text, cached_at)) if cached_at.elapsed() < self.closed_ttl => {
                    return Some(text);
                }
                Some(_) => {
                    closed.pop(&file);
                }
                None => {}
            }
        }

        match self.fs.read_to_string(path) {
            Ok(text) => {
                let text = Arc::new(text);
                self.closed.lock().put(
                    file,
                    ClosedEntry {
                        text: Arc::clone(&text),
                        cached_at: Instant::now(),
                    },
                );
                Some(text)
            }
            Err(err) => {
                tracing::debug!(
                    target: "grove.vfs",
                    path = %path.display(),
                    error = %err,
                    "failed to read file contents"
                );
                None
            }
        }
    }

    /// Serves `text` to readers of an open document until [`Self::end_splice`], without
    /// touching its version. Edits arriving meanwhile apply to the editor's text.
    ///
    /// Returns the editor's text, or `None` (and does nothing) if the document is not open or
    /// already spliced.
    pub fn begin_splice(&self, path: &Path, text: Arc<String>) -> Option<Arc<String>> {
        let file = self.get_file_id(path)?;
        let mut entry = self.open.get_mut(&file)?;
        if entry.editor.is_some() {
            return None;
        }
        let editor = entry.document.clone();
        let original = editor.text_arc();
        entry.document.set_text(text);
        entry.editor = Some(editor);
        entry.revision = self.bump_revision();
        drop(entry);
        self.mark_changed(file);
        Some(original)
    }

    /// Puts the editor's text back, including any edits made during the splice. Returns
    /// `false` if no splice was active, e.g. because the document was closed or reopened.
    pub fn end_splice(&self, path: &Path) -> bool {
        let Some(file) = self.get_file_id(path) else {
            return false;
        };
        let Some(mut entry) = self.open.get_mut(&file) else {
            return false;
        };
        let Some(editor) = entry.editor.take() else {
            return false;
        };
        entry.document = editor;
        entry.revision = self.bump_revision();
        drop(entry);
        self.mark_changed(file);
        true
    }

    /// Applies a watcher notification: drops any cached closed-file text and marks the file
    /// changed. Open documents keep their in-memory text.
    pub fn apply_file_change(&self, change: &FileChange) -> FileId {
        let file = self.file_id(change.path());
        self.closed.lock().pop(&file);
        self.mark_changed(file);
        tracing::trace!(
            target: "grove.vfs",
            path = %change.path().display(),
            kind = ?change.kind,
            "file change"
        );
        file
    }

    /// Drops any cached closed-file text for `path` without marking it changed.
    pub fn invalidate(&self, path: &Path) {
        if let Some(file) = self.get_file_id(path) {
            self.closed.lock().pop(&file);
        }
    }

    pub fn mark_changed(&self, file: FileId) {
        self.changed.lock().insert(file);
    }

    pub fn changed(&self) -> BTreeSet<FileId> {
        self.changed.lock().clone()
    }

    /// Changed files located under `root`.
    pub fn changed_under(&self, root: &Path) -> BTreeSet<FileId> {
        let changed = self.changed.lock().clone();
        let files = self.files.read();
        changed
            .into_iter()
            .filter(|file| {
                files
                    .get_path(*file)
                    .is_some_and(|path| is_within(root, path))
            })
            .collect()
    }

    /// Removes `files` from the changed set. Files marked after a compile snapshotted the set
    /// are only cleared if they are listed here.
    pub fn clear_changed<'a>(&self, files: impl IntoIterator<Item = &'a FileId>) {
        let mut changed = self.changed.lock();
        for file in files {
            changed.remove(file);
        }
    }

    fn bump_revision(&self) -> u64 {
        self.next_revision.fetch_add(1, Ordering::Relaxed)
    }
}
