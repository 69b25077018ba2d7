use std::collections::HashMap;
use std::path::{Path, PathBuf};

use grove_core::FileId;

/// Allocates stable `FileId`s for paths and supports reverse lookup.
///
/// Callers are expected to pass normalized paths; the registry compares them verbatim.
#[derive(Debug, Default)]
pub struct FileIdRegistry {
    path_to_id: HashMap<PathBuf, FileId>,
    id_to_path: Vec<PathBuf>,
}

impl FileIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stable id for `path`, allocating a new one if necessary.
    pub fn file_id(&mut self, path: &Path) -> FileId {
        if let Some(&id) = self.path_to_id.get(path) {
            return id;
        }

        let id = FileId::from_raw(self.id_to_path.len() as u32);
        self.id_to_path.push(path.to_path_buf());
        self.path_to_id.insert(path.to_path_buf(), id);
        id
    }

    pub fn get_id(&self, path: &Path) -> Option<FileId> {
        self.path_to_id.get(path).copied()
    }

    pub fn get_path(&self, id: FileId) -> Option<&Path> {
        self.id_to_path
            .get(id.to_raw() as usize)
            .map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.id_to_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_path.is_empty()
    }
}
