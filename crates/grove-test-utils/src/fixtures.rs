use std::fs;
use std::path::{Path, PathBuf};

use grove_config::GroveConfig;
use grove_core::{normalize_path, LineIndex, Position, TextSize};
use tempfile::TempDir;

/// Cursor marker understood by [`extract_caret`].
pub const CARET: &str = "/*caret*/";

/// Removes the `/*caret*/` marker from `fixture` and returns the text plus the marker's
/// position.
pub fn extract_caret(fixture: &str) -> (String, Position) {
    let offset = fixture.find(CARET).expect("fixture missing /*caret*/ marker");
    let mut text = String::with_capacity(fixture.len());
    text.push_str(&fixture[..offset]);
    text.push_str(&fixture[offset + CARET.len()..]);

    let offset = TextSize::from(u32::try_from(offset).expect("fixture too large"));
    let position = LineIndex::new(&text).position(&text, offset);
    (text, position)
}

/// A config suited to tests: classpath cache under `cache_dir`, a single worker thread.
pub fn test_config(cache_dir: &Path) -> GroveConfig {
    let mut config = GroveConfig::default();
    config.classpath.cache_dir = Some(cache_dir.to_path_buf());
    config.compile.worker_threads = 1;
    config
}

/// A temporary on-disk workspace.
#[derive(Debug)]
pub struct TestProject {
    _dir: TempDir,
    root: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = normalize_path(dir.path());
        Self { _dir: dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Writes `text` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, text: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dirs");
        }
        fs::write(&path, text).expect("write fixture file");
        path
    }

    /// Writes several files at once.
    pub fn write_all(&self, files: &[(&str, &str)]) -> Vec<PathBuf> {
        files.iter().map(|(rel, text)| self.write(rel, text)).collect()
    }

    /// Grows `rel` by one byte so its size stamp changes even on coarse-mtime file systems.
    pub fn touch(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        let mut text = fs::read_to_string(&path).unwrap_or_default();
        text.push('\n');
        fs::write(&path, text).expect("touch fixture file");
        path
    }

    pub fn remove(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        fs::remove_file(&path).expect("remove fixture file");
        path
    }

    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(&path).expect("create fixture dir");
        path
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
