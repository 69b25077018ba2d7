use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::path::Path;

use crate::entry::ClasspathEntry;
use crate::error::ClasspathError;

/// Where a class lives on the classpath.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassLocation {
    /// Index into [`ClasspathIndex::entries`].
    pub entry: usize,
    /// `/`-separated path of the class file inside the entry.
    pub path: String,
}

/// Binary class name -> location, built once per distinct classpath and shared between scopes.
///
/// When a class appears in several entries the first one on the classpath wins, matching JVM
/// class loading order.
#[derive(Clone, Debug, Default)]
pub struct ClasspathIndex {
    entries: Vec<ClasspathEntry>,
    classes: BTreeMap<String, ClassLocation>,
    simple_names: BTreeSet<String>,
}

impl ClasspathIndex {
    /// Indexes every readable entry. Unreadable entries are logged and skipped so one corrupt
    /// JAR never hides the rest of the classpath.
    pub fn build(entries: &[ClasspathEntry]) -> Self {
        let mut classes = BTreeMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            let files = match list_class_files(entry) {
                Ok(files) => files,
                Err(err) => {
                    tracing::warn!(
                        target: "grove.classpath",
                        entry = %entry.path().display(),
                        error = %err,
                        "failed to index classpath entry"
                    );
                    continue;
                }
            };
            for path in files {
                let Some(name) = binary_name(&path) else {
                    continue;
                };
                classes
                    .entry(name)
                    .or_insert(ClassLocation { entry: idx, path });
            }
        }

        let simple_names = classes.keys().map(|name| simple_name(name).to_owned()).collect();

        tracing::debug!(
            target: "grove.classpath",
            entries = entries.len(),
            classes = classes.len(),
            "built classpath index"
        );
        Self {
            entries: entries.to_vec(),
            classes,
            simple_names,
        }
    }

    pub fn entries(&self) -> &[ClasspathEntry] {
        &self.entries
    }

    pub fn lookup(&self, binary_name: &str) -> Option<&ClassLocation> {
        self.classes.get(binary_name)
    }

    pub fn contains(&self, binary_name: &str) -> bool {
        self.classes.contains_key(binary_name)
    }

    /// Whether any class has `name` as its simple name (`Closure` for `groovy.lang.Closure`).
    pub fn contains_simple_name(&self, name: &str) -> bool {
        self.simple_names.contains(name)
    }

    /// Binary names in sorted order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.classes.keys().map(String::as_str)
    }

    pub fn class_names_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.classes
            .range(prefix.to_owned()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

fn list_class_files(entry: &ClasspathEntry) -> Result<Vec<String>, ClasspathError> {
    match entry {
        ClasspathEntry::ClassDir(dir) => list_class_dir(dir),
        ClasspathEntry::Jar(path) => list_jar(path),
    }
}

fn list_class_dir(dir: &Path) -> Result<Vec<String>, ClasspathError> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "class directory does not exist",
        )
        .into());
    }

    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension() != Some(OsStr::new("class")) {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let rel: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        out.push(rel.join("/"));
    }
    Ok(out)
}

fn list_jar(path: &Path) -> Result<Vec<String>, ClasspathError> {
    let file = std::fs::File::open(path)?;
    let archive = zip::ZipArchive::new(file)?;
    Ok(archive
        .file_names()
        .filter(|name| name.ends_with(".class"))
        // Multi-release overlays shadow base classes; index the base layer only.
        .filter(|name| !name.starts_with("META-INF/"))
        .map(str::to_owned)
        .collect())
}

fn simple_name(binary_name: &str) -> &str {
    let name = binary_name.rsplit('.').next().unwrap_or(binary_name);
    name.rsplit('$').next().unwrap_or(name)
}

/// `com/example/Foo$Bar.class` -> `com.example.Foo$Bar`.
fn binary_name(class_file: &str) -> Option<String> {
    let stem = class_file.strip_suffix(".class")?;
    let simple = stem.rsplit('/').next().unwrap_or(stem);
    if simple == "module-info" || simple == "package-info" {
        return None;
    }
    Some(stem.replace('/', "."))
}
