//! The seam to the language's own compiler.
//!
//! The workspace never parses or type-checks anything itself. It hands a [`SourceSet`] plus a
//! [`CompileEnvironment`] to a [`Compiler`] and consumes the per-file ASTs and diagnostics that
//! come back.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use grove_classpath::ClasspathIndex;
use grove_core::{Diagnostic, FileId};
use thiserror::Error;

use crate::ast::FileAst;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub file: FileId,
    pub path: PathBuf,
    pub text: Arc<String>,
}

/// An ordered set of sources handed to one compiler invocation.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    files: BTreeMap<FileId, SourceFile>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a source, returning the previous one.
    pub fn insert(&mut self, source: SourceFile) -> Option<SourceFile> {
        self.files.insert(source.file, source)
    }

    pub fn remove(&mut self, file: FileId) -> Option<SourceFile> {
        self.files.remove(&file)
    }

    pub fn get(&self, file: FileId) -> Option<&SourceFile> {
        self.files.get(&file)
    }

    pub fn contains(&self, file: FileId) -> bool {
        self.files.contains_key(&file)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> + '_ {
        self.files.values()
    }

    pub fn file_ids(&self) -> impl Iterator<Item = FileId> + '_ {
        self.files.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<SourceFile> for SourceSet {
    fn from_iter<I: IntoIterator<Item = SourceFile>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().map(|source| (source.file, source)).collect(),
        }
    }
}

/// Everything a compile can resolve against besides the sources themselves.
#[derive(Debug, Clone, Default)]
pub struct CompileEnvironment {
    pub classpath: Arc<ClasspathIndex>,
    /// Classes declared by project files that are not part of the current source set.
    pub project_classes: BTreeSet<String>,
    pub runtime_version: Option<String>,
}

impl CompileEnvironment {
    pub fn new(classpath: Arc<ClasspathIndex>) -> Self {
        Self {
            classpath,
            project_classes: BTreeSet::new(),
            runtime_version: None,
        }
    }

    pub fn with_project_classes(mut self, classes: BTreeSet<String>) -> Self {
        self.project_classes = classes;
        self
    }

    /// Returns `true` if `name` (binary or simple) resolves outside the source set.
    pub fn knows_class(&self, name: &str) -> bool {
        self.project_classes.contains(name)
            || self.classpath.contains(name)
            || self.classpath.contains_simple_name(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
    /// ASTs for the files that parsed. Files missing here keep their previous AST.
    pub asts: BTreeMap<FileId, FileAst>,
    pub diagnostics: BTreeMap<FileId, Vec<Diagnostic>>,
}

#[derive(Debug, Error)]
pub enum CompileError {
    /// The sources themselves are broken. These are reported as diagnostics, never as failures.
    #[error("compilation failed with source errors in {} file(s)", .0.len())]
    Source(BTreeMap<FileId, Vec<Diagnostic>>),
    /// The compiler itself failed.
    #[error("internal compiler failure: {0}")]
    Internal(String),
}

pub trait Compiler: Send + Sync {
    fn compile(
        &self,
        sources: &SourceSet,
        env: &CompileEnvironment,
    ) -> Result<CompileOutput, CompileError>;
}

impl<T: Compiler + ?Sized> Compiler for Arc<T> {
    fn compile(
        &self,
        sources: &SourceSet,
        env: &CompileEnvironment,
    ) -> Result<CompileOutput, CompileError> {
        (**self).compile(sources, env)
    }
}
