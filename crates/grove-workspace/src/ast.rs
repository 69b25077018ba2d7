use std::collections::{BTreeMap, BTreeSet, HashMap};

use grove_core::{FileId, Position, Range};

use crate::signature::ClassSignature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Class,
    Method,
    Field,
    Reference,
}

/// A named node in a file's syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstSymbol {
    pub name: String,
    pub range: Range,
    pub kind: SymbolKind,
}

/// Compiler output for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAst {
    /// Classes declared in the file.
    pub classes: Vec<ClassSignature>,
    /// Class names the file's compiled output refers to.
    pub references: BTreeSet<String>,
    pub symbols: Vec<AstSymbol>,
}

/// Per-file ASTs plus a class-name -> declaring-file map.
#[derive(Debug, Clone, Default)]
pub struct AstIndex {
    files: HashMap<FileId, FileAst>,
    declarations: HashMap<String, FileId>,
}

impl AstIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the AST of `file`.
    pub fn insert(&mut self, file: FileId, ast: FileAst) {
        self.remove(file);
        for class in &ast.classes {
            self.declarations.insert(class.name.clone(), file);
        }
        self.files.insert(file, ast);
    }

    pub fn remove(&mut self, file: FileId) -> Option<FileAst> {
        let ast = self.files.remove(&file)?;
        for class in &ast.classes {
            if self.declarations.get(&class.name) == Some(&file) {
                self.declarations.remove(&class.name);
            }
        }
        Some(ast)
    }

    pub fn get(&self, file: FileId) -> Option<&FileAst> {
        self.files.get(&file)
    }

    pub fn contains(&self, file: FileId) -> bool {
        self.files.contains_key(&file)
    }

    pub fn files(&self) -> impl Iterator<Item = FileId> + '_ {
        self.files.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn declaring_file(&self, class_name: &str) -> Option<FileId> {
        self.declarations.get(class_name).copied()
    }

    pub fn classes_in(&self, file: FileId) -> &[ClassSignature] {
        self.files
            .get(&file)
            .map_or(&[], |ast| ast.classes.as_slice())
    }

    /// Names of every class declared anywhere in the index.
    pub fn class_names(&self) -> BTreeSet<String> {
        self.declarations.keys().cloned().collect()
    }

    /// The innermost symbol of `file` whose range contains `position`.
    pub fn symbol_at(&self, file: FileId, position: Position) -> Option<&AstSymbol> {
        self.files
            .get(&file)?
            .symbols
            .iter()
            .filter(|symbol| symbol.range.contains(position))
            .min_by_key(|symbol| {
                (
                    symbol.range.end.line - symbol.range.start.line,
                    symbol.range.end.character.saturating_sub(symbol.range.start.character),
                )
            })
    }

    /// Signatures of every class declared by `files`, keyed by class name.
    pub fn signatures_for<'a>(
        &self,
        files: impl IntoIterator<Item = &'a FileId>,
    ) -> BTreeMap<String, ClassSignature> {
        files
            .into_iter()
            .flat_map(|file| self.classes_in(*file))
            .map(|class| (class.name.clone(), class.clone()))
            .collect()
    }

    /// Files declaring the classes `file` references, excluding `file` itself.
    pub fn dependencies_of(&self, file: FileId) -> BTreeSet<FileId> {
        let Some(ast) = self.files.get(&file) else {
            return BTreeSet::new();
        };
        ast.references
            .iter()
            .filter_map(|name| self.declaring_file(name))
            .filter(|target| *target != file)
            .collect()
    }
}
