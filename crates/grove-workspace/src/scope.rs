use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use grove_cache::SnapshotHandle;
use grove_classpath::ClasspathIndex;
use grove_core::{normalize_path, Diagnostic, FileId, LineIndex, Position};
use grove_graph::DependencyGraph;
use grove_vfs::FileSystem;
use parking_lot::{RwLock, RwLockReadGuard};

use crate::ast::{AstIndex, AstSymbol};
use crate::compiler::CompileEnvironment;
use crate::orchestrator::{compile_and_visit, CompileContext, CompileReport};
use crate::signature::ClassSignature;
use crate::unit::CompilationUnit;

/// Compilation state of one project. Only reachable through [`ProjectScope`]'s lock.
#[derive(Debug)]
pub struct ScopeState {
    pub(crate) root: PathBuf,
    /// Roots of projects nested inside this one; their files belong to them.
    pub(crate) excluded_roots: Vec<PathBuf>,
    pub(crate) unit: Option<CompilationUnit>,
    pub(crate) ast: AstIndex,
    pub(crate) graph: DependencyGraph,
    pub(crate) compiled: bool,
    pub(crate) classpath_resolved: bool,
    pub(crate) previous_context: Option<FileId>,
    pub(crate) diagnostics: HashMap<FileId, Vec<Diagnostic>>,
    pub(crate) environment: CompileEnvironment,
    /// The environment changed since the unit was built; the next compile rebuilds it.
    pub(crate) env_stale: bool,
    /// The last full compile stopped on syntax errors; incremental compiles wait for a clean one.
    pub(crate) source_errors: bool,
    pub(crate) classpath: Option<SnapshotHandle<ClasspathIndex>>,
    pub(crate) last_error: Option<String>,
}

impl ScopeState {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            excluded_roots: Vec::new(),
            unit: None,
            ast: AstIndex::new(),
            graph: DependencyGraph::new(),
            compiled: false,
            classpath_resolved: false,
            previous_context: None,
            diagnostics: HashMap::new(),
            environment: CompileEnvironment::default(),
            env_stale: false,
            source_errors: false,
            classpath: None,
            last_error: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ast(&self) -> &AstIndex {
        &self.ast
    }

    pub fn symbol_at(&self, file: FileId, position: Position) -> Option<&AstSymbol> {
        self.ast.symbol_at(file, position)
    }

    pub fn declaring_file(&self, class_name: &str) -> Option<FileId> {
        self.ast.declaring_file(class_name)
    }

    pub fn classes_in(&self, file: FileId) -> &[ClassSignature] {
        self.ast.classes_in(file)
    }

    /// Last published diagnostics of `file`.
    pub fn diagnostics(&self, file: FileId) -> &[Diagnostic] {
        self.diagnostics.get(&file).map_or(&[], Vec::as_slice)
    }

    pub fn files_with_diagnostics(&self) -> impl Iterator<Item = FileId> + '_ {
        self.diagnostics.keys().copied()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn unit(&self) -> Option<&CompilationUnit> {
        self.unit.as_ref()
    }

    pub fn environment(&self) -> &CompileEnvironment {
        &self.environment
    }

    pub fn classpath(&self) -> Option<&SnapshotHandle<ClasspathIndex>> {
        self.classpath.as_ref()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn is_classpath_resolved(&self) -> bool {
        self.classpath_resolved
    }

    pub fn previous_context(&self) -> Option<FileId> {
        self.previous_context
    }

    pub fn excluded_roots(&self) -> &[PathBuf] {
        &self.excluded_roots
    }
}

/// One build-tool project.
///
/// Compiles, placeholder injection and classpath changes take the write lock; lookups share the
/// read lock. Once a writer returns, every later reader sees its results.
#[derive(Debug)]
pub struct ProjectScope {
    root: PathBuf,
    state: RwLock<ScopeState>,
}

impl ProjectScope {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = normalize_path(root.as_ref());
        Self {
            state: RwLock::new(ScopeState::new(root.clone())),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read access for lookups. Blocks while a compile is running.
    pub fn read(&self) -> RwLockReadGuard<'_, ScopeState> {
        self.state.read()
    }

    /// Brings the scope up to date with the tracker's changed files.
    ///
    /// `context` is the file the caller is interested in; it is compiled along with the changes.
    pub fn ensure_fresh<F: FileSystem>(
        &self,
        ctx: CompileContext<'_, F>,
        context: Option<FileId>,
    ) -> CompileReport {
        let mut state = self.state.write();
        compile_and_visit(&mut state, ctx, context)
    }

    /// Sets the roots of projects nested inside this one.
    pub fn set_excluded_roots(&self, mut roots: Vec<PathBuf>) {
        roots.sort();
        let mut state = self.state.write();
        if state.excluded_roots != roots {
            state.excluded_roots = roots;
            state.compiled = false;
        }
    }

    /// Installs a resolved classpath. The previous handle, if any, is released and the next
    /// compile rebuilds the unit against the new environment.
    pub fn set_classpath(
        &self,
        handle: SnapshotHandle<ClasspathIndex>,
        runtime_version: Option<String>,
    ) {
        let mut state = self.state.write();
        let mut environment = CompileEnvironment::new(Arc::clone(handle.snapshot()));
        environment.runtime_version = runtime_version;
        state.environment = environment;
        state.classpath = Some(handle);
        state.classpath_resolved = true;
        state.env_stale = true;
        tracing::debug!(target: "grove.workspace", root = %self.root.display(), "classpath installed");
    }

    /// Drops the scope's snapshot handle. Returns `false` if it held none.
    pub fn release_classpath(&self) -> bool {
        let released = self.state.write().classpath.take();
        released.is_some()
    }

    /// Runs `read` against an AST that has `token` spliced into `path` at `position`.
    ///
    /// The splice and the compile happen under the write lock. Edits arriving meanwhile apply
    /// to the editor's text, which is put back afterwards. The file stays marked changed but is
    /// not recompiled here: the next request that needs a fresh AST does that. Returns `None`
    /// if `path` is not an open document or `position` lies outside it.
    pub fn with_placeholder<F, R>(
        &self,
        ctx: CompileContext<'_, F>,
        path: &Path,
        position: Position,
        token: &str,
        read: impl FnOnce(&ScopeState, FileId) -> R,
    ) -> Option<(R, CompileReport)>
    where
        F: FileSystem,
    {
        let mut state = self.state.write();
        if !ctx.tracker.is_open(path) {
            return None;
        }
        let file = ctx.tracker.file_id(path);
        let original = ctx.tracker.contents_by_id(file)?;

        let line_index = LineIndex::new(&original);
        let offset = usize::from(line_index.offset_of_position(&original, position)?);
        let mut spliced = String::with_capacity(original.len() + token.len());
        spliced.push_str(&original[..offset]);
        spliced.push_str(token);
        spliced.push_str(&original[offset..]);
        let spliced = Arc::new(spliced);

        ctx.tracker.begin_splice(path, spliced)?;
        let report = compile_and_visit(&mut state, ctx, Some(file));
        let result = read(&state, file);

        if !ctx.tracker.end_splice(path) {
            tracing::debug!(
                target: "grove.workspace",
                path = %path.display(),
                "document closed or reopened during placeholder compile"
            );
        }
        Some((result, report))
    }
}

impl Drop for ProjectScope {
    fn drop(&mut self) {
        if self.state.get_mut().classpath.take().is_some() {
            tracing::trace!(target: "grove.workspace", root = %self.root.display(), "released classpath on drop");
        }
    }
}
