//! The incremental-vs-full compile decision for one scope.
//!
//! Every entry runs under the scope's write lock:
//!
//! 1. nothing changed since the last compile: no-op;
//! 2. a handful of changed files in a previously compiled scope: compile only the changed files
//!    plus a shallow forward closure, in isolation, and accept the result only if no class in
//!    that working set changed its public surface;
//! 3. otherwise (or when step 2 bails out): recompile the whole unit and re-visit the files
//!    downstream of the change.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use grove_config::CompileConfig;
use grove_core::{is_within, Diagnostic, FileId};
use grove_vfs::{FileSystem, OpenDocumentTracker};

use crate::ast::AstIndex;
use crate::compiler::{CompileError, CompileOutput, Compiler, SourceSet};
use crate::scope::ScopeState;
use crate::signature::{signature_drift, ClassSignature};
use crate::unit::{admit_sources, read_source, CompilationUnit, UnitUpdate};

/// Collaborators a compile needs besides the scope's own state.
pub struct CompileContext<'a, F: FileSystem> {
    pub tracker: &'a OpenDocumentTracker<F>,
    pub compiler: &'a dyn Compiler,
    pub config: &'a CompileConfig,
}

impl<F: FileSystem> Clone for CompileContext<'_, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: FileSystem> Copy for CompileContext<'_, F> {}

/// Why a compile took the full path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullCompileReason {
    NotCompiled,
    EnvironmentChanged,
    TooManyChanges,
    NoDependencyGraph,
    WorkingSetTooLarge,
    UnreadableSource,
    SignatureDrift,
    IncrementalFailed,
    /// The last full compile stopped on syntax errors, so the kept ASTs and diagnostics do not
    /// describe the current sources.
    SourceErrors,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    UpToDate,
    Incremental {
        files: usize,
    },
    Full {
        files: usize,
        reason: FullCompileReason,
    },
    /// The compiler failed internally. The scope kept its previous state and the changed files
    /// stay pending.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileReport {
    pub outcome: CompileOutcome,
    /// Files whose diagnostic set changed, with the new set. An empty set clears the file.
    pub published: Vec<(FileId, Vec<Diagnostic>)>,
}

impl CompileReport {
    fn new(outcome: CompileOutcome) -> Self {
        Self {
            outcome,
            published: Vec::new(),
        }
    }

    pub fn is_incremental(&self) -> bool {
        matches!(self.outcome, CompileOutcome::Incremental { .. })
    }

    pub fn is_full(&self) -> bool {
        matches!(self.outcome, CompileOutcome::Full { .. })
    }

    pub fn full_reason(&self) -> Option<FullCompileReason> {
        match self.outcome {
            CompileOutcome::Full { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

pub(crate) fn compile_and_visit<F: FileSystem>(
    state: &mut ScopeState,
    ctx: CompileContext<'_, F>,
    context: Option<FileId>,
) -> CompileReport {
    let context = context
        .filter(|file| owns_source(state, ctx, *file))
        .or(state.previous_context);
    let changed = pending_changes(state, ctx);

    if state.compiled && !state.env_stale && changed.is_empty() {
        state.previous_context = context;
        return CompileReport::new(CompileOutcome::UpToDate);
    }

    // Consume the changed set before any text is read; edits racing with this compile mark
    // their files again and are picked up next time.
    ctx.tracker.clear_changed(&changed);

    let reason = match incremental_blocker(state, ctx.config, &changed) {
        Some(reason) => reason,
        None => match try_incremental(state, ctx, &changed, context) {
            Ok(report) => return report,
            Err(reason) => reason,
        },
    };

    match full_compile(state, ctx, &changed, context, reason) {
        Some(report) => report,
        None => {
            for file in &changed {
                ctx.tracker.mark_changed(*file);
            }
            CompileReport::new(CompileOutcome::Failed)
        }
    }
}

/// Changed source files this scope owns. Changed files that are not sources are consumed
/// here; files under nested project roots are left for their own scope.
fn pending_changes<F: FileSystem>(state: &ScopeState, ctx: CompileContext<'_, F>) -> BTreeSet<FileId> {
    let mut pending = BTreeSet::new();
    let mut ignored = Vec::new();
    for file in ctx.tracker.changed_under(&state.root) {
        let Some(path) = ctx.tracker.path(file) else {
            continue;
        };
        if in_nested_root(state, &path) {
            continue;
        }
        if ctx.config.is_source_file(&path) {
            pending.insert(file);
        } else {
            ignored.push(file);
        }
    }
    ctx.tracker.clear_changed(&ignored);
    pending
}

fn in_nested_root(state: &ScopeState, path: &Path) -> bool {
    state
        .excluded_roots
        .iter()
        .any(|nested| is_within(nested, path))
}

fn owns_source<F: FileSystem>(state: &ScopeState, ctx: CompileContext<'_, F>, file: FileId) -> bool {
    ctx.tracker.path(file).is_some_and(|path| {
        is_within(&state.root, &path)
            && !in_nested_root(state, &path)
            && ctx.config.is_source_file(&path)
    })
}

fn incremental_blocker(
    state: &ScopeState,
    config: &CompileConfig,
    changed: &BTreeSet<FileId>,
) -> Option<FullCompileReason> {
    if !state.compiled {
        return Some(FullCompileReason::NotCompiled);
    }
    if state.env_stale {
        return Some(FullCompileReason::EnvironmentChanged);
    }
    if state.source_errors {
        return Some(FullCompileReason::SourceErrors);
    }
    if changed.len() > config.max_incremental_changes {
        return Some(FullCompileReason::TooManyChanges);
    }
    if state.graph.is_empty() || state.ast.is_empty() || state.unit.is_none() {
        return Some(FullCompileReason::NoDependencyGraph);
    }
    None
}

fn try_incremental<F: FileSystem>(
    state: &mut ScopeState,
    ctx: CompileContext<'_, F>,
    changed: &BTreeSet<FileId>,
    context: Option<FileId>,
) -> Result<CompileReport, FullCompileReason> {
    let mut seed: HashSet<FileId> = changed.iter().copied().collect();
    if let Some(file) = context.filter(|file| state.ast.contains(*file)) {
        seed.insert(file);
    }
    let mut working: BTreeSet<FileId> = seed.iter().copied().collect();
    working.extend(
        state
            .graph
            .transitive_dependencies(&seed, ctx.config.forward_depth),
    );

    if working.len() > ctx.config.max_working_set {
        tracing::debug!(
            target: "grove.workspace",
            root = %state.root.display(),
            working_set = working.len(),
            max = ctx.config.max_working_set,
            "working set too large for incremental compile"
        );
        return Err(FullCompileReason::WorkingSetTooLarge);
    }

    let before = state.ast.signatures_for(&working);

    let mut sources = SourceSet::new();
    for file in &working {
        let source = ctx
            .tracker
            .path(*file)
            .and_then(|path| read_source(ctx.tracker, *file, &path));
        match source {
            Some(source) => {
                sources.insert(source);
            }
            None => {
                tracing::debug!(
                    target: "grove.workspace",
                    file = %file,
                    "working set file unreadable; falling back to full compile"
                );
                return Err(FullCompileReason::UnreadableSource);
            }
        }
    }

    let declared_here: BTreeSet<String> = before.keys().cloned().collect();
    let project_classes = state
        .ast
        .class_names()
        .difference(&declared_here)
        .cloned()
        .collect();
    let env = state
        .environment
        .clone()
        .with_project_classes(project_classes);

    let mut output = match ctx.compiler.compile(&sources, &env) {
        Ok(output) => output,
        Err(CompileError::Source(_)) => {
            // Without ASTs there is nothing to compare signatures against.
            return Err(FullCompileReason::SourceErrors);
        }
        Err(CompileError::Internal(message)) => {
            tracing::debug!(
                target: "grove.workspace",
                root = %state.root.display(),
                error = %message,
                "incremental compile failed; retrying with full compile"
            );
            return Err(FullCompileReason::IncrementalFailed);
        }
    };
    output.asts.retain(|file, _| working.contains(file));

    let after: BTreeMap<String, ClassSignature> = output
        .asts
        .values()
        .flat_map(|ast| ast.classes.iter())
        .map(|class| (class.name.clone(), class.clone()))
        .collect();
    let drift = signature_drift(&before, &after);
    if let Some(first) = drift.first() {
        tracing::debug!(
            target: "grove.workspace",
            root = %state.root.display(),
            classes = drift.len(),
            first = first.class_name(),
            "signature drift; discarding incremental result"
        );
        return Err(FullCompileReason::SignatureDrift);
    }

    for (file, ast) in std::mem::take(&mut output.asts) {
        state.ast.insert(file, ast);
    }
    for file in &working {
        let deps = state.ast.dependencies_of(*file);
        state.graph.update(*file, deps);
    }
    if let Some(unit) = state.unit.as_mut() {
        for source in sources.iter() {
            unit.refresh(source.clone());
        }
    }
    let published = diff_diagnostics(&mut state.diagnostics, &working, &output.diagnostics);

    state.previous_context = context;
    state.last_error = None;
    tracing::debug!(
        target: "grove.workspace",
        root = %state.root.display(),
        files = working.len(),
        published = published.len(),
        "incremental compile"
    );
    Ok(CompileReport {
        outcome: CompileOutcome::Incremental {
            files: working.len(),
        },
        published,
    })
}

fn full_compile<F: FileSystem>(
    state: &mut ScopeState,
    ctx: CompileContext<'_, F>,
    changed: &BTreeSet<FileId>,
    context: Option<FileId>,
    reason: FullCompileReason,
) -> Option<CompileReport> {
    let seed: HashSet<FileId> = changed.iter().copied().collect();
    let mut affected: BTreeSet<FileId> = changed.clone();
    affected.extend(context);
    affected.extend(state.graph.transitive_dependents(&seed));

    let open_documents = ctx.tracker.open_paths();
    let admitted: Vec<(FileId, PathBuf)> = admit_sources(
        &state.root,
        &state.excluded_roots,
        &open_documents,
        ctx.config,
    )
    .into_iter()
    .map(|path| (ctx.tracker.file_id(&path), path))
    .collect();

    // The new unit is only committed once the compiler succeeded.
    let (unit, update) = match state.unit.as_ref() {
        Some(unit) if !state.env_stale => {
            let mut unit = unit.clone();
            let update = unit.patch(&admitted, &affected, ctx.tracker);
            (unit, update)
        }
        _ => (
            CompilationUnit::build(&admitted, ctx.tracker),
            UnitUpdate::Rebuilt,
        ),
    };

    let mut source_errors = false;
    let mut output = match ctx.compiler.compile(unit.sources(), &state.environment) {
        Ok(output) => output,
        Err(CompileError::Source(diagnostics)) => {
            source_errors = true;
            CompileOutput {
                asts: BTreeMap::new(),
                diagnostics,
            }
        }
        Err(CompileError::Internal(message)) => {
            report_failure(state, &message);
            return None;
        }
    };

    let revisit: BTreeSet<FileId> = match &update {
        UnitUpdate::Rebuilt => {
            let mut index = AstIndex::new();
            for file in unit.sources().file_ids() {
                let ast = output
                    .asts
                    .remove(&file)
                    .or_else(|| state.ast.get(file).cloned());
                if let Some(ast) = ast {
                    index.insert(file, ast);
                }
            }
            state.ast = index;
            state.graph.clear();
            unit.sources().file_ids().collect()
        }
        UnitUpdate::Reused { added, removed } => {
            for file in removed {
                state.ast.remove(*file);
                state.graph.remove_file(*file);
            }
            let revisit: BTreeSet<FileId> = affected
                .union(added)
                .copied()
                .filter(|file| unit.contains(*file))
                .collect();
            for file in &revisit {
                if let Some(ast) = output.asts.remove(file) {
                    state.ast.insert(*file, ast);
                }
            }
            revisit
        }
    };

    let mut edge_files = revisit.clone();
    if matches!(update, UnitUpdate::Reused { .. }) {
        // Files that could not resolve a class before it was (re)declared have no edge to it.
        let touched: BTreeSet<String> = revisit
            .iter()
            .flat_map(|file| state.ast.classes_in(*file))
            .map(|class| class.name.clone())
            .collect();
        if !touched.is_empty() {
            let referencing: Vec<FileId> = state
                .ast
                .files()
                .filter(|file| {
                    state
                        .ast
                        .get(*file)
                        .is_some_and(|ast| !ast.references.is_disjoint(&touched))
                })
                .collect();
            edge_files.extend(referencing);
        }
    }
    for file in &edge_files {
        let deps = state.ast.dependencies_of(*file);
        state.graph.update(*file, deps);
    }

    let mut diagnosed: BTreeSet<FileId> = unit.sources().file_ids().collect();
    diagnosed.extend(state.diagnostics.keys().copied());
    let published = diff_diagnostics(&mut state.diagnostics, &diagnosed, &output.diagnostics);

    let files = unit.len();
    state.unit = Some(unit);
    state.compiled = true;
    state.env_stale = false;
    state.source_errors = source_errors;
    state.previous_context = context;
    state.last_error = None;

    tracing::debug!(
        target: "grove.workspace",
        root = %state.root.display(),
        files,
        affected = affected.len(),
        rebuilt = matches!(update, UnitUpdate::Rebuilt),
        reason = ?reason,
        source_errors,
        published = published.len(),
        "full compile"
    );
    Some(CompileReport {
        outcome: CompileOutcome::Full { files, reason },
        published,
    })
}

fn report_failure(state: &mut ScopeState, message: &str) {
    if state.last_error.as_deref() == Some(message) {
        tracing::debug!(
            target: "grove.workspace",
            root = %state.root.display(),
            error = %message,
            "compile failed again"
        );
        return;
    }
    tracing::error!(
        target: "grove.workspace",
        root = %state.root.display(),
        error = %message,
        "compile failed; keeping previous results"
    );
    state.last_error = Some(message.to_owned());
}

/// Replaces the stored diagnostics of `files` and returns the files whose set changed.
fn diff_diagnostics(
    current: &mut HashMap<FileId, Vec<Diagnostic>>,
    files: &BTreeSet<FileId>,
    fresh: &BTreeMap<FileId, Vec<Diagnostic>>,
) -> Vec<(FileId, Vec<Diagnostic>)> {
    let mut published = Vec::new();
    for file in files {
        let mut next = fresh.get(file).cloned().unwrap_or_default();
        next.sort();
        next.dedup();

        let previous = current.get(file).map_or(&[][..], Vec::as_slice);
        if previous == next.as_slice() {
            continue;
        }
        if next.is_empty() {
            current.remove(file);
        } else {
            current.insert(*file, next.clone());
        }
        published.push((*file, next));
    }
    published
}
