use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_channel::Receiver;
use grove_cache::{cache_root, SnapshotStore};
use grove_classpath::{
    discover_projects, ClasspathCache, ClasspathError, ClasspathIndex, ClasspathResolver,
    ResolvedClasspath,
};
use grove_config::GroveConfig;
use grove_core::{is_within, normalize_path, FileId, Position, TextEdit};
use grove_vfs::{
    ContentChange, DocumentError, FileChange, FileChangeKind, FileSystem, LocalFs,
    OpenDocumentTracker,
};
use parking_lot::RwLock;

use crate::compiler::Compiler;
use crate::events::{EventBus, WorkspaceEvent};
use crate::orchestrator::{CompileContext, CompileReport};
use crate::pool::{build_compile_pool, CompilePool};
use crate::scope::{ProjectScope, ScopeState};

/// Registry of project scopes for one workspace root.
///
/// Cloning is cheap and shares all state, so a `Workspace` can be moved into background jobs.
pub struct Workspace<F: FileSystem + 'static = LocalFs> {
    inner: Arc<WorkspaceInner<F>>,
}

impl<F: FileSystem + 'static> Clone for Workspace<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct WorkspaceInner<F: FileSystem> {
    root: PathBuf,
    config: GroveConfig,
    tracker: OpenDocumentTracker<F>,
    compiler: Arc<dyn Compiler>,
    resolver: Arc<dyn ClasspathResolver>,
    cache: Option<ClasspathCache>,
    snapshots: SnapshotStore<ClasspathIndex>,
    scopes: RwLock<BTreeMap<PathBuf, Arc<ProjectScope>>>,
    events: EventBus,
    pool: CompilePool,
}

impl<F: FileSystem + 'static> Workspace<F> {
    pub fn new(
        root: impl AsRef<Path>,
        config: GroveConfig,
        fs: F,
        compiler: Arc<dyn Compiler>,
        resolver: Arc<dyn ClasspathResolver>,
    ) -> Result<Self> {
        let root = normalize_path(root.as_ref());
        let meta = fs
            .metadata(&root)
            .with_context(|| format!("failed to open workspace root {}", root.display()))?;
        anyhow::ensure!(
            meta.is_dir(),
            "workspace root {} is not a directory",
            root.display()
        );

        for warning in config.validate() {
            tracing::warn!(
                target: "grove.workspace",
                key = warning.path,
                "{}",
                warning.message
            );
        }

        let cache = match cache_root(config.classpath.cache_dir.as_deref()) {
            Ok(dir) => Some(
                ClasspathCache::new(dir)
                    .with_sample_size(config.classpath.sample_size)
                    .with_build_file_names(config.classpath.build_file_names.clone()),
            ),
            Err(err) => {
                tracing::warn!(
                    target: "grove.workspace",
                    error = %err,
                    "no cache directory; classpaths will not be cached"
                );
                None
            }
        };

        let tracker = OpenDocumentTracker::new(
            fs,
            config.documents.closed_file_ttl(),
            config.documents.closed_file_capacity,
        );
        let pool = build_compile_pool("grove-compile", config.compile.effective_worker_threads());

        tracing::info!(
            target: "grove.workspace",
            root = %root.display(),
            threads = pool.threads(),
            "workspace opened"
        );
        Ok(Self {
            inner: Arc::new(WorkspaceInner {
                root,
                config,
                tracker,
                compiler,
                resolver,
                cache,
                snapshots: SnapshotStore::new(),
                scopes: RwLock::new(BTreeMap::new()),
                events: EventBus::default(),
                pool,
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn config(&self) -> &GroveConfig {
        &self.inner.config
    }

    pub fn tracker(&self) -> &OpenDocumentTracker<F> {
        &self.inner.tracker
    }

    pub fn snapshots(&self) -> &SnapshotStore<ClasspathIndex> {
        &self.inner.snapshots
    }

    pub fn classpath_cache(&self) -> Option<&ClasspathCache> {
        self.inner.cache.as_ref()
    }

    pub fn subscribe(&self) -> Receiver<WorkspaceEvent> {
        self.inner.events.subscribe()
    }

    /// Finds the workspace's projects and creates a scope for each new one.
    ///
    /// A fresh cache record supplies the project list without walking the workspace. A
    /// workspace without any build file is a single project rooted at the workspace root.
    /// Scopes of projects that disappeared are evicted.
    pub fn discover(&self) -> Vec<PathBuf> {
        self.find_projects(true)
    }

    fn find_projects(&self, use_cache: bool) -> Vec<PathBuf> {
        let inner = &self.inner;
        let cached = inner
            .cache
            .as_ref()
            .filter(|_| use_cache)
            .and_then(|cache| cache.discovered_projects_if_fresh(&inner.root));
        let from_cache = cached.is_some();
        let mut projects = cached.unwrap_or_else(|| {
            discover_projects(&inner.root, inner.config.classpath.build_file_names.as_slice())
        });
        if projects.is_empty() {
            projects.push(inner.root.clone());
        }
        projects.sort();
        projects.dedup();

        let stale: Vec<PathBuf> = {
            let mut scopes = inner.scopes.write();
            for project in &projects {
                scopes
                    .entry(project.clone())
                    .or_insert_with(|| Arc::new(ProjectScope::new(project)));
            }
            scopes
                .keys()
                .filter(|root| !projects.contains(root))
                .cloned()
                .collect()
        };
        for root in stale {
            self.evict_scope(&root);
        }

        for scope in self.scopes() {
            let nested = projects
                .iter()
                .filter(|other| other.as_path() != scope.root() && is_within(scope.root(), other))
                .cloned()
                .collect();
            scope.set_excluded_roots(nested);
        }

        tracing::info!(
            target: "grove.workspace",
            projects = projects.len(),
            from_cache,
            "discovered projects"
        );
        projects
    }

    pub fn projects(&self) -> Vec<PathBuf> {
        self.inner.scopes.read().keys().cloned().collect()
    }

    pub fn scope(&self, project: &Path) -> Option<Arc<ProjectScope>> {
        self.inner
            .scopes
            .read()
            .get(&normalize_path(project))
            .cloned()
    }

    fn scopes(&self) -> Vec<Arc<ProjectScope>> {
        self.inner.scopes.read().values().cloned().collect()
    }

    /// The scope owning `path`: the one with the deepest root containing it.
    pub fn scope_for_path(&self, path: &Path) -> Option<Arc<ProjectScope>> {
        let path = normalize_path(path);
        self.inner
            .scopes
            .read()
            .values()
            .filter(|scope| is_within(scope.root(), &path))
            .max_by_key(|scope| scope.root().components().count())
            .cloned()
    }

    /// Resolves (or loads from cache) the classpath of `project` and installs it in its scope.
    ///
    /// Returns whether the classpath came from the cache.
    pub fn resolve_classpath(&self, project: &Path) -> Result<bool, ClasspathError> {
        let inner = &self.inner;
        let project = normalize_path(project);
        let scope = self.scope(&project).ok_or_else(|| ClasspathError::Resolve {
            project: project.clone(),
            message: "unknown project".to_owned(),
        })?;

        let cached = inner.cache.as_ref().and_then(|cache| {
            let record = cache.load(&inner.root)?;
            if !cache.is_valid_for_project(&record, &project) {
                return None;
            }
            record.project(&project).map(|entry| entry.resolved())
        });
        let from_cache = cached.is_some();
        let resolved = match cached {
            Some(resolved) => resolved,
            None => {
                let resolved = inner.resolver.resolve(&project)?;
                self.store_classpath(&project, &resolved);
                resolved
            }
        };

        let entries = resolved.entries;
        let handle = inner
            .snapshots
            .acquire(entries.as_slice(), || ClasspathIndex::build(&entries))?;
        scope.set_classpath(handle, resolved.runtime_version);

        tracing::info!(
            target: "grove.workspace",
            project = %project.display(),
            entries = entries.len(),
            from_cache,
            "classpath resolved"
        );
        inner.events.publish(WorkspaceEvent::ClasspathResolved {
            project,
            from_cache,
        });
        Ok(from_cache)
    }

    fn store_classpath(&self, project: &Path, resolved: &ResolvedClasspath) {
        let Some(cache) = self.inner.cache.as_ref() else {
            return;
        };
        let discovered = self.projects();
        let merged =
            cache.merge_project(&self.inner.root, project, resolved, Some(discovered.as_slice()));
        if let Err(err) = merged {
            tracing::warn!(
                target: "grove.workspace",
                project = %project.display(),
                error = %err,
                "failed to write classpath cache"
            );
        }
    }

    /// Resolves every project's classpath on the calling thread. Failures are logged and
    /// leave the project unresolved. Returns the number of projects resolved.
    pub fn resolve_classpaths(&self) -> usize {
        let mut resolved = 0;
        for project in self.projects() {
            match self.resolve_classpath(&project) {
                Ok(_) => resolved += 1,
                Err(err) => tracing::warn!(
                    target: "grove.workspace",
                    project = %project.display(),
                    error = %err,
                    "failed to resolve classpath"
                ),
            }
        }
        resolved
    }

    /// Resolves every project's classpath on the compile pool, compiling each project once its
    /// classpath is installed.
    pub fn resolve_classpaths_in_background(&self) {
        for project in self.projects() {
            self.spawn_resolve(project);
        }
    }

    fn spawn_resolve(&self, project: PathBuf) {
        let workspace = self.clone();
        self.inner.pool.spawn(move || {
            match workspace.resolve_classpath(&project) {
                Ok(_) => {
                    workspace.ensure_project_fresh(&project);
                }
                Err(err) => tracing::warn!(
                    target: "grove.workspace",
                    project = %project.display(),
                    error = %err,
                    "failed to resolve classpath"
                ),
            }
        });
    }

    pub fn open_document(&self, path: &Path, text: impl Into<String>, version: i32) -> FileId {
        self.inner.tracker.open(path, text, version)
    }

    pub fn change_document(
        &self,
        path: &Path,
        version: i32,
        changes: &[ContentChange],
    ) -> Result<Vec<TextEdit>, DocumentError> {
        self.inner.tracker.change(path, version, changes)
    }

    pub fn close_document(&self, path: &Path) -> Option<FileId> {
        self.inner.tracker.close(path)
    }

    /// Applies file-system watcher events.
    ///
    /// Source files are marked changed. A changed build file re-resolves its project's
    /// classpath in the background; a build file appearing or disappearing re-runs discovery
    /// first, which may add or evict scopes. Returns the projects scheduled for re-resolution.
    pub fn apply_file_changes(&self, changes: &[FileChange]) -> Vec<PathBuf> {
        let inner = &self.inner;
        let mut rediscover = false;
        let mut reresolve = BTreeSet::new();

        for change in changes {
            let path = normalize_path(change.path());
            if self.is_build_file(&path) {
                inner.tracker.invalidate(&path);
                if change.kind != FileChangeKind::Modified {
                    rediscover = true;
                }
                let dir = path.parent().map(Path::to_path_buf);
                if let Some(scope) = dir.and_then(|dir| self.scope(&dir)) {
                    reresolve.insert(scope.root().to_path_buf());
                }
            } else if inner.config.compile.is_source_file(&path) {
                inner.tracker.apply_file_change(change);
            } else {
                inner.tracker.invalidate(&path);
            }
        }

        if rediscover {
            let before: BTreeSet<PathBuf> = self.projects().into_iter().collect();
            // The cached project list cannot know about a build file that just appeared.
            let after = self.find_projects(false);
            reresolve.extend(after.into_iter().filter(|root| !before.contains(root)));
        }

        let projects: Vec<PathBuf> = reresolve
            .into_iter()
            .filter(|root| self.scope(root).is_some())
            .collect();
        for project in &projects {
            tracing::debug!(
                target: "grove.workspace",
                project = %project.display(),
                "build file changed; re-resolving classpath"
            );
            self.spawn_resolve(project.clone());
        }
        projects
    }

    fn is_build_file(&self, path: &Path) -> bool {
        match self.inner.cache.as_ref() {
            Some(cache) => cache.is_build_file(path),
            None => path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| {
                    self.inner
                        .config
                        .classpath
                        .build_file_names
                        .iter()
                        .any(|known| known == name)
                }),
        }
    }

    fn compile_context(&self) -> CompileContext<'_, F> {
        CompileContext {
            tracker: &self.inner.tracker,
            compiler: self.inner.compiler.as_ref(),
            config: &self.inner.config.compile,
        }
    }

    /// Synchronously brings the scope owning `path` up to date, with `path` as context.
    pub fn ensure_fresh(&self, path: &Path) -> Option<CompileReport> {
        let scope = self.scope_for_path(path)?;
        let file = self.inner.tracker.file_id(path);
        let report = scope.ensure_fresh(self.compile_context(), Some(file));
        self.publish(&report);
        Some(report)
    }

    pub fn ensure_project_fresh(&self, project: &Path) -> Option<CompileReport> {
        let scope = self.scope(project)?;
        let report = scope.ensure_fresh(self.compile_context(), None);
        self.publish(&report);
        Some(report)
    }

    /// Compiles `project` on the compile pool.
    pub fn schedule_compile(&self, project: &Path) {
        let workspace = self.clone();
        let project = project.to_path_buf();
        self.inner.pool.spawn(move || {
            workspace.ensure_project_fresh(&project);
        });
    }

    /// See [`ProjectScope::with_placeholder`].
    pub fn with_placeholder<R>(
        &self,
        path: &Path,
        position: Position,
        token: &str,
        read: impl FnOnce(&ScopeState, FileId) -> R,
    ) -> Option<R> {
        let scope = self.scope_for_path(path)?;
        let (result, report) =
            scope.with_placeholder(self.compile_context(), path, position, token, read)?;
        self.publish(&report);
        Some(result)
    }

    /// Drops the scope of `project`, releasing its classpath snapshot first.
    pub fn evict_scope(&self, project: &Path) -> bool {
        let project = normalize_path(project);
        let Some(scope) = self.inner.scopes.write().remove(&project) else {
            return false;
        };
        scope.release_classpath();
        drop(scope);
        tracing::debug!(target: "grove.workspace", project = %project.display(), "evicted scope");
        self.inner
            .events
            .publish(WorkspaceEvent::ScopeEvicted { project });
        true
    }

    fn publish(&self, report: &CompileReport) {
        for (file, diagnostics) in &report.published {
            let Some(path) = self.inner.tracker.path(*file) else {
                continue;
            };
            self.inner.events.publish(WorkspaceEvent::DiagnosticsUpdated {
                file: path,
                diagnostics: diagnostics.clone(),
            });
        }
    }
}
