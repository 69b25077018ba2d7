use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_channel::{Receiver, TryRecvError};
use grove_config::GroveConfig;
use grove_core::FileId;
use grove_test_utils::{test_config, FakeCompiler, FakeResolver, TestProject};
use grove_workspace::{CompileReport, Compiler, ProjectScope, Workspace, WorkspaceEvent};
use tempfile::TempDir;

pub const UTIL: &str = "\
class Util {
    int size(String name) {
    }
}
";

pub const MAIN: &str = "\
class Main {
    Util util
    void run() {
        def u = new Util()
    }
}
";

pub const OTHER: &str = "\
class Other {
}
";

/// The three-file project most tests start from: `Main -> Util`, plus an unrelated `Other`.
pub fn basic_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("src/Util.groovy", UTIL),
        ("src/Main.groovy", MAIN),
        ("src/Other.groovy", OTHER),
    ]
}

pub struct Harness {
    pub project: Arc<TestProject>,
    pub cache: Arc<TempDir>,
    pub config: GroveConfig,
    pub compiler: Arc<FakeCompiler>,
    pub resolver: Arc<FakeResolver>,
    pub workspace: Workspace,
}

impl Harness {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self::with_config(files, |_| {})
    }

    pub fn with_config(files: &[(&str, &str)], configure: impl FnOnce(&mut GroveConfig)) -> Self {
        Self::with_resolver(files, Arc::new(FakeResolver::new()), configure)
    }

    /// Writes `files`, opens a workspace, discovers projects and resolves their classpaths.
    pub fn with_resolver(
        files: &[(&str, &str)],
        resolver: Arc<FakeResolver>,
        configure: impl FnOnce(&mut GroveConfig),
    ) -> Self {
        let project = Arc::new(TestProject::new());
        project.write_all(files);
        let cache = Arc::new(tempfile::tempdir().unwrap());
        let mut config = test_config(cache.path());
        configure(&mut config);
        let harness = Self::start(project, cache, config, resolver);
        harness.workspace.discover();
        harness.workspace.resolve_classpaths();
        harness
    }

    /// A second workspace over the same files and cache directory, without discovery.
    pub fn reopen(&self, resolver: Arc<FakeResolver>) -> Self {
        Self::start(
            Arc::clone(&self.project),
            Arc::clone(&self.cache),
            self.config.clone(),
            resolver,
        )
    }

    fn start(
        project: Arc<TestProject>,
        cache: Arc<TempDir>,
        config: GroveConfig,
        resolver: Arc<FakeResolver>,
    ) -> Self {
        let compiler = Arc::new(FakeCompiler::new());
        let dyn_compiler: Arc<dyn Compiler> = compiler.clone();
        let workspace = Workspace::new(
            project.root(),
            config.clone(),
            grove_vfs::LocalFs,
            dyn_compiler,
            resolver.clone(),
        )
        .unwrap();
        Self {
            project,
            cache,
            config,
            compiler,
            resolver,
            workspace,
        }
    }

    pub fn root(&self) -> &Path {
        self.project.root()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.project.path(rel)
    }

    pub fn file(&self, rel: &str) -> FileId {
        self.workspace.tracker().file_id(&self.path(rel))
    }

    pub fn scope(&self) -> Arc<ProjectScope> {
        self.workspace.scope(self.root()).unwrap()
    }

    pub fn compile(&self) -> CompileReport {
        self.workspace.ensure_project_fresh(self.root()).unwrap()
    }

    pub fn compile_at(&self, rel: &str) -> CompileReport {
        self.workspace.ensure_fresh(&self.path(rel)).unwrap()
    }

    pub fn open(&self, rel: &str, text: &str) {
        self.workspace.open_document(&self.path(rel), text, 1);
    }

    pub fn pending(&self) -> usize {
        self.workspace.tracker().changed_under(self.root()).len()
    }
}

/// Receives events until `pick` returns `Some`, failing after a generous timeout.
pub fn wait_for<T>(
    events: &Receiver<WorkspaceEvent>,
    mut pick: impl FnMut(&WorkspaceEvent) -> Option<T>,
) -> T {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let Some(found) = pick(&event) {
                    return found;
                }
            }
            Err(TryRecvError::Empty) => {
                assert!(Instant::now() < deadline, "timed out waiting for event");
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(TryRecvError::Closed) => panic!("event channel closed"),
        }
    }
}

/// Every event currently queued.
pub fn drain(events: &Receiver<WorkspaceEvent>) -> Vec<WorkspaceEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}
