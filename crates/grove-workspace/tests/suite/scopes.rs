use grove_vfs::FileChange;
use grove_workspace::{CompileOutcome, FullCompileReason, WorkspaceEvent};

use super::support::{basic_files, wait_for, Harness};

fn two_projects() -> Harness {
    Harness::new(&[
        ("app/build.gradle", "apply plugin: 'groovy'\n"),
        ("app/src/App.groovy", "class App {\n}\n"),
        ("lib/build.gradle", "apply plugin: 'groovy'\n"),
        ("lib/src/Lib.groovy", "class Lib {\n}\n"),
    ])
}

#[test]
fn scopes_share_identical_classpath_snapshots() {
    let h = two_projects();
    let app = h.path("app");
    let lib = h.path("lib");
    let events = h.workspace.subscribe();

    let key = h
        .workspace
        .scope(&app)
        .unwrap()
        .read()
        .classpath()
        .unwrap()
        .key()
        .clone();
    let snapshots = h.workspace.snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots.ref_count(&key), 2);

    assert!(h.workspace.evict_scope(&app));
    assert_eq!(snapshots.ref_count(&key), 1);
    let evicted = wait_for(&events, |event| match event {
        WorkspaceEvent::ScopeEvicted { project } => Some(project.clone()),
        _ => None,
    });
    assert_eq!(evicted, app);
    assert!(h.workspace.scope(&app).is_none());
    assert!(!h.workspace.evict_scope(&app));

    assert!(h.workspace.evict_scope(&lib));
    assert!(snapshots.is_empty());
}

#[test]
fn deleting_a_build_file_evicts_its_scope() {
    let h = two_projects();
    let lib = h.path("lib");
    let events = h.workspace.subscribe();

    let removed = h.project.remove("lib/build.gradle");
    h.workspace
        .apply_file_changes(&[FileChange::deleted(removed)]);

    let evicted = wait_for(&events, |event| match event {
        WorkspaceEvent::ScopeEvicted { project } => Some(project.clone()),
        _ => None,
    });
    assert_eq!(evicted, lib);
    assert_eq!(h.workspace.projects(), vec![h.path("app")]);
}

#[test]
fn new_build_file_creates_a_scope() {
    let h = two_projects();
    let tools = h.path("tools");

    let created = h.project.write("tools/build.gradle", "apply plugin: 'groovy'\n");
    let scheduled = h
        .workspace
        .apply_file_changes(&[FileChange::created(created)]);

    assert_eq!(scheduled, vec![tools.clone()]);
    assert!(h.workspace.scope(&tools).is_some());
}

#[test]
fn nested_project_owns_its_files() {
    let h = Harness::new(&[
        ("build.gradle", "apply plugin: 'groovy'\n"),
        ("src/Root.groovy", "class Root {\n}\n"),
        ("sub/build.gradle", "apply plugin: 'groovy'\n"),
        ("sub/src/Sub.groovy", "class Sub {\n}\n"),
    ]);
    let sub = h.path("sub");
    let sub_file = h.path("sub/src/Sub.groovy");

    let owner = h.workspace.scope_for_path(&sub_file).unwrap();
    assert_eq!(owner.root(), sub.as_path());
    assert_eq!(h.scope().read().excluded_roots(), &[sub.clone()]);

    assert!(h.compile().is_full());
    {
        let scope = h.scope();
        let state = scope.read();
        assert!(state.declaring_file("Root").is_some());
        assert!(state.declaring_file("Sub").is_none());
    }

    h.workspace.open_document(&sub_file, "class Sub {\n    int x\n}\n", 1);
    assert_eq!(h.compile().outcome, CompileOutcome::UpToDate);
    assert_eq!(
        h.workspace.tracker().changed_under(&sub).len(),
        1,
        "the nested project's change stays pending"
    );

    let report = h.workspace.ensure_fresh(&sub_file).unwrap();
    assert!(report.is_full());
    assert!(h.workspace.tracker().changed_under(&sub).is_empty());
    assert_eq!(
        owner.read().declaring_file("Sub"),
        Some(h.file("sub/src/Sub.groovy"))
    );
}

#[test]
fn scheduled_compile_publishes_diagnostics() {
    let h = Harness::new(&[(
        "src/Other.groovy",
        "class Other {\n    void ping() {\n        def g = new Gone()\n    }\n}\n",
    )]);
    let events = h.workspace.subscribe();
    let other = h.path("src/Other.groovy");

    h.workspace.schedule_compile(h.root());

    let diagnostics = wait_for(&events, |event| match event {
        WorkspaceEvent::DiagnosticsUpdated { file, diagnostics } if *file == other => {
            Some(diagnostics.clone())
        }
        _ => None,
    });
    assert_eq!(diagnostics.len(), 1);
    assert!(h.scope().read().is_compiled());
}

#[test]
fn background_resolution_compiles_each_project() {
    let h = two_projects();
    let events = h.workspace.subscribe();

    h.workspace.resolve_classpaths_in_background();

    let mut resolved = Vec::new();
    while resolved.len() < 2 {
        resolved.push(wait_for(&events, |event| match event {
            WorkspaceEvent::ClasspathResolved { project, .. } => Some(project.clone()),
            _ => None,
        }));
    }
    resolved.sort();
    assert_eq!(resolved, vec![h.path("app"), h.path("lib")]);

    // Resolution and compile run as one job; waiting for the lock means the compile finished.
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    for project in ["app", "lib"] {
        let scope = h.workspace.scope(&h.path(project)).unwrap();
        while !scope.read().is_compiled() {
            assert!(std::time::Instant::now() < deadline, "{project} never compiled");
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }
}

#[test]
fn admission_bound_prefers_open_directories() {
    let h = Harness::with_config(
        &[
            ("src/a/A1.groovy", "class A1 {\n}\n"),
            ("src/a/A2.groovy", "class A2 {\n}\n"),
            ("src/b/B1.groovy", "class B1 {\n}\n"),
            ("src/b/B2.groovy", "class B2 {\n}\n"),
        ],
        |config| config.compile.max_compile_files = 2,
    );
    h.open("src/b/B2.groovy", "class B2 {\n}\n");

    let report = h.compile();

    assert_eq!(
        report.outcome,
        CompileOutcome::Full {
            files: 2,
            reason: FullCompileReason::NotCompiled
        }
    );
    let scope = h.scope();
    let state = scope.read();
    let unit = state.unit().unwrap();
    assert!(unit.contains(h.file("src/b/B1.groovy")));
    assert!(unit.contains(h.file("src/b/B2.groovy")));
    assert!(!unit.contains(h.file("src/a/A1.groovy")));
}

#[test]
fn compiling_an_unknown_path_is_a_no_op() {
    let h = Harness::new(&basic_files());
    let outside = tempfile::tempdir().unwrap();

    assert!(h
        .workspace
        .ensure_fresh(&outside.path().join("Elsewhere.groovy"))
        .is_none());
    assert!(h.workspace.ensure_project_fresh(outside.path()).is_none());
    assert_eq!(h.compiler.compile_count(), 0);
}
