use std::sync::Arc;

use grove_test_utils::FakeResolver;
use grove_vfs::FileChange;
use grove_workspace::WorkspaceEvent;

use super::support::{drain, wait_for, Harness};

const USES_LIB: &str = "\
class App {
    void run() {
        def lib = new Lib()
    }
}
";

fn lib_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("org/example")).unwrap();
    std::fs::write(dir.path().join("Lib.class"), b"").unwrap();
    std::fs::write(dir.path().join("org/example/Helper.class"), b"").unwrap();
    dir
}

#[test]
fn resolved_classpath_is_installed_in_the_scope() {
    let libs = lib_dir();
    let resolver = Arc::new(FakeResolver::new());
    resolver.set_default_entries(&[libs.path().to_path_buf()]);

    let h = Harness::with_resolver(&[("src/App.groovy", USES_LIB)], resolver, |_| {});
    h.compile();

    let scope = h.scope();
    let state = scope.read();
    assert!(state.is_classpath_resolved());
    let classpath = state.classpath().expect("classpath handle");
    assert!(classpath.contains("org.example.Helper"));
    assert!(state.environment().knows_class("Lib"));
    assert!(state.diagnostics(h.file("src/App.groovy")).is_empty());
    assert_eq!(h.resolver.resolve_count(), 1);
}

#[test]
fn second_session_loads_the_classpath_from_cache() {
    let libs = lib_dir();
    let resolver = Arc::new(FakeResolver::new());
    resolver.set_default_entries(&[libs.path().to_path_buf()]);
    let first = Harness::with_resolver(&[("src/App.groovy", USES_LIB)], resolver, |_| {});
    assert_eq!(first.resolver.resolve_count(), 1);

    let second = first.reopen(Arc::new(FakeResolver::new()));
    let events = second.workspace.subscribe();
    assert_eq!(second.workspace.discover(), vec![second.root().to_path_buf()]);

    let from_cache = second.workspace.resolve_classpath(second.root()).unwrap();

    assert!(from_cache);
    assert_eq!(second.resolver.resolve_count(), 0);
    let resolved = drain(&events).into_iter().find_map(|event| match event {
        WorkspaceEvent::ClasspathResolved { from_cache, .. } => Some(from_cache),
        _ => None,
    });
    assert_eq!(resolved, Some(true));
    assert!(second.compile().published.is_empty());
}

#[test]
fn missing_classpath_entry_invalidates_the_cache() {
    let libs = lib_dir();
    let resolver = Arc::new(FakeResolver::new());
    resolver.set_default_entries(&[libs.path().to_path_buf()]);
    let first = Harness::with_resolver(&[("src/App.groovy", USES_LIB)], resolver, |_| {});

    let libs_path = libs.path().to_path_buf();
    drop(libs);
    assert!(!libs_path.exists());

    let second = first.reopen(Arc::new(FakeResolver::new()));
    second.workspace.discover();
    let from_cache = second.workspace.resolve_classpath(second.root()).unwrap();

    assert!(!from_cache);
    assert_eq!(second.resolver.resolve_count(), 1);
}

#[test]
fn build_file_change_re_resolves_only_its_project() {
    let h = Harness::new(&[
        ("app/build.gradle", "apply plugin: 'groovy'\n"),
        ("app/src/App.groovy", "class App {\n}\n"),
        ("lib/build.gradle", "apply plugin: 'groovy'\n"),
        ("lib/src/Lib.groovy", "class Lib {\n}\n"),
    ]);
    let app = h.path("app");
    let lib = h.path("lib");
    assert_eq!(h.workspace.projects(), vec![app.clone(), lib.clone()]);
    assert_eq!(h.resolver.resolve_count(), 2);
    let events = h.workspace.subscribe();

    let touched = h.project.touch("app/build.gradle");
    let scheduled = h
        .workspace
        .apply_file_changes(&[FileChange::modified(touched)]);
    assert_eq!(scheduled, vec![app.clone()]);

    let from_cache = wait_for(&events, |event| match event {
        WorkspaceEvent::ClasspathResolved {
            project,
            from_cache,
        } if *project == app => Some(*from_cache),
        _ => None,
    });
    assert!(!from_cache);
    let calls = h.resolver.calls();
    assert_eq!(calls.iter().filter(|project| **project == app).count(), 2);
    assert_eq!(calls.iter().filter(|project| **project == lib).count(), 1);
}

#[test]
fn resolution_failure_keeps_the_previous_classpath() {
    let libs = lib_dir();
    let resolver = Arc::new(FakeResolver::new());
    resolver.set_default_entries(&[libs.path().to_path_buf()]);
    let h = Harness::with_resolver(&[("src/App.groovy", USES_LIB)], resolver, |_| {});

    h.resolver.fail(h.root(), "gradle daemon died");
    h.workspace
        .classpath_cache()
        .unwrap()
        .invalidate(h.root())
        .unwrap();

    assert!(h.workspace.resolve_classpath(h.root()).is_err());
    assert_eq!(h.resolver.resolve_count(), 2);

    let scope = h.scope();
    let state = scope.read();
    assert!(state.is_classpath_resolved());
    assert!(state.environment().knows_class("Lib"));
}
