use std::collections::BTreeMap;

use grove_core::{Diagnostic, Severity};
use grove_test_utils::UNRESOLVED_CLASS_CODE;
use grove_workspace::{CompileOutcome, FullCompileReason, WorkspaceEvent};

use super::support::{basic_files, drain, wait_for, Harness, MAIN, OTHER, UTIL};

const UTIL_MISSING: &str = "\
class Util {
    int size(String name) {
        def m = new Missing()
    }
}
";

const OTHER_MISSING: &str = "\
class Other {
    void ping() {
        def gone = new Gone()
    }
}
";

const UTIL_UNBALANCED: &str = "\
class Util {
    int size(String name) {
    }
}
}
";

const UTIL_BODY_EDIT: &str = "\
class Util {
    int size(String name) {
        def trimmed = name
    }
}
";

#[test]
fn unresolved_class_is_published_and_cleared() {
    let h = Harness::new(&basic_files());
    h.compile();
    let events = h.workspace.subscribe();
    let util = h.path("src/Util.groovy");

    h.open("src/Util.groovy", UTIL_MISSING);
    assert!(h.compile().is_incremental());

    let diagnostics = wait_for(&events, |event| match event {
        WorkspaceEvent::DiagnosticsUpdated { file, diagnostics } if *file == util => {
            Some(diagnostics.clone())
        }
        _ => None,
    });
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Warning);
    assert_eq!(diagnostics[0].code.as_deref(), Some(UNRESOLVED_CLASS_CODE));
    assert_eq!(diagnostics[0].message, "unable to resolve class Missing");

    h.open("src/Util.groovy", UTIL);
    assert!(h.compile().is_incremental());
    let cleared = wait_for(&events, |event| match event {
        WorkspaceEvent::DiagnosticsUpdated { file, diagnostics } if *file == util => {
            Some(diagnostics.clone())
        }
        _ => None,
    });
    assert!(cleared.is_empty());
}

#[test]
fn unchanged_diagnostics_are_not_republished() {
    let h = Harness::new(&[
        ("src/Util.groovy", UTIL_MISSING),
        ("src/Main.groovy", MAIN),
        ("src/Other.groovy", OTHER),
    ]);
    let events = h.workspace.subscribe();
    let report = h.compile();
    assert_eq!(report.published.len(), 1);
    assert_eq!(drain(&events).len(), 1);

    // Same problem, different line: the set changes.
    h.open(
        "src/Util.groovy",
        "class Util {\n    int size(String name) {\n\n        def m = new Missing()\n    }\n}\n",
    );
    let report = h.compile();
    assert_eq!(report.published.len(), 1);

    // Same text again: nothing to publish.
    h.open(
        "src/Util.groovy",
        "class Util {\n    int size(String name) {\n\n        def m = new Missing()\n    }\n}\n",
    );
    let report = h.compile();
    assert!(report.is_incremental());
    assert!(report.published.is_empty());
}

#[test]
fn project_classes_outside_the_working_set_still_resolve() {
    let h = Harness::new(&basic_files());
    h.compile();

    // Main alone is not a working set: Util comes along as a forward dependency. Other is
    // not, yet referencing it must not produce a warning.
    h.open(
        "src/Main.groovy",
        "class Main {\n    Util util\n    void run() {\n        def o = new Other()\n    }\n}\n",
    );
    let report = h.compile();

    assert!(report.is_incremental());
    assert!(h
        .scope()
        .read()
        .diagnostics(h.file("src/Main.groovy"))
        .is_empty());
}

/// Diagnostics per file, keyed by relative path.
fn diagnostics_by_path(h: &Harness, files: &[&str]) -> BTreeMap<String, Vec<Diagnostic>> {
    let scope = h.scope();
    let state = scope.read();
    files
        .iter()
        .map(|rel| (rel.to_string(), state.diagnostics(h.file(rel)).to_vec()))
        .collect()
}

#[test]
fn incremental_results_match_a_fresh_full_compile() {
    let files = ["src/Util.groovy", "src/Main.groovy", "src/Other.groovy"];
    let h = Harness::new(&[
        ("src/Util.groovy", UTIL),
        ("src/Main.groovy", MAIN),
        ("src/Other.groovy", OTHER_MISSING),
    ]);
    h.compile();

    h.open("src/Util.groovy", UTIL_BODY_EDIT);
    assert!(h.compile().is_incremental());
    h.open("src/Util.groovy", UTIL_MISSING);
    assert!(h.compile().is_incremental());
    let incremental = diagnostics_by_path(&h, &files);

    let fresh = Harness::new(&[
        ("src/Util.groovy", UTIL_MISSING),
        ("src/Main.groovy", MAIN),
        ("src/Other.groovy", OTHER_MISSING),
    ]);
    assert!(fresh.compile().is_full());
    let full = diagnostics_by_path(&fresh, &files);

    assert_eq!(incremental, full);
    assert_eq!(full["src/Other.groovy"].len(), 1);
    assert_eq!(full["src/Util.groovy"].len(), 1);
    assert!(full["src/Main.groovy"].is_empty());
}

#[test]
fn fixing_a_syntax_error_matches_a_fresh_full_compile() {
    let files = ["src/Util.groovy", "src/Main.groovy", "src/Other.groovy"];
    let h = Harness::new(&[
        ("src/Util.groovy", UTIL),
        ("src/Main.groovy", MAIN),
        ("src/Other.groovy", OTHER_MISSING),
    ]);
    h.compile();
    assert_eq!(diagnostics_by_path(&h, &files)["src/Other.groovy"].len(), 1);

    h.open("src/Util.groovy", UTIL_UNBALANCED);
    let report = h.compile();
    assert_eq!(report.full_reason(), Some(FullCompileReason::SourceErrors));

    h.open("src/Util.groovy", UTIL);
    let report = h.compile();
    assert_eq!(report.full_reason(), Some(FullCompileReason::SourceErrors));
    let recovered = diagnostics_by_path(&h, &files);

    let fresh = Harness::new(&[
        ("src/Util.groovy", UTIL),
        ("src/Main.groovy", MAIN),
        ("src/Other.groovy", OTHER_MISSING),
    ]);
    fresh.compile();
    assert_eq!(recovered, diagnostics_by_path(&fresh, &files));
    assert_eq!(recovered["src/Other.groovy"].len(), 1);

    // A clean full compile makes the scope eligible for incremental compiles again.
    h.open("src/Util.groovy", UTIL_BODY_EDIT);
    assert!(h.compile().is_incremental());
}

#[test]
fn classpath_arriving_after_a_compile_refreshes_diagnostics() {
    let h = Harness::new(&[
        ("src/Util.groovy", UTIL_MISSING),
        ("src/Main.groovy", MAIN),
    ]);
    let util = h.file("src/Util.groovy");
    h.compile();
    assert_eq!(h.scope().read().diagnostics(util).len(), 1);
    assert_eq!(h.pending(), 0);

    let libs = tempfile::tempdir().unwrap();
    std::fs::write(libs.path().join("Missing.class"), b"").unwrap();
    h.resolver.set_default_entries(&[libs.path().to_path_buf()]);
    h.workspace
        .classpath_cache()
        .unwrap()
        .invalidate(h.root())
        .unwrap();
    h.workspace.resolve_classpath(h.root()).unwrap();
    assert_eq!(h.pending(), 0);

    let report = h.compile();
    assert_eq!(
        report.full_reason(),
        Some(FullCompileReason::EnvironmentChanged)
    );
    assert!(report
        .published
        .iter()
        .any(|(file, diagnostics)| *file == util && diagnostics.is_empty()));
    assert!(h.scope().read().diagnostics(util).is_empty());
    assert_eq!(h.compile().outcome, CompileOutcome::UpToDate);
}

#[test]
fn classpath_classes_resolve() {
    let libs = tempfile::tempdir().unwrap();
    std::fs::write(libs.path().join("Missing.class"), b"").unwrap();
    let resolver = std::sync::Arc::new(grove_test_utils::FakeResolver::new());
    resolver.set_default_entries(&[libs.path().to_path_buf()]);

    let h = Harness::with_resolver(
        &[
            ("src/Util.groovy", UTIL_MISSING),
            ("src/Main.groovy", MAIN),
        ],
        resolver,
        |_| {},
    );
    let report = h.compile();

    assert!(report.published.is_empty());
    assert!(h
        .scope()
        .read()
        .diagnostics(h.file("src/Util.groovy"))
        .is_empty());
}
