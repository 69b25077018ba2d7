use grove_core::Severity;
use grove_workspace::{CompileOutcome, FullCompileReason};

use super::support::{basic_files, Harness, UTIL};

const UTIL_NEW_METHOD: &str = "\
class Util {
    int size(String name) {
    }
    int count() {
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

const UTIL_STRAY_BRACE: &str = "\
class Util {
    int size(String name) {
    }
}
}
";

#[test]
fn signature_change_falls_back_to_full_compile() {
    let h = Harness::new(&basic_files());
    h.compile();
    let before = h.compiler.compile_count();

    h.open("src/Util.groovy", UTIL_NEW_METHOD);
    let report = h.compile();

    assert_eq!(
        report.outcome,
        CompileOutcome::Full {
            files: 3,
            reason: FullCompileReason::SignatureDrift
        }
    );
    // The discarded incremental attempt plus the full compile.
    assert_eq!(h.compiler.compile_count(), before + 2);

    let scope = h.scope();
    let state = scope.read();
    let util = state.classes_in(h.file("src/Util.groovy"));
    assert_eq!(util.len(), 1);
    assert_eq!(util[0].methods.len(), 2);
}

#[test]
fn new_class_counts_as_drift() {
    let h = Harness::new(&basic_files());
    h.compile();

    h.open("src/Other.groovy", "class Other {\n}\nclass Extra {\n}\n");
    let report = h.compile();

    assert_eq!(report.full_reason(), Some(FullCompileReason::SignatureDrift));
    assert_eq!(
        h.scope().read().declaring_file("Extra"),
        Some(h.file("src/Other.groovy"))
    );
}

#[test]
fn removed_class_counts_as_drift() {
    let h = Harness::new(&basic_files());
    h.compile();

    h.open("src/Other.groovy", "// nothing left\n");
    let report = h.compile();

    assert_eq!(report.full_reason(), Some(FullCompileReason::SignatureDrift));
    assert_eq!(h.scope().read().declaring_file("Other"), None);
}

#[test]
fn too_many_changes_skip_the_incremental_attempt() {
    let h = Harness::with_config(&basic_files(), |config| {
        config.compile.max_incremental_changes = 1;
    });
    h.compile();
    let before = h.compiler.compile_count();

    h.open("src/Util.groovy", UTIL_BODY_EDIT);
    h.open("src/Other.groovy", "class Other {\n    void ping() {\n        def x = 1\n    }\n}\n");
    let report = h.compile();

    assert_eq!(report.full_reason(), Some(FullCompileReason::TooManyChanges));
    assert_eq!(h.compiler.compile_count(), before + 1);
}

#[test]
fn oversized_working_set_falls_back() {
    let h = Harness::with_config(&basic_files(), |config| {
        config.compile.max_working_set = 1;
    });
    h.compile();

    h.open(
        "src/Main.groovy",
        "class Main {\n    Util util\n    void run() {\n        def v = new Util()\n    }\n}\n",
    );
    let report = h.compile();

    assert_eq!(report.full_reason(), Some(FullCompileReason::WorkingSetTooLarge));
}

#[test]
fn internal_failure_keeps_previous_state_and_pending_files() {
    let h = Harness::new(&basic_files());
    h.compile();
    h.compiler.set_failing(Some("compiler crashed".to_owned()));

    h.open("src/Util.groovy", UTIL_NEW_METHOD);
    let report = h.compile();

    assert_eq!(report.outcome, CompileOutcome::Failed);
    assert!(report.published.is_empty());
    assert_eq!(h.pending(), 1);
    {
        let scope = h.scope();
        let state = scope.read();
        assert!(state.is_compiled());
        assert_eq!(state.classes_in(h.file("src/Util.groovy"))[0].methods.len(), 1);
    }

    // Failing again stays quiet and still keeps the file pending.
    assert_eq!(h.compile().outcome, CompileOutcome::Failed);
    assert_eq!(h.pending(), 1);

    h.compiler.set_failing(None);
    let report = h.compile();
    assert_eq!(report.full_reason(), Some(FullCompileReason::SignatureDrift));
    assert_eq!(h.pending(), 0);
    assert_eq!(
        h.scope().read().classes_in(h.file("src/Util.groovy"))[0]
            .methods
            .len(),
        2
    );
}

#[test]
fn failed_first_compile_is_retried() {
    let h = Harness::new(&basic_files());
    h.compiler.fail_next("out of memory");

    assert_eq!(h.compile().outcome, CompileOutcome::Failed);
    assert!(!h.scope().read().is_compiled());

    let report = h.compile();
    assert_eq!(report.full_reason(), Some(FullCompileReason::NotCompiled));
    assert!(h.scope().read().is_compiled());
}

#[test]
fn flaky_incremental_compile_recovers_with_full_compile() {
    let h = Harness::new(&basic_files());
    h.compile();
    h.compiler.fail_next("transient");

    h.open("src/Util.groovy", UTIL_BODY_EDIT);
    let report = h.compile();

    assert_eq!(report.full_reason(), Some(FullCompileReason::IncrementalFailed));
    assert_eq!(h.pending(), 0);
}

#[test]
fn syntax_error_publishes_diagnostics_and_keeps_the_previous_ast() {
    let h = Harness::new(&basic_files());
    h.compile();
    let util = h.file("src/Util.groovy");

    h.open("src/Util.groovy", UTIL_STRAY_BRACE);
    let report = h.compile();

    assert!(report.is_full());
    let (_, published) = report
        .published
        .iter()
        .find(|(file, _)| *file == util)
        .expect("diagnostics for Util");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].severity, Severity::Error);

    let scope = h.scope();
    let state = scope.read();
    assert_eq!(state.declaring_file("Util"), Some(util));
    assert_eq!(state.diagnostics(util), published.as_slice());
    drop(state);

    h.open("src/Util.groovy", UTIL);
    let report = h.compile();
    assert!(report
        .published
        .iter()
        .any(|(file, diagnostics)| *file == util && diagnostics.is_empty()));
    assert!(h.scope().read().diagnostics(util).is_empty());
}

#[test]
fn deleted_file_leaves_the_unit() {
    let h = Harness::new(&basic_files());
    h.compile();
    let other = h.file("src/Other.groovy");

    let path = h.project.remove("src/Other.groovy");
    h.workspace
        .apply_file_changes(&[grove_vfs::FileChange::deleted(path)]);
    let report = h.compile();

    assert_eq!(
        report.outcome,
        CompileOutcome::Full {
            files: 2,
            reason: FullCompileReason::UnreadableSource
        }
    );
    let scope = h.scope();
    let state = scope.read();
    assert_eq!(state.declaring_file("Other"), None);
    assert!(!state.unit().unwrap().contains(other));
}

#[test]
fn created_file_joins_the_unit() {
    let h = Harness::new(&basic_files());
    h.compile();

    let path = h.project.write("src/Extra.groovy", "class Extra {\n}\n");
    h.workspace
        .apply_file_changes(&[grove_vfs::FileChange::created(path)]);
    let report = h.compile();

    // A file the scope has never seen has no signatures to compare against.
    assert_eq!(report.full_reason(), Some(FullCompileReason::SignatureDrift));
    assert_eq!(
        h.scope().read().declaring_file("Extra"),
        Some(h.file("src/Extra.groovy"))
    );
}

#[test]
fn classpath_change_rebuilds_the_unit() {
    let h = Harness::new(&basic_files());
    h.compile();

    h.workspace.resolve_classpath(h.root()).unwrap();
    let report = h.compile();

    assert_eq!(
        report.outcome,
        CompileOutcome::Full {
            files: 3,
            reason: FullCompileReason::EnvironmentChanged
        }
    );
}
