use std::collections::HashSet;

use grove_vfs::FileChange;
use grove_workspace::{CompileOutcome, FullCompileReason};

use super::support::{basic_files, Harness, MAIN, UTIL};

const UTIL_BODY_EDIT: &str = "\
class Util {
    int size(String name) {
        def trimmed = name
    }
}
";

const MAIN_BODY_EDIT: &str = "\
class Main {
    Util util
    void run() {
        def u = new Util()
        def again = new Util()
    }
}
";

#[test]
fn first_compile_is_full_and_second_is_up_to_date() {
    let h = Harness::new(&basic_files());

    let report = h.compile();
    assert_eq!(
        report.outcome,
        CompileOutcome::Full {
            files: 3,
            reason: FullCompileReason::NotCompiled
        }
    );
    assert_eq!(h.pending(), 0);
    assert_eq!(h.compiler.compile_count(), 1);

    let again = h.compile();
    assert_eq!(again.outcome, CompileOutcome::UpToDate);
    assert_eq!(h.compiler.compile_count(), 1);

    let scope = h.scope();
    let state = scope.read();
    assert!(state.is_compiled());
    assert_eq!(state.declaring_file("Util"), Some(h.file("src/Util.groovy")));
    assert_eq!(state.declaring_file("Main"), Some(h.file("src/Main.groovy")));
}

#[test]
fn body_edit_compiles_only_the_changed_file() {
    let h = Harness::new(&basic_files());
    h.compile();

    h.open("src/Util.groovy", UTIL_BODY_EDIT);
    let report = h.compile();

    assert_eq!(report.outcome, CompileOutcome::Incremental { files: 1 });
    assert_eq!(h.compiler.last_files(), vec![h.path("src/Util.groovy")]);
    assert_eq!(h.pending(), 0);
}

#[test]
fn working_set_pulls_in_forward_dependencies() {
    let h = Harness::new(&basic_files());
    h.compile();

    h.open("src/Main.groovy", MAIN_BODY_EDIT);
    let report = h.compile();

    assert_eq!(report.outcome, CompileOutcome::Incremental { files: 2 });
    assert_eq!(
        h.compiler.last_files(),
        vec![h.path("src/Main.groovy"), h.path("src/Util.groovy")]
    );
}

#[test]
fn context_file_joins_the_working_set() {
    let h = Harness::new(&basic_files());
    h.compile();

    h.open("src/Util.groovy", UTIL_BODY_EDIT);
    let report = h.compile_at("src/Other.groovy");

    assert_eq!(report.outcome, CompileOutcome::Incremental { files: 2 });
    assert_eq!(
        h.compiler.last_files(),
        vec![h.path("src/Other.groovy"), h.path("src/Util.groovy")]
    );
    assert_eq!(
        h.scope().read().previous_context(),
        Some(h.file("src/Other.groovy"))
    );
}

#[test]
fn reopening_unchanged_text_still_recompiles_once() {
    let h = Harness::new(&basic_files());
    h.compile();

    h.open("src/Main.groovy", MAIN);
    assert_eq!(h.pending(), 1);
    assert!(h.compile().is_incremental());
    assert_eq!(h.compile().outcome, CompileOutcome::UpToDate);
}

#[test]
fn dependency_graph_tracks_class_references() {
    let h = Harness::new(&basic_files());
    h.compile();

    let util = h.file("src/Util.groovy");
    let main = h.file("src/Main.groovy");
    let other = h.file("src/Other.groovy");

    let scope = h.scope();
    let state = scope.read();
    let dependents = state.graph().transitive_dependents(&HashSet::from([util]));
    assert!(dependents.contains(&main));
    assert!(!dependents.contains(&other));
    assert_eq!(state.graph().dependencies(main).collect::<Vec<_>>(), vec![util]);
}

#[test]
fn edits_after_an_incremental_compile_keep_the_graph() {
    let h = Harness::new(&basic_files());
    h.compile();

    h.open("src/Main.groovy", MAIN_BODY_EDIT);
    assert!(h.compile().is_incremental());
    h.open("src/Util.groovy", UTIL_BODY_EDIT);
    assert!(h.compile().is_incremental());
    h.open("src/Util.groovy", UTIL);
    assert!(h.compile().is_incremental());

    let util = h.file("src/Util.groovy");
    let main = h.file("src/Main.groovy");
    let scope = h.scope();
    let state = scope.read();
    assert!(state
        .graph()
        .transitive_dependents(&HashSet::from([util]))
        .contains(&main));
}

#[test]
fn closed_document_text_is_served_until_the_watcher_reports_a_change() {
    let h = Harness::new(&basic_files());
    h.compile();
    let util = h.path("src/Util.groovy");

    h.open("src/Util.groovy", UTIL_BODY_EDIT);
    assert!(h.compile().is_incremental());

    h.workspace.close_document(&util);
    assert!(h.compile().is_incremental());
    let text = h.workspace.tracker().contents(&util).unwrap();
    assert_eq!(text.as_str(), UTIL_BODY_EDIT);

    h.workspace.apply_file_changes(&[FileChange::modified(util.clone())]);
    assert!(h.compile().is_incremental());
    let text = h.workspace.tracker().contents(&util).unwrap();
    assert_eq!(text.as_str(), UTIL);
}
