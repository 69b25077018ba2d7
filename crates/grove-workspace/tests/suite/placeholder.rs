use grove_core::{Position, Range};
use grove_test_utils::extract_caret;
use grove_vfs::ContentChange;
use grove_workspace::SymbolKind;

use super::support::{basic_files, Harness};

const PLACEHOLDER: &str = "GROVE_PLACEHOLDER";

const MAIN_WITH_CARET: &str = "\
class Main {
    Util util
    void run() {
        def u = new Util()
        /*caret*/
    }
}
";

fn opened_main() -> (Harness, String, Position) {
    let h = Harness::new(&basic_files());
    let (text, caret) = extract_caret(MAIN_WITH_CARET);
    h.open("src/Main.groovy", &text);
    h.compile();
    assert_eq!(h.pending(), 0);
    (h, text, caret)
}

#[test]
fn placeholder_is_visible_to_the_reader() {
    let (h, _, caret) = opened_main();
    let inside = Position::new(caret.line, caret.character + 2);

    let symbol = h
        .workspace
        .with_placeholder(&h.path("src/Main.groovy"), caret, PLACEHOLDER, |state, file| {
            state.symbol_at(file, inside).cloned()
        })
        .flatten()
        .expect("placeholder symbol");

    assert_eq!(symbol.name, PLACEHOLDER);
    assert_eq!(symbol.kind, SymbolKind::Reference);
}

#[test]
fn placeholder_compiles_once_and_restores_the_text() {
    let (h, text, caret) = opened_main();
    let before = h.compiler.compile_count();
    let main = h.path("src/Main.groovy");

    let seen = h
        .workspace
        .with_placeholder(&main, caret, PLACEHOLDER, |state, file| {
            state.ast().get(file).is_some()
        });

    assert_eq!(seen, Some(true));
    assert_eq!(h.compiler.compile_count(), before + 1);
    let restored = h.workspace.tracker().contents(&main).unwrap();
    assert_eq!(restored.as_str(), text);
    assert_eq!(h.workspace.tracker().version(&main), Some(1));

    // The restored text is compiled by the next request, not by the placeholder call.
    assert_eq!(h.pending(), 1);
    let inside = Position::new(caret.line, caret.character + 2);
    h.compile_at("src/Main.groovy");
    assert_eq!(h.pending(), 0);
    let file = h.file("src/Main.groovy");
    assert!(h.scope().read().symbol_at(file, inside).is_none());
}

#[test]
fn edit_during_placeholder_compile_survives_the_restore() {
    let (h, text, caret) = opened_main();
    let main = h.path("src/Main.groovy");
    let tracker = h.workspace.tracker();

    let seen_during = h
        .workspace
        .with_placeholder(&main, caret, PLACEHOLDER, |_, _| {
            tracker
                .change(
                    &main,
                    2,
                    &[ContentChange::replace(
                        Range::point(Position::new(0, 0)),
                        "// note\n",
                    )],
                )
                .unwrap();
            tracker.contents(&main).unwrap()
        })
        .unwrap();
    assert!(seen_during.contains(PLACEHOLDER));

    let after = tracker.contents(&main).unwrap();
    assert!(!after.contains(PLACEHOLDER), "{after}");
    assert_eq!(after.as_str(), format!("// note\n{text}"));
    assert_eq!(tracker.version(&main), Some(2));
    assert_eq!(h.pending(), 1);
}

#[test]
fn placeholder_requires_an_open_document() {
    let h = Harness::new(&basic_files());
    h.compile();
    let before = h.compiler.compile_count();

    let result = h.workspace.with_placeholder(
        &h.path("src/Util.groovy"),
        Position::new(1, 0),
        PLACEHOLDER,
        |_, _| (),
    );

    assert!(result.is_none());
    assert_eq!(h.compiler.compile_count(), before);
}

#[test]
fn placeholder_outside_the_document_is_rejected() {
    let (h, text, _) = opened_main();

    let result = h.workspace.with_placeholder(
        &h.path("src/Main.groovy"),
        Position::new(400, 0),
        PLACEHOLDER,
        |_, _| (),
    );

    assert!(result.is_none());
    let current = h
        .workspace
        .tracker()
        .contents(&h.path("src/Main.groovy"))
        .unwrap();
    assert_eq!(current.as_str(), text);
    assert_eq!(h.pending(), 0);
}
