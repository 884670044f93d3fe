//! End-to-end scenarios exercising the whole synchronize flow through a
//! `Session` with a counting identity engine.

use std::cell::RefCell;

use spindle_editor_core::engine::{EngineError, MarkupEngine};
use spindle_editor_core::keydown::{Key, KeyEvent, KeydownResult};
use spindle_editor_core::session::{EditorOptions, Session};
use spindle_markup::position::CursorPosition;
use spindle_markup::{NodeId, NodeKind, Selection, Tree};
use web_time::{Duration, Instant};

/// Identity engine that counts spin calls, so tests can assert that
/// suppressed edits never reach the engine.
#[derive(Default)]
struct CountingEngine {
    spins: RefCell<usize>,
}

impl MarkupEngine for CountingEngine {
    fn spin_incremental(&self, markup: &str) -> Result<String, EngineError> {
        *self.spins.borrow_mut() += 1;
        Ok(markup.to_owned())
    }

    fn markup_to_markdown(&self, markup: &str) -> Result<String, EngineError> {
        Ok(markup.to_owned())
    }

    fn markdown_to_markup(&self, markdown: &str) -> Result<String, EngineError> {
        Ok(markdown.to_owned())
    }
}

fn session(markup: &str) -> (Session<CountingEngine>, Instant) {
    let now = Instant::now();
    let mut session = Session::new(
        CountingEngine::default(),
        (),
        (),
        EditorOptions::default(),
        now,
    );
    session.load_markup(markup, now).unwrap();
    (session, now)
}

fn text_node(tree: &Tree, needle: &str) -> NodeId {
    tree.descendants(tree.root())
        .into_iter()
        .find(|&n| matches!(tree.kind(n), NodeKind::Text(t) if t == needle))
        .unwrap()
}

#[test]
fn collapse_is_idempotent() {
    let (mut session, now) = session(
        "<h2>Title</h2><p>a <em data-marker=\"*\">b</em> c</p>\
         <ul><li>one</li><li>two</li></ul>",
    );
    let t = text_node(session.tree(), "one");
    session.handle_caret_moved(CursorPosition::new(t, 2));

    session.synchronize(now, false).unwrap();
    let first = session.markup();
    let focus = session.selection().unwrap().focus;
    session.synchronize(now + Duration::from_millis(1), false).unwrap();
    let second = session.markup();

    assert_eq!(first, second);
    // The recovered caret is stable as well.
    assert_eq!(session.selection().unwrap().focus.offset, focus.offset);
}

#[test]
fn cursor_survives_round_trip() {
    let (mut session, now) = session("<p>alpha beta</p>");
    let t = text_node(session.tree(), "alpha beta");
    session.handle_caret_moved(CursorPosition::new(t, 7));
    session.synchronize(now, false).unwrap();

    let focus = session.selection().unwrap().focus;
    assert_eq!(focus.offset, 7);
    assert!(matches!(
        session.tree().kind(focus.node),
        NodeKind::Text(t) if t == "alpha beta"
    ));
}

#[test]
fn range_selection_ends_collapsed() {
    let (mut session, now) = session("<p>select me</p>");
    let t = text_node(session.tree(), "select me");
    session.set_selection(Some(Selection::new(
        CursorPosition::new(t, 2),
        CursorPosition::new(t, 8),
    )));
    session.synchronize(now, false).unwrap();
    assert!(session.selection().unwrap().is_collapsed());
}

#[test]
fn leading_spaces_suppress_the_engine_call() {
    let (mut session, now) = session("<p>    </p>");
    let t = text_node(session.tree(), "    ");
    session.set_selection(Some(Selection::caret(CursorPosition::new(t, 4))));
    let before = session.markup();

    session.synchronize(now, false).unwrap();

    assert_eq!(session.markup(), before);
    assert_eq!(*session.engine().spins.borrow(), 0);
}

#[test]
fn scenario_typing_into_a_paragraph() {
    let (mut session, now) = session("<p>hello</p>");
    let t = text_node(session.tree(), "hello");
    session.handle_caret_moved(CursorPosition::new(t, 3));

    session.insert_text("p", now).unwrap();

    assert_eq!(session.markup(), "<p>helplo</p>");
    let focus = session.selection().unwrap().focus;
    assert_eq!(focus.offset, 4);
    assert!(matches!(
        session.tree().kind(focus.node),
        NodeKind::Text(t) if t == "helplo"
    ));
}

#[test]
fn scenario_enter_at_heading_start() {
    let (mut session, now) = session("<h1>Title</h1>");
    let t = text_node(session.tree(), "Title");
    session.handle_caret_moved(CursorPosition::new(t, 0));

    let result = session
        .handle_keydown(KeyEvent::plain(Key::Enter), now)
        .unwrap();

    assert!(matches!(result, KeydownResult::Handled { .. }));
    assert_eq!(session.markup(), "<p></p><h1>Title</h1>");
    let focus = session.selection().unwrap().focus;
    let first = session.tree().children(session.tree().root())[0];
    assert_eq!(focus, CursorPosition::start_of(first));
}

#[test]
fn scenario_adjacent_spans_both_expand() {
    let (mut session, _) = session(
        "<p><em data-marker=\"*\">em</em><strong data-marker=\"**\">str</strong></p>",
    );
    let em_text = text_node(session.tree(), "em");
    // Caret exactly between the closing emphasis marker and the opening
    // strong marker.
    session.handle_caret_moved(CursorPosition::new(em_text, 2));

    let expanded = session.expansion().expanded();
    assert_eq!(expanded.len(), 2);
    let kinds: Vec<_> = expanded
        .iter()
        .map(|&n| session.tree().kind(n).as_span().unwrap().kind.clone())
        .collect();
    assert_eq!(
        kinds,
        vec![
            spindle_markup::SpanKind::Emphasis,
            spindle_markup::SpanKind::Strong
        ]
    );
}

#[test]
fn scenario_five_keystrokes_one_undo() {
    let (mut session, now) = session("<p>hello</p>");
    let t = text_node(session.tree(), "hello");
    session.handle_caret_moved(CursorPosition::new(t, 5));

    let mut at = now;
    for ch in ["a", "b", "c", "d", "e"] {
        at += Duration::from_millis(50);
        session.insert_text(ch, at).unwrap();
        // The debounced batch fires between keystrokes.
        session.flush_side_effects(at + Duration::from_millis(15));
    }
    assert_eq!(session.markup(), "<p>helloabcde</p>");

    assert!(session.undo(at + Duration::from_secs(1)).unwrap());
    assert_eq!(session.markup(), "<p>hello</p>");
    // A single step was enough; there is nothing further to undo.
    assert!(!session.can_undo());
    assert!(session.can_redo());
}

#[test]
fn undo_then_redo_round_trips() {
    let (mut session, now) = session("<p>base</p>");
    let t = text_node(session.tree(), "base");
    session.handle_caret_moved(CursorPosition::new(t, 4));
    session.insert_text("!", now).unwrap();
    session.flush_side_effects(now + Duration::from_millis(15));
    assert_eq!(session.markup(), "<p>base!</p>");

    session.undo(now + Duration::from_secs(1)).unwrap();
    assert_eq!(session.markup(), "<p>base</p>");
    session.redo(now + Duration::from_secs(2)).unwrap();
    assert_eq!(session.markup(), "<p>base!</p>");
}

#[test]
fn undo_restores_cursor_from_snapshot() {
    let (mut session, now) = session("<p>word</p>");
    let t = text_node(session.tree(), "word");
    session.handle_caret_moved(CursorPosition::new(t, 2));
    session.insert_text("X", now).unwrap();
    session.flush_side_effects(now + Duration::from_millis(15));

    session.undo(now + Duration::from_secs(1)).unwrap();
    let focus = session.selection().unwrap().focus;
    assert_eq!(focus.offset, 0);
    assert!(matches!(
        session.tree().kind(focus.node),
        NodeKind::Text(t) if t == "word"
    ));
}

#[test]
fn fragment_paste_snapshots_immediately() {
    let (mut session, now) = session("<p>doc</p>");
    let t = text_node(session.tree(), "doc");
    session.handle_caret_moved(CursorPosition::new(t, 3));

    session
        .insert_fragment("<h2>Pasted</h2><p>tail</p>", now)
        .unwrap();
    session.flush_side_effects(now + Duration::from_millis(15));
    assert_eq!(session.markup(), "<p>doc</p><h2>Pasted</h2><p>tail</p>");

    session.undo(now + Duration::from_secs(1)).unwrap();
    assert_eq!(session.markup(), "<p>doc</p>");
}

#[test]
fn outline_and_count_come_from_the_flush() {
    let (mut session, now) = session("<h1>A</h1><p>bcd</p><h2>E</h2>");
    let t = text_node(session.tree(), "bcd");
    session.handle_caret_moved(CursorPosition::new(t, 3));
    session.insert_text("!", now).unwrap();

    let report = session
        .flush_side_effects(now + Duration::from_millis(15))
        .unwrap();
    let levels: Vec<u8> = report.outline.iter().map(|i| i.level).collect();
    assert_eq!(levels, vec![1, 2]);
    assert_eq!(report.char_count, Some(6));
    assert_eq!(report.markdown.as_deref(), Some("<h1>A</h1><p>bcd!</p><h2>E</h2>"));
}
