//! Programmatic editing commands.
//!
//! The semantic half of a toolbar: each command rewrites the tree around
//! the current selection. The session runs the round-trip pipeline after a
//! command and records an immediate, non-coalesced undo snapshot.

use spindle_markup::{
    BlockKind, CursorPosition, NodeKind, Selection, SpanKind, SpanNode, Tree,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleEmphasis,
    ToggleStrong,
    ToggleStrikethrough,
    ToggleInlineCode,
    SetHeading(u8),
    RemoveHeading,
    ToggleBlockquote,
    InsertThematicBreak,
}

impl Command {
    fn span_kind(&self) -> Option<SpanKind> {
        match self {
            Command::ToggleEmphasis => Some(SpanKind::Emphasis),
            Command::ToggleStrong => Some(SpanKind::Strong),
            Command::ToggleStrikethrough => Some(SpanKind::Strikethrough),
            Command::ToggleInlineCode => Some(SpanKind::Code),
            _ => None,
        }
    }
}

/// Apply `command` around the current selection. Returns whether the tree
/// changed; a command whose precondition does not hold is a no-op.
pub fn apply(tree: &mut Tree, selection: &mut Option<Selection>, command: Command) -> bool {
    if let Some(kind) = command.span_kind() {
        return toggle_span(tree, selection, kind);
    }
    let Some(sel) = *selection else {
        return false;
    };
    let caret = sel.focus;
    match command {
        Command::SetHeading(level) => {
            let level = level.clamp(1, 6);
            let Some(block) = tree.nearest_block(caret.node) else {
                return false;
            };
            match tree.kind(block) {
                NodeKind::Block(BlockKind::Paragraph | BlockKind::Heading(_)) => {
                    *tree.kind_mut(block) = NodeKind::Block(BlockKind::Heading(level));
                    true
                }
                _ => false,
            }
        }
        Command::RemoveHeading => {
            let Some(block) = tree.nearest_block(caret.node) else {
                return false;
            };
            if matches!(tree.kind(block), NodeKind::Block(BlockKind::Heading(_))) {
                *tree.kind_mut(block) = NodeKind::Block(BlockKind::Paragraph);
                true
            } else {
                false
            }
        }
        Command::ToggleBlockquote => toggle_blockquote(tree, caret),
        Command::InsertThematicBreak => {
            let Some(block) = tree.top_level_block(caret.node) else {
                return false;
            };
            let rule = tree.alloc(NodeKind::Block(BlockKind::ThematicBreak));
            let paragraph = tree.alloc(NodeKind::Block(BlockKind::Paragraph));
            tree.insert_after(block, rule);
            tree.insert_after(rule, paragraph);
            *selection = Some(Selection::caret(CursorPosition::start_of(paragraph)));
            true
        }
        _ => false,
    }
}

fn toggle_span(tree: &mut Tree, selection: &mut Option<Selection>, kind: SpanKind) -> bool {
    let Some(sel) = *selection else {
        return false;
    };
    // Inside a span of this kind: unwrap it, content stays in place.
    if let Some(span) = tree.nearest_span(sel.focus.node) {
        let matches_kind = tree
            .kind(span)
            .as_span()
            .is_some_and(|s| s.kind == kind);
        if matches_kind {
            let children = tree.children(span).to_vec();
            tree.replace_with(span, &children);
            return true;
        }
    }
    // A range within one text run: wrap it.
    if sel.is_collapsed() || sel.anchor.node != sel.focus.node {
        return false;
    }
    let NodeKind::Text(text) = tree.kind(sel.focus.node).clone() else {
        return false;
    };
    let (lo, hi) = if sel.anchor.offset <= sel.focus.offset {
        (sel.anchor.offset, sel.focus.offset)
    } else {
        (sel.focus.offset, sel.anchor.offset)
    };
    let lo_byte = byte_of_char(&text, lo);
    let hi_byte = byte_of_char(&text, hi);
    if lo_byte == hi_byte {
        return false;
    }

    let span = tree.alloc(NodeKind::Span(SpanNode::with_default_markers(kind)));
    let mid = tree.alloc_text(&text[lo_byte..hi_byte]);
    tree.append_child(span, mid);
    let mut replacements = Vec::new();
    if lo_byte > 0 {
        replacements.push(tree.alloc_text(&text[..lo_byte]));
    }
    replacements.push(span);
    if hi_byte < text.len() {
        replacements.push(tree.alloc_text(&text[hi_byte..]));
    }
    tree.replace_with(sel.focus.node, &replacements);
    *selection = Some(Selection::caret(CursorPosition::end_of(tree, mid)));
    true
}

fn toggle_blockquote(tree: &mut Tree, caret: CursorPosition) -> bool {
    if let Some(quote) = tree.nearest_block_of(caret.node, BlockKind::Blockquote) {
        let children = tree.children(quote).to_vec();
        tree.replace_with(quote, &children);
        return true;
    }
    let Some(block) = tree.nearest_block(caret.node) else {
        return false;
    };
    let quote = tree.alloc(NodeKind::Block(BlockKind::Blockquote));
    tree.insert_before(block, quote);
    tree.append_child(quote, block);
    true
}

fn byte_of_char(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_markup::{NodeId, inner_markup, parse_document};

    fn text_node(tree: &Tree, needle: &str) -> NodeId {
        tree.descendants(tree.root())
            .into_iter()
            .find(|&n| matches!(tree.kind(n), NodeKind::Text(t) if t == needle))
            .unwrap()
    }

    #[test]
    fn test_wrap_selection_in_strong() {
        let mut tree = parse_document("<p>make this bold</p>").unwrap();
        let t = text_node(&tree, "make this bold");
        let mut sel = Some(Selection::new(
            CursorPosition::new(t, 5),
            CursorPosition::new(t, 9),
        ));
        assert!(apply(&mut tree, &mut sel, Command::ToggleStrong));
        assert_eq!(
            inner_markup(&tree, tree.root()),
            "<p>make <strong data-marker=\"**\">this</strong> bold</p>"
        );
        assert!(sel.unwrap().is_collapsed());
    }

    #[test]
    fn test_unwrap_existing_emphasis() {
        let mut tree = parse_document("<p>a<em data-marker=\"*\">b</em>c</p>").unwrap();
        let t = text_node(&tree, "b");
        let mut sel = Some(Selection::caret(CursorPosition::new(t, 1)));
        assert!(apply(&mut tree, &mut sel, Command::ToggleEmphasis));
        assert_eq!(inner_markup(&tree, tree.root()), "<p>abc</p>");
    }

    #[test]
    fn test_collapsed_toggle_outside_span_is_noop() {
        let mut tree = parse_document("<p>plain</p>").unwrap();
        let t = text_node(&tree, "plain");
        let mut sel = Some(Selection::caret(CursorPosition::new(t, 2)));
        assert!(!apply(&mut tree, &mut sel, Command::ToggleEmphasis));
        assert_eq!(inner_markup(&tree, tree.root()), "<p>plain</p>");
    }

    #[test]
    fn test_set_and_remove_heading() {
        let mut tree = parse_document("<p>title</p>").unwrap();
        let t = text_node(&tree, "title");
        let mut sel = Some(Selection::caret(CursorPosition::new(t, 0)));
        assert!(apply(&mut tree, &mut sel, Command::SetHeading(3)));
        assert_eq!(inner_markup(&tree, tree.root()), "<h3>title</h3>");
        assert!(apply(&mut tree, &mut sel, Command::RemoveHeading));
        assert_eq!(inner_markup(&tree, tree.root()), "<p>title</p>");
    }

    #[test]
    fn test_toggle_blockquote_both_ways() {
        let mut tree = parse_document("<p>q</p>").unwrap();
        let t = text_node(&tree, "q");
        let mut sel = Some(Selection::caret(CursorPosition::new(t, 0)));
        assert!(apply(&mut tree, &mut sel, Command::ToggleBlockquote));
        assert_eq!(
            inner_markup(&tree, tree.root()),
            "<blockquote><p>q</p></blockquote>"
        );
        assert!(apply(&mut tree, &mut sel, Command::ToggleBlockquote));
        assert_eq!(inner_markup(&tree, tree.root()), "<p>q</p>");
    }

    #[test]
    fn test_insert_thematic_break() {
        let mut tree = parse_document("<p>end</p>").unwrap();
        let t = text_node(&tree, "end");
        let mut sel = Some(Selection::caret(CursorPosition::new(t, 3)));
        assert!(apply(&mut tree, &mut sel, Command::InsertThematicBreak));
        assert_eq!(inner_markup(&tree, tree.root()), "<p>end</p><hr><p></p>");
        let focus = sel.unwrap().focus;
        assert_eq!(
            tree.kind(focus.node).as_block(),
            Some(BlockKind::Paragraph)
        );
    }
}
