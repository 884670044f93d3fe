//! Cursor marker protocol.
//!
//! A collapsed cursor position cannot survive a render scope being replaced
//! wholesale, so the pipeline encodes it as a zero-width sentinel node before
//! serialization and decodes it back after reparse. At most one sentinel is
//! alive in a tree at any time; the pipeline removes it before returning
//! control to the user.

use spindle_markup::{CursorPosition, NodeId, NodeKind, Tree};

/// Zero-width joiner inserted after an emphasis/strong/strikethrough span
/// when the cursor lands on its trailing boundary. Host surfaces otherwise
/// refuse to place the caret outside the span.
pub const BOUNDARY_JOIN: char = '\u{200D}';

/// Insert the sentinel at `position`, splitting a text run if the position
/// falls inside one.
pub fn place_marker(tree: &mut Tree, position: CursorPosition) -> NodeId {
    let marker = tree.alloc(NodeKind::Marker);
    match tree.kind(position.node).clone() {
        NodeKind::Text(text) => {
            let len = text.chars().count();
            if position.offset == 0 {
                tree.insert_before(position.node, marker);
            } else if position.offset >= len {
                tree.insert_after(position.node, marker);
            } else {
                let split = text
                    .char_indices()
                    .nth(position.offset)
                    .map(|(i, _)| i)
                    .unwrap_or(text.len());
                let (head, tail) = text.split_at(split);
                let tail = tree.alloc_text(tail);
                *tree.kind_mut(position.node) = NodeKind::Text(head.to_owned());
                tree.insert_after(position.node, marker);
                tree.insert_after(marker, tail);
            }
        }
        _ => {
            let at = tree.children(position.node).get(position.offset).copied();
            match at {
                Some(sibling) => tree.insert_before(sibling, marker),
                None => tree.append_child(position.node, marker),
            }
        }
    }
    marker
}

/// Find the sentinel, derive a cursor position from its neighbors, and
/// remove it.
///
/// Returns `None` when no sentinel survived the round trip; the caller
/// leaves the prior selection untouched in that case.
pub fn recover_from_marker(tree: &mut Tree) -> Option<CursorPosition> {
    let marker = tree.find_marker()?;
    let parent = tree.parent(marker)?;
    let prev = tree.prev_sibling(marker);
    let next = tree.next_sibling(marker);

    let position = match prev {
        // No preceding sibling: anchor to whatever follows, or the parent.
        None => match next {
            Some(n) => CursorPosition::start_of(n),
            None => CursorPosition::start_of(parent),
        },
        Some(p) if tree.kind(p).is_text() => CursorPosition::end_of(tree, p),
        Some(p) => {
            let joins = tree
                .kind(p)
                .as_span()
                .is_some_and(|s| s.kind.needs_boundary_join());
            if joins {
                // Host caret-placement quirk at the span's trailing edge.
                match next {
                    Some(n) if tree.kind(n).is_text() => {
                        if let NodeKind::Text(t) = tree.kind_mut(n) {
                            t.insert(0, BOUNDARY_JOIN);
                        }
                        CursorPosition::new(n, 1)
                    }
                    _ => {
                        let join = tree.alloc_text(BOUNDARY_JOIN.to_string());
                        tree.insert_after(marker, join);
                        CursorPosition::new(join, 1)
                    }
                }
            } else {
                let deepest = tree.deepest_last_child(p);
                CursorPosition::end_of(tree, deepest)
            }
        }
    };

    tree.detach(marker);
    Some(merge_boundary_texts(tree, prev, next, position))
}

/// Detach the sentinel and re-join the text runs it split, without the
/// boundary normalization cursor recovery applies. Used when a round trip
/// aborts and the tree must come back byte-identical.
pub fn remove_marker(tree: &mut Tree) {
    let Some(marker) = tree.find_marker() else {
        return;
    };
    let prev = tree.prev_sibling(marker);
    let next = tree.next_sibling(marker);
    tree.detach(marker);
    let _ = join_texts(tree, prev, next);
}

/// If the cursor sits inside a rendered preview region, relocate it to the
/// end of the region's source-editing counterpart, or to the region's
/// boundary when no counterpart exists.
pub fn relocate_out_of_preview(tree: &Tree, position: CursorPosition) -> CursorPosition {
    let Some(preview) = tree
        .ancestors_inclusive(position.node)
        .find(|&n| matches!(tree.kind(n), NodeKind::Preview { .. }))
    else {
        return position;
    };
    let Some(fence) = tree.parent(preview) else {
        return position;
    };
    let source = tree
        .children(fence)
        .iter()
        .copied()
        .find(|&c| matches!(tree.kind(c), NodeKind::FenceCode));
    match source {
        Some(code) => CursorPosition::end_of(tree, tree.deepest_last_child(code)),
        None => CursorPosition::new(fence, tree.index_in_parent(preview).unwrap_or(0)),
    }
}

/// Re-join the text runs the marker split apart, keeping `position` valid.
fn merge_boundary_texts(
    tree: &mut Tree,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    position: CursorPosition,
) -> CursorPosition {
    let Some((a, b, left_len)) = join_texts(tree, prev, next) else {
        return position;
    };
    if position.node == b {
        CursorPosition::new(a, left_len + position.offset)
    } else {
        position
    }
}

/// Join two adjacent text runs into the left one. Returns the survivor,
/// the detached node, and the survivor's prior length in chars.
fn join_texts(
    tree: &mut Tree,
    prev: Option<NodeId>,
    next: Option<NodeId>,
) -> Option<(NodeId, NodeId, usize)> {
    let (a, b) = (prev?, next?);
    let (NodeKind::Text(left), NodeKind::Text(right)) = (tree.kind(a), tree.kind(b)) else {
        return None;
    };
    let left_len = left.chars().count();
    let joined = format!("{left}{right}");
    *tree.kind_mut(a) = NodeKind::Text(joined);
    tree.detach(b);
    Some((a, b, left_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_markup::{BlockKind, SpanKind, SpanNode};

    fn paragraph(tree: &mut Tree, text: &str) -> (NodeId, NodeId) {
        let p = tree.alloc(NodeKind::Block(BlockKind::Paragraph));
        let root = tree.root();
        tree.append_child(root, p);
        let t = tree.alloc_text(text);
        tree.append_child(p, t);
        (p, t)
    }

    #[test]
    fn test_round_trip_mid_text() {
        let mut tree = Tree::new();
        let (_, t) = paragraph(&mut tree, "hello");
        place_marker(&mut tree, CursorPosition::new(t, 3));
        assert!(tree.find_marker().is_some());

        let pos = recover_from_marker(&mut tree).unwrap();
        assert!(tree.find_marker().is_none());
        // Split runs are merged back into one.
        assert_eq!(tree.text_content(tree.root()), "hello");
        assert_eq!(pos.offset, 3);
        assert!(matches!(tree.kind(pos.node), NodeKind::Text(t) if t == "hello"));
    }

    #[test]
    fn test_round_trip_at_text_start() {
        let mut tree = Tree::new();
        let (_, t) = paragraph(&mut tree, "abc");
        place_marker(&mut tree, CursorPosition::new(t, 0));
        let pos = recover_from_marker(&mut tree).unwrap();
        assert_eq!(pos, CursorPosition::start_of(t));
    }

    #[test]
    fn test_recover_in_empty_block() {
        let mut tree = Tree::new();
        let p = tree.alloc(NodeKind::Block(BlockKind::Paragraph));
        let root = tree.root();
        tree.append_child(root, p);
        place_marker(&mut tree, CursorPosition::new(p, 0));
        let pos = recover_from_marker(&mut tree).unwrap();
        assert_eq!(pos, CursorPosition::start_of(p));
    }

    #[test]
    fn test_boundary_join_after_emphasis() {
        let mut tree = Tree::new();
        let p = tree.alloc(NodeKind::Block(BlockKind::Paragraph));
        let root = tree.root();
        tree.append_child(root, p);
        let em = tree.alloc(NodeKind::Span(SpanNode::with_default_markers(
            SpanKind::Emphasis,
        )));
        tree.append_child(p, em);
        let inner = tree.alloc_text("it");
        tree.append_child(em, inner);
        let after = tree.alloc_text("rest");
        tree.append_child(p, after);

        // Marker lands between the span and the trailing text.
        place_marker(&mut tree, CursorPosition::new(after, 0));
        let pos = recover_from_marker(&mut tree).unwrap();
        assert_eq!(pos, CursorPosition::new(after, 1));
        assert!(matches!(
            tree.kind(after),
            NodeKind::Text(t) if t.starts_with(BOUNDARY_JOIN)
        ));
    }

    #[test]
    fn test_end_of_code_span_no_join() {
        let mut tree = Tree::new();
        let p = tree.alloc(NodeKind::Block(BlockKind::Paragraph));
        let root = tree.root();
        tree.append_child(root, p);
        let code = tree.alloc(NodeKind::Span(SpanNode::with_default_markers(
            SpanKind::Code,
        )));
        tree.append_child(p, code);
        let inner = tree.alloc_text("xyz");
        tree.append_child(code, inner);

        place_marker(&mut tree, CursorPosition::new(p, 1));
        let pos = recover_from_marker(&mut tree).unwrap();
        assert_eq!(pos, CursorPosition::new(inner, 3));
        assert_eq!(tree.text_content(p), "xyz");
    }

    #[test]
    fn test_remove_marker_skips_boundary_normalization() {
        let mut tree = Tree::new();
        let p = tree.alloc(NodeKind::Block(BlockKind::Paragraph));
        let root = tree.root();
        tree.append_child(root, p);
        let em = tree.alloc(NodeKind::Span(SpanNode::with_default_markers(
            SpanKind::Emphasis,
        )));
        tree.append_child(p, em);
        let inner = tree.alloc_text("it");
        tree.append_child(em, inner);
        let after = tree.alloc_text("rest");
        tree.append_child(p, after);

        place_marker(&mut tree, CursorPosition::new(after, 0));
        remove_marker(&mut tree);
        assert!(tree.find_marker().is_none());
        // No zero-width joiner lands on the span's trailing edge.
        assert!(matches!(tree.kind(after), NodeKind::Text(t) if t == "rest"));
    }

    #[test]
    fn test_remove_marker_rejoins_split_text() {
        let mut tree = Tree::new();
        let (_, t) = paragraph(&mut tree, "hello");
        place_marker(&mut tree, CursorPosition::new(t, 3));
        remove_marker(&mut tree);
        assert!(matches!(tree.kind(t), NodeKind::Text(s) if s == "hello"));
    }

    #[test]
    fn test_missing_marker_is_none() {
        let mut tree = Tree::new();
        paragraph(&mut tree, "abc");
        assert!(recover_from_marker(&mut tree).is_none());
    }

    #[test]
    fn test_relocate_out_of_preview() {
        let mut tree = Tree::new();
        let pre = tree.alloc(NodeKind::Block(BlockKind::CodeFence));
        let root = tree.root();
        tree.append_child(root, pre);
        let code = tree.alloc(NodeKind::FenceCode);
        let src = tree.alloc_text("let x;");
        tree.append_child(code, src);
        let preview = tree.alloc(NodeKind::Preview { rendered: true });
        let shown = tree.alloc_text("highlighted");
        tree.append_child(preview, shown);
        tree.append_child(pre, code);
        tree.append_child(pre, preview);

        let pos = relocate_out_of_preview(&tree, CursorPosition::new(shown, 4));
        assert_eq!(pos, CursorPosition::new(src, 6));

        // Positions outside a preview pass through untouched.
        let stay = CursorPosition::new(src, 2);
        assert_eq!(relocate_out_of_preview(&tree, stay), stay);
    }
}
