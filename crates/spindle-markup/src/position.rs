//! Cursor and selection positions addressed by (node, offset).
//!
//! Offsets count chars inside a text node and child indices inside an
//! element. Positions do not survive scope regeneration - the editor core's
//! marker protocol carries the cursor across a round trip instead.

use crate::tree::{NodeId, NodeKind, Tree};

/// A single caret position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPosition {
    pub node: NodeId,
    pub offset: usize,
}

impl CursorPosition {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }

    /// Caret at the start of a node.
    pub fn start_of(node: NodeId) -> Self {
        Self { node, offset: 0 }
    }

    /// Caret at the end of a node's content.
    pub fn end_of(tree: &Tree, node: NodeId) -> Self {
        let offset = match tree.kind(node) {
            NodeKind::Text(t) => t.chars().count(),
            _ => tree.child_count(node),
        };
        Self { node, offset }
    }

    /// Whether this caret sits at the very start of its node.
    pub fn at_node_start(&self) -> bool {
        self.offset == 0
    }

    /// Whether this caret sits at the very end of its node's content.
    pub fn at_node_end(&self, tree: &Tree) -> bool {
        match tree.kind(self.node) {
            NodeKind::Text(t) => self.offset >= t.chars().count(),
            _ => self.offset >= tree.child_count(self.node),
        }
    }
}

/// Anchor/focus selection. Collapsed when both ends coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Where the selection started.
    pub anchor: CursorPosition,
    /// Where the caret is now.
    pub focus: CursorPosition,
}

impl Selection {
    pub fn new(anchor: CursorPosition, focus: CursorPosition) -> Self {
        Self { anchor, focus }
    }

    /// A collapsed selection (caret only).
    pub fn caret(position: CursorPosition) -> Self {
        Self {
            anchor: position,
            focus: position,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Collapse to the anchor end.
    pub fn collapsed(&self) -> Self {
        Self::caret(self.anchor)
    }
}

/// Char offset of `position` from the start of `ancestor`'s text content.
///
/// Counts only text runs, matching [`Tree::text_content`].
pub fn text_offset_within(tree: &Tree, ancestor: NodeId, position: CursorPosition) -> usize {
    let mut total = 0;
    for n in tree.descendants(ancestor) {
        if n == position.node {
            if let NodeKind::Text(_) = tree.kind(n) {
                return total + position.offset;
            }
            // Element position: count text up to the offset-th child.
            let mut acc = total;
            for &c in tree.children(n).iter().take(position.offset) {
                acc += tree.text_content(c).chars().count();
            }
            return acc;
        }
        if let NodeKind::Text(t) = tree.kind(n) {
            total += t.chars().count();
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{BlockKind, SpanKind, SpanNode};

    #[test]
    fn test_caret_bounds() {
        let mut tree = Tree::new();
        let t = tree.alloc_text("abc");
        let p = tree.alloc(NodeKind::Block(BlockKind::Paragraph));
        tree.append_child(p, t);

        let start = CursorPosition::start_of(t);
        assert!(start.at_node_start());
        assert!(!start.at_node_end(&tree));

        let end = CursorPosition::end_of(&tree, t);
        assert_eq!(end.offset, 3);
        assert!(end.at_node_end(&tree));
    }

    #[test]
    fn test_text_offset_within() {
        let mut tree = Tree::new();
        let p = tree.alloc(NodeKind::Block(BlockKind::Paragraph));
        let a = tree.alloc_text("ab");
        let em = tree.alloc(NodeKind::Span(SpanNode::with_default_markers(
            SpanKind::Emphasis,
        )));
        let b = tree.alloc_text("cd");
        let c = tree.alloc_text("ef");
        tree.append_child(p, a);
        tree.append_child(em, b);
        tree.append_child(p, em);
        tree.append_child(p, c);

        assert_eq!(
            text_offset_within(&tree, p, CursorPosition::new(b, 1)),
            3 // "ab" + "c"
        );
        assert_eq!(
            text_offset_within(&tree, p, CursorPosition::new(c, 2)),
            6
        );
        // Element offset 2 on the paragraph = after "ab" and the em span.
        assert_eq!(
            text_offset_within(&tree, p, CursorPosition::new(p, 2)),
            4
        );
    }

    #[test]
    fn test_selection_collapse() {
        let mut tree = Tree::new();
        let t = tree.alloc_text("abc");
        let sel = Selection::new(CursorPosition::new(t, 0), CursorPosition::new(t, 2));
        assert!(!sel.is_collapsed());
        let collapsed = sel.collapsed();
        assert!(collapsed.is_collapsed());
        assert_eq!(collapsed.focus.offset, 0);
        let _ = tree;
    }
}
