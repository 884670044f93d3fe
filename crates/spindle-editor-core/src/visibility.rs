//! Marker visibility state machine.
//!
//! Each decorated span is either collapsed (markers hidden, rendered
//! preview shown) or expanded (raw markers shown). Expansion is a UI
//! affordance owned by the session: it is never serialized into undo
//! snapshots and never reaches the external engine, so it lives here as a
//! side table of node ids rather than in the tree.

use spindle_markup::{CursorPosition, NodeId, NodeKind, Tree};

/// The set of currently expanded spans. Holds at most two ids; two only
/// for the adjacent-span boundary case.
#[derive(Debug, Clone, Default)]
pub struct ExpansionSet {
    spans: Vec<NodeId>,
}

impl ExpansionSet {
    pub fn is_expanded(&self, span: NodeId) -> bool {
        self.spans.contains(&span)
    }

    pub fn expanded(&self) -> &[NodeId] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Collapse every span.
    pub fn collapse_all(&mut self) {
        self.spans.clear();
    }

    /// Collapse spans that do not contain `position`, keeping the rest.
    /// Used by vertical arrow navigation so the caret cannot land inside a
    /// collapsed preview mid-move.
    pub fn collapse_others(&mut self, tree: &Tree, position: CursorPosition) {
        self.spans
            .retain(|&span| tree.ancestors_inclusive(position.node).any(|a| a == span));
    }

    /// Recompute the expansion for a caret that just landed at `position`.
    ///
    /// All other spans collapse first. When the caret sits exactly on the
    /// trailing boundary of one span and the next sibling is itself a span,
    /// both expand, so the user can edit the seam between two touching
    /// inline constructs.
    pub fn expand_at(&mut self, tree: &Tree, position: CursorPosition) {
        self.spans.clear();
        let Some((span, at_end)) = span_context(tree, position) else {
            return;
        };
        self.spans.push(span);
        if at_end {
            if let Some(next) = tree.next_sibling(span) {
                if matches!(tree.kind(next), NodeKind::Span(_)) {
                    self.spans.push(next);
                }
            }
        }
        tracing::trace!(
            target: "spindle::visibility",
            expanded = self.spans.len(),
            "caret expansion"
        );
    }
}

/// Resolve the span the caret is touching and whether it sits on that
/// span's trailing boundary.
fn span_context(tree: &Tree, position: CursorPosition) -> Option<(NodeId, bool)> {
    if let Some(span) = tree.nearest_span(position.node) {
        let content_len = tree.text_content(span).chars().count();
        let offset = spindle_markup::position::text_offset_within(tree, span, position);
        return Some((span, offset >= content_len));
    }
    // Caret expressed as a child index in an element: the previous child
    // may be a span whose trailing edge the caret is on.
    if !tree.kind(position.node).is_text() && position.offset > 0 {
        let before = tree.children(position.node).get(position.offset - 1).copied();
        if let Some(before) = before {
            if matches!(tree.kind(before), NodeKind::Span(_)) {
                return Some((before, true));
            }
        }
    }
    None
}
