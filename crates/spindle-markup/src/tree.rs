//! Arena node tree modeling the editable surface.
//!
//! Nodes are addressed by `NodeId` (index into the arena). Regenerating a
//! render scope detaches the old nodes and attaches freshly parsed ones;
//! ids for replaced content become dangling, and anything that must
//! survive regeneration travels through the cursor-marker sentinel instead.

use smol_str::SmolStr;

/// Index of a node in a [`Tree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Top-level structural unit of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    /// Heading level 1-6.
    Heading(u8),
    List {
        ordered: bool,
    },
    ListItem,
    Blockquote,
    /// Fenced code block; children are `FenceInfo`, `FenceCode`, `Preview`.
    CodeFence,
    Table,
    TableRow,
    TableCell {
        header: bool,
    },
    /// Position-independent collector for link reference definitions.
    LinkRefDefs,
    /// Position-independent collector for footnote definitions.
    FootnoteDefs,
    ThematicBreak,
}

impl BlockKind {
    /// Whether this block kind is re-placed at the document end by the
    /// renderer rather than staying where the user typed it.
    pub fn is_satellite(&self) -> bool {
        matches!(self, BlockKind::LinkRefDefs | BlockKind::FootnoteDefs)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, BlockKind::List { .. })
    }
}

/// Inline construct delimited by paired markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanKind {
    Emphasis,
    Strong,
    Strikethrough,
    Code,
    Math,
    Link { href: SmolStr },
    Image { src: SmolStr },
    Html,
}

impl SpanKind {
    /// Spans whose boundary needs the zero-width-joiner normalization after
    /// cursor recovery (see the marker protocol).
    pub fn needs_boundary_join(&self) -> bool {
        matches!(
            self,
            SpanKind::Emphasis | SpanKind::Strong | SpanKind::Strikethrough
        )
    }
}

/// A decorated span: kind plus its opening/closing marker runs.
///
/// Markers live on the span itself; deleting the span removes both runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanNode {
    pub kind: SpanKind,
    pub open_marker: SmolStr,
    pub close_marker: SmolStr,
}

impl SpanNode {
    pub fn new(kind: SpanKind, open: impl Into<SmolStr>, close: impl Into<SmolStr>) -> Self {
        Self {
            kind,
            open_marker: open.into(),
            close_marker: close.into(),
        }
    }

    /// A span with the conventional markers for its kind.
    pub fn with_default_markers(kind: SpanKind) -> Self {
        let (open, close): (SmolStr, SmolStr) = match &kind {
            SpanKind::Emphasis => ("*".into(), "*".into()),
            SpanKind::Strong => ("**".into(), "**".into()),
            SpanKind::Strikethrough => ("~~".into(), "~~".into()),
            SpanKind::Code => ("`".into(), "`".into()),
            SpanKind::Math => ("$".into(), "$".into()),
            SpanKind::Link { href } => ("[".into(), smol_str::format_smolstr!("]({})", href)),
            SpanKind::Image { src } => ("![".into(), smol_str::format_smolstr!("]({})", src)),
            SpanKind::Html => ("".into(), "".into()),
        };
        Self {
            kind,
            open_marker: open,
            close_marker: close,
        }
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Root container; exactly one per tree.
    Document,
    Block(BlockKind),
    Span(SpanNode),
    Text(String),
    /// The cursor sentinel. At most one alive in a tree at any time.
    Marker,
    /// Language-hint mini-field at the top of a code fence.
    FenceInfo,
    /// Editable source region of a code fence.
    FenceCode,
    /// Rendered preview region. `rendered: false` marks a freshly
    /// materialized preview awaiting its satellite renderer.
    Preview { rendered: bool },
}

impl NodeKind {
    pub fn as_block(&self) -> Option<BlockKind> {
        match self {
            NodeKind::Block(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_span(&self) -> Option<&SpanNode> {
        match self {
            NodeKind::Span(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, NodeKind::Text(_))
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    /// Host-injected presentational attribute, stripped by the pipeline.
    style: Option<SmolStr>,
}

/// The editable-surface tree.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// An empty document.
    pub fn new() -> Self {
        let root = NodeData {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Document,
            style: None,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Allocate a detached node.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent: None,
            children: Vec::new(),
            kind,
            style: None,
        });
        id
    }

    /// Allocate a detached text node.
    pub fn alloc_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    pub fn style(&self, id: NodeId) -> Option<&SmolStr> {
        self.nodes[id.0].style.as_ref()
    }

    pub fn set_style(&mut self, id: NodeId, style: Option<SmolStr>) {
        self.nodes[id.0].style = style;
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.last().copied()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.nodes[id.0].children.len()
    }

    /// Index of `id` within its parent's child list.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let idx = self.index_in_parent(id)?;
        if idx == 0 {
            None
        } else {
            Some(self.children(parent)[idx - 1])
        }
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let idx = self.index_in_parent(id)?;
        self.children(parent).get(idx + 1).copied()
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |&n| self.parent(n))
    }

    /// `id` and its ancestors, nearest first.
    pub fn ancestors_inclusive(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), |&n| self.parent(n))
    }

    /// Nearest ancestor-or-self that is a block.
    pub fn nearest_block(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors_inclusive(id)
            .find(|&n| matches!(self.kind(n), NodeKind::Block(_)))
    }

    /// Nearest ancestor-or-self that is a direct child of the document root.
    pub fn top_level_block(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors_inclusive(id)
            .find(|&n| self.parent(n) == Some(self.root))
    }

    /// Nearest ancestor-or-self span node.
    pub fn nearest_span(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors_inclusive(id)
            .find(|&n| matches!(self.kind(n), NodeKind::Span(_)))
    }

    /// Outermost (farthest) span ancestor, for marker expansion.
    pub fn outermost_span(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors_inclusive(id)
            .filter(|&n| matches!(self.kind(n), NodeKind::Span(_)))
            .last()
    }

    /// Outermost list ancestor containing `id`, if any.
    pub fn outermost_list(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors_inclusive(id)
            .filter(|&n| matches!(self.kind(n), NodeKind::Block(b) if b.is_list()))
            .last()
    }

    /// Nearest ancestor-or-self with the given block kind.
    pub fn nearest_block_of(&self, id: NodeId, kind: BlockKind) -> Option<NodeId> {
        self.ancestors_inclusive(id)
            .find(|&n| self.kind(n).as_block() == Some(kind))
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root
            || self
                .ancestors(id)
                .last()
                .map(|top| top == self.root)
                .unwrap_or(false)
    }

    /// Append `child` as the last child of `parent`. Detaches `child` first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `node` immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) {
        let parent = self
            .parent(sibling)
            .expect("insert_before target must be attached");
        self.detach(node);
        let idx = self.index_in_parent(sibling).unwrap_or(0);
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(idx, node);
    }

    /// Insert `node` immediately after `sibling`.
    pub fn insert_after(&mut self, sibling: NodeId, node: NodeId) {
        let parent = self
            .parent(sibling)
            .expect("insert_after target must be attached");
        self.detach(node);
        let idx = self.index_in_parent(sibling).map(|i| i + 1).unwrap_or(0);
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(idx, node);
    }

    /// Insert `node` as the `idx`-th child of `parent`.
    pub fn insert_child_at(&mut self, parent: NodeId, idx: usize, node: NodeId) {
        self.detach(node);
        let idx = idx.min(self.child_count(parent));
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(idx, node);
    }

    /// Unlink `id` from its parent. The node stays allocated and reusable.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Replace `old` with the given nodes at its position, detaching `old`.
    pub fn replace_with(&mut self, old: NodeId, replacements: &[NodeId]) {
        let parent = self
            .parent(old)
            .expect("replace_with target must be attached");
        let idx = self.index_in_parent(old).unwrap_or(0);
        self.detach(old);
        for (i, &node) in replacements.iter().enumerate() {
            self.insert_child_at(parent, idx + i, node);
        }
    }

    /// Detach all children of `id` and attach `replacements` instead.
    pub fn set_children(&mut self, id: NodeId, replacements: &[NodeId]) {
        let old: Vec<NodeId> = self.children(id).to_vec();
        for child in old {
            self.detach(child);
        }
        for &node in replacements {
            self.append_child(id, node);
        }
    }

    /// Pre-order traversal of `id`'s subtree, including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            for &c in self.children(n).iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    /// Concatenated text of all text runs in `id`'s subtree.
    ///
    /// Span marker runs are not part of the content and are not included.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for n in self.descendants(id) {
            if let NodeKind::Text(t) = self.kind(n) {
                out.push_str(t);
            }
        }
        out
    }

    /// Deepest last child of `id`, following last-child links.
    pub fn deepest_last_child(&self, id: NodeId) -> NodeId {
        let mut cur = id;
        while let Some(last) = self.last_child(cur) {
            cur = last;
        }
        cur
    }

    /// The single marker sentinel, if present anywhere under the root.
    pub fn find_marker(&self) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&n| matches!(self.kind(n), NodeKind::Marker))
    }

    /// All attached nodes matching a predicate, in document order.
    pub fn find_all(&self, mut pred: impl FnMut(&NodeKind) -> bool) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&n| pred(self.kind(n)))
            .collect()
    }

    /// First top-level block of the given kind, if any.
    pub fn find_top_level(&self, kind: BlockKind) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|&n| self.kind(n).as_block() == Some(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph_with_text(tree: &mut Tree, text: &str) -> NodeId {
        let p = tree.alloc(NodeKind::Block(BlockKind::Paragraph));
        let t = tree.alloc_text(text);
        tree.append_child(p, t);
        let root = tree.root();
        tree.append_child(root, p);
        p
    }

    #[test]
    fn test_navigation() {
        let mut tree = Tree::new();
        let a = paragraph_with_text(&mut tree, "one");
        let b = paragraph_with_text(&mut tree, "two");

        assert_eq!(tree.children(tree.root()), &[a, b]);
        assert_eq!(tree.next_sibling(a), Some(b));
        assert_eq!(tree.prev_sibling(b), Some(a));
        assert_eq!(tree.prev_sibling(a), None);

        let text = tree.first_child(a).unwrap();
        assert_eq!(tree.nearest_block(text), Some(a));
        assert_eq!(tree.top_level_block(text), Some(a));
    }

    #[test]
    fn test_detach_and_replace() {
        let mut tree = Tree::new();
        let a = paragraph_with_text(&mut tree, "one");
        let b = paragraph_with_text(&mut tree, "two");

        let c = tree.alloc(NodeKind::Block(BlockKind::ThematicBreak));
        tree.replace_with(a, &[c]);
        assert_eq!(tree.children(tree.root()), &[c, b]);
        assert!(!tree.is_attached(a));
        assert!(tree.is_attached(c));
    }

    #[test]
    fn test_text_content_excludes_markers() {
        let mut tree = Tree::new();
        let p = paragraph_with_text(&mut tree, "before ");
        let em = tree.alloc(NodeKind::Span(SpanNode::with_default_markers(
            SpanKind::Emphasis,
        )));
        let inner = tree.alloc_text("inside");
        tree.append_child(em, inner);
        tree.append_child(p, em);

        assert_eq!(tree.text_content(p), "before inside");
    }

    #[test]
    fn test_outermost_list() {
        let mut tree = Tree::new();
        let outer = tree.alloc(NodeKind::Block(BlockKind::List { ordered: false }));
        let li = tree.alloc(NodeKind::Block(BlockKind::ListItem));
        let inner = tree.alloc(NodeKind::Block(BlockKind::List { ordered: true }));
        let li2 = tree.alloc(NodeKind::Block(BlockKind::ListItem));
        let text = tree.alloc_text("deep");
        let root = tree.root();
        tree.append_child(root, outer);
        tree.append_child(outer, li);
        tree.append_child(li, inner);
        tree.append_child(inner, li2);
        tree.append_child(li2, text);

        assert_eq!(tree.outermost_list(text), Some(outer));
        assert_eq!(tree.nearest_block(text), Some(li2));
    }

    #[test]
    fn test_find_marker() {
        let mut tree = Tree::new();
        let p = paragraph_with_text(&mut tree, "hello");
        assert_eq!(tree.find_marker(), None);

        let marker = tree.alloc(NodeKind::Marker);
        tree.append_child(p, marker);
        assert_eq!(tree.find_marker(), Some(marker));

        tree.detach(marker);
        assert_eq!(tree.find_marker(), None);
    }

    #[test]
    fn test_default_markers() {
        let link = SpanNode::with_default_markers(SpanKind::Link {
            href: "https://example.com".into(),
        });
        assert_eq!(link.open_marker, "[");
        assert_eq!(link.close_marker, "](https://example.com)");
        assert!(!link.kind.needs_boundary_join());

        let strong = SpanNode::with_default_markers(SpanKind::Strong);
        assert_eq!(strong.open_marker, "**");
        assert!(strong.kind.needs_boundary_join());
    }
}
