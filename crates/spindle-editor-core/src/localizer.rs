//! Block localizer.
//!
//! Decides how much of the tree a round trip must regenerate. Most edits
//! re-render a single block; lists absorb adjacent sibling lists because
//! consecutive-list merging is an engine-level concern, native Enter splits
//! need the preceding block in scope, and the position-independent
//! link-reference/footnote collectors travel with every scope so the engine
//! can re-place them at the document end.

use spindle_markup::position::text_offset_within;
use spindle_markup::{BlockKind, CursorPosition, NodeId, NodeKind, Tree};

/// Which nodes a pipeline run will replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderScope {
    WholeDocument,
    /// A contiguous sibling run; replaced in place.
    Blocks(Vec<NodeId>),
}

/// A planned scope: the blocks to regenerate plus any satellite collector
/// blocks relocated into the scope from elsewhere in the document.
#[derive(Debug, Clone)]
pub struct ScopePlan {
    pub scope: RenderScope,
    pub satellites: Vec<NodeId>,
}

/// Compute the render scope for an edit anchored at `anchor`.
///
/// The tree is not mutated; relocating the satellites is the pipeline's
/// job once the engine call has succeeded.
pub fn plan_scope(tree: &Tree, anchor: CursorPosition) -> ScopePlan {
    let Some(block) = tree.nearest_block(anchor.node) else {
        return ScopePlan {
            scope: RenderScope::WholeDocument,
            satellites: Vec::new(),
        };
    };

    let mut resolved = block;
    if let Some(list) = tree.outermost_list(anchor.node) {
        // Blockquote content re-renders independently of its enclosing
        // list; the scope narrows to the focus's own block.
        let in_quote = tree
            .nearest_block_of(anchor.node, BlockKind::Blockquote)
            .is_some_and(|q| tree.ancestors(q).any(|a| a == list));
        resolved = if in_quote { block } else { list };
    }

    let mut blocks = vec![resolved];
    if tree.kind(resolved).as_block().is_some_and(|b| b.is_list()) {
        let mut cur = resolved;
        while let Some(prev) = tree.prev_sibling(cur).filter(|&n| is_list(tree, n)) {
            blocks.insert(0, prev);
            cur = prev;
        }
        cur = resolved;
        while let Some(next) = tree.next_sibling(cur).filter(|&n| is_list(tree, n)) {
            blocks.push(next);
            cur = next;
        }
    } else if let Some(prev) = tree.prev_sibling(resolved) {
        // Native paragraph splits leave the previous block's content
        // unseparated, so it must be in scope too. Satellite collectors
        // are relocated, never absorbed.
        let satellite = tree.kind(prev).as_block().is_some_and(|b| b.is_satellite());
        if !satellite && !tree.text_content(prev).is_empty() {
            blocks.insert(0, prev);
        }
    }

    let root = tree.root();
    let satellites = tree
        .children(root)
        .iter()
        .copied()
        .filter(|&n| {
            tree.kind(n).as_block().is_some_and(|b| b.is_satellite()) && !blocks.contains(&n)
        })
        .collect();

    ScopePlan {
        scope: RenderScope::Blocks(blocks),
        satellites,
    }
}

/// Whether the edit should skip re-rendering entirely.
///
/// Fires for content that is a thematic-break or setext-underline pattern
/// still being typed, and for pure-whitespace runs adjacent to the cursor
/// which would otherwise be misread as an indented code block. The
/// whitespace rule is exempted inside a fence's editable region and while
/// an expanded span is being actively edited (`in_active_marker`).
pub fn should_suppress(tree: &Tree, anchor: CursorPosition, in_active_marker: bool) -> bool {
    let Some(block) = tree.nearest_block(anchor.node) else {
        return false;
    };
    let text = tree.text_content(block);

    if is_break_pattern(&text) {
        tracing::debug!(target: "spindle::localizer", "suppressed: break pattern in progress");
        return true;
    }

    let offset = text_offset_within(tree, block, anchor);
    let byte = text
        .char_indices()
        .nth(offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let before = &text[..byte];
    let after = &text[byte..];
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let leading = &before[line_start..];

    let start_space = !leading.is_empty() && leading.chars().all(|c| c == ' ' || c == '\t');
    let end_space = !after.is_empty() && after.chars().all(|c| matches!(c, ' ' | '\t' | '\n'));
    if !(start_space || end_space) {
        return false;
    }
    let in_fence_source = tree
        .ancestors_inclusive(anchor.node)
        .any(|n| matches!(tree.kind(n), NodeKind::FenceCode));
    if in_fence_source || in_active_marker {
        return false;
    }
    tracing::debug!(
        target: "spindle::localizer",
        start_space,
        end_space,
        "suppressed: whitespace run at cursor"
    );
    true
}

fn is_list(tree: &Tree, id: NodeId) -> bool {
    tree.kind(id).as_block().is_some_and(|b| b.is_list())
}

/// Thematic-break (`---`, `***`, `___`) or setext-underline (`===`, `---`)
/// pattern, including shorter prefixes mid-typing.
fn is_break_pattern(text: &str) -> bool {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    matches!(first, '-' | '=' | '*' | '_') && chars.all(|c| c == first)
}
