//! Key-event correction layer.
//!
//! A fixed-order chain of guards runs on every key-down before the host's
//! native editing applies. The first guard that fully handles the key stops
//! the chain and suppresses native behavior; otherwise the event falls
//! through. Guards consult the caret and its nearest structural ancestor,
//! rewrite the tree when their precondition holds, and stay silent when it
//! does not.

use smol_str::SmolStr;
use spindle_markup::position::text_offset_within;
use spindle_markup::{
    BlockKind, CursorPosition, NodeId, NodeKind, Selection, Tree,
};

use crate::visibility::ExpansionSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
}

impl Key {
    pub fn is_arrow(&self) -> bool {
        matches!(
            self,
            Key::ArrowUp | Key::ArrowDown | Key::ArrowLeft | Key::ArrowRight
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn shifted(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers {
                shift: true,
                ..Modifiers::NONE
            },
        }
    }
}

/// What the chain decided for a key-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeydownResult {
    /// A guard rewrote the tree; native behavior must be prevented.
    Handled {
        /// Whether the edit needs a renderer round trip to normalize.
        rerender: bool,
        /// Structural edits snapshot immediately instead of coalescing.
        structural: bool,
    },
    /// Fall through to native behavior.
    Continue,
}

/// A single guard's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Handled { rerender: bool, structural: bool },
    /// Stop the chain but let native behavior proceed.
    Passthrough,
    Continue,
}

/// Everything a guard may read or rewrite.
pub struct GuardContext<'a> {
    pub tree: &'a mut Tree,
    pub selection: &'a mut Option<Selection>,
    pub expansion: &'a mut ExpansionSet,
    pub recent_language: &'a mut Option<SmolStr>,
    pub composing: bool,
}

impl GuardContext<'_> {
    fn caret(&self) -> Option<CursorPosition> {
        let sel = (*self.selection)?;
        if sel.is_collapsed() {
            Some(sel.focus)
        } else {
            None
        }
    }

    fn set_caret(&mut self, position: CursorPosition) {
        *self.selection = Some(Selection::caret(position));
    }
}

/// Guards, named after the situation they correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Composition,
    HeadingStartEnter,
    EmptyParagraphEnter,
    SpanBoundaryEnter,
    AutoFormat,
    FenceKeys,
    TableArrows,
    ListIndent,
    BackspaceMerge,
    ArrowCollapse,
}

/// Evaluation order. Position in this slice is the only priority rule.
pub const GUARD_CHAIN: &[Guard] = &[
    Guard::Composition,
    Guard::HeadingStartEnter,
    Guard::EmptyParagraphEnter,
    Guard::SpanBoundaryEnter,
    Guard::AutoFormat,
    Guard::FenceKeys,
    Guard::TableArrows,
    Guard::ListIndent,
    Guard::BackspaceMerge,
    Guard::ArrowCollapse,
];

/// Run the full chain for one key-down.
pub fn run_chain(ctx: &mut GuardContext<'_>, event: &KeyEvent) -> KeydownResult {
    for guard in GUARD_CHAIN {
        match guard.try_handle(ctx, event) {
            GuardOutcome::Handled {
                rerender,
                structural,
            } => {
                tracing::debug!(target: "spindle::keydown", ?guard, "guard handled key");
                return KeydownResult::Handled {
                    rerender,
                    structural,
                };
            }
            GuardOutcome::Passthrough => return KeydownResult::Continue,
            GuardOutcome::Continue => {}
        }
    }
    KeydownResult::Continue
}

impl Guard {
    pub fn try_handle(&self, ctx: &mut GuardContext<'_>, event: &KeyEvent) -> GuardOutcome {
        match self {
            Guard::Composition => composition(ctx),
            Guard::HeadingStartEnter => heading_start_enter(ctx, event),
            Guard::EmptyParagraphEnter => empty_paragraph_enter(ctx, event),
            Guard::SpanBoundaryEnter => span_boundary_enter(ctx, event),
            Guard::AutoFormat => auto_format(ctx, event),
            Guard::FenceKeys => fence_keys(ctx, event),
            Guard::TableArrows => table_arrows(ctx, event),
            Guard::ListIndent => list_indent(ctx, event),
            Guard::BackspaceMerge => backspace_merge(ctx, event),
            Guard::ArrowCollapse => arrow_collapse(ctx, event),
        }
    }
}

const HANDLED_STRUCTURAL: GuardOutcome = GuardOutcome::Handled {
    rerender: true,
    structural: true,
};

fn composition(ctx: &GuardContext<'_>) -> GuardOutcome {
    if ctx.composing {
        GuardOutcome::Passthrough
    } else {
        GuardOutcome::Continue
    }
}

/// Enter at the very start of a heading grows the document with a plain
/// paragraph above instead of carrying the heading style into a new line.
fn heading_start_enter(ctx: &mut GuardContext<'_>, event: &KeyEvent) -> GuardOutcome {
    if event.key != Key::Enter || event.modifiers.any() {
        return GuardOutcome::Continue;
    }
    let Some(caret) = ctx.caret() else {
        return GuardOutcome::Continue;
    };
    let Some(block) = ctx.tree.nearest_block(caret.node) else {
        return GuardOutcome::Continue;
    };
    if !matches!(ctx.tree.kind(block), NodeKind::Block(BlockKind::Heading(_))) {
        return GuardOutcome::Continue;
    }
    if text_offset_within(ctx.tree, block, caret) != 0 {
        return GuardOutcome::Continue;
    }
    let paragraph = ctx.tree.alloc(NodeKind::Block(BlockKind::Paragraph));
    ctx.tree.insert_before(block, paragraph);
    ctx.set_caret(CursorPosition::start_of(paragraph));
    GuardOutcome::Handled {
        rerender: false,
        structural: true,
    }
}

/// Enter on an empty paragraph grows the document downward.
fn empty_paragraph_enter(ctx: &mut GuardContext<'_>, event: &KeyEvent) -> GuardOutcome {
    if event.key != Key::Enter || event.modifiers.any() {
        return GuardOutcome::Continue;
    }
    let Some(caret) = ctx.caret() else {
        return GuardOutcome::Continue;
    };
    let Some(block) = ctx.tree.nearest_block(caret.node) else {
        return GuardOutcome::Continue;
    };
    if !matches!(ctx.tree.kind(block), NodeKind::Block(BlockKind::Paragraph)) {
        return GuardOutcome::Continue;
    }
    if !ctx.tree.text_content(block).is_empty() {
        return GuardOutcome::Continue;
    }
    let paragraph = ctx.tree.alloc(NodeKind::Block(BlockKind::Paragraph));
    ctx.tree.insert_after(block, paragraph);
    ctx.set_caret(CursorPosition::start_of(paragraph));
    GuardOutcome::Handled {
        rerender: false,
        structural: true,
    }
}

/// Enter inside a decorated span splits it into two adjacent spans of the
/// same kind across a paragraph break, so formatting continues after the
/// break.
fn span_boundary_enter(ctx: &mut GuardContext<'_>, event: &KeyEvent) -> GuardOutcome {
    if event.key != Key::Enter || event.modifiers.any() {
        return GuardOutcome::Continue;
    }
    let Some(caret) = ctx.caret() else {
        return GuardOutcome::Continue;
    };
    let Some(span) = ctx.tree.nearest_span(caret.node) else {
        return GuardOutcome::Continue;
    };
    if ctx.tree.parent(caret.node) != Some(span) || !ctx.tree.kind(caret.node).is_text() {
        return GuardOutcome::Continue;
    }
    let Some(block) = ctx.tree.nearest_block(span) else {
        return GuardOutcome::Continue;
    };
    if ctx.tree.parent(span) != Some(block) {
        return GuardOutcome::Continue;
    }

    let NodeKind::Text(text) = ctx.tree.kind(caret.node).clone() else {
        return GuardOutcome::Continue;
    };
    let byte = byte_of_char(&text, caret.offset);
    let head = text[..byte].to_owned();
    let tail = text[byte..].to_owned();
    let Some(span_node) = ctx.tree.kind(span).as_span().cloned() else {
        return GuardOutcome::Continue;
    };

    let new_block = ctx.tree.alloc(NodeKind::Block(BlockKind::Paragraph));
    let twin = ctx.tree.alloc(NodeKind::Span(span_node));
    ctx.tree.append_child(new_block, twin);

    let mut caret_target = CursorPosition::start_of(twin);
    if !tail.is_empty() {
        let t = ctx.tree.alloc_text(tail);
        ctx.tree.append_child(twin, t);
        caret_target = CursorPosition::start_of(t);
    }
    // Span content after the caret's run moves to the twin.
    let idx = ctx.tree.index_in_parent(caret.node).unwrap_or(0);
    for sibling in ctx.tree.children(span).to_vec().into_iter().skip(idx + 1) {
        ctx.tree.append_child(twin, sibling);
    }
    // Block content after the span moves to the new paragraph.
    let span_idx = ctx.tree.index_in_parent(span).unwrap_or(0);
    for sibling in ctx.tree.children(block).to_vec().into_iter().skip(span_idx + 1) {
        ctx.tree.append_child(new_block, sibling);
    }
    if head.is_empty() {
        ctx.tree.detach(caret.node);
    } else {
        *ctx.tree.kind_mut(caret.node) = NodeKind::Text(head);
    }
    ctx.tree.insert_after(block, new_block);
    ctx.set_caret(caret_target);
    HANDLED_STRUCTURAL
}

enum AutoFormat {
    Heading(u8),
    Quote,
    List { ordered: bool },
}

fn auto_format_pattern(prefix: &str) -> Option<AutoFormat> {
    let mut chars = prefix.chars();
    match chars.next()? {
        '#' => {
            let level = prefix.chars().take_while(|&c| c == '#').count();
            if level == prefix.chars().count() && level <= 6 {
                Some(AutoFormat::Heading(level as u8))
            } else {
                None
            }
        }
        '>' if prefix == ">" => Some(AutoFormat::Quote),
        '-' | '*' | '+' if prefix.chars().count() == 1 => Some(AutoFormat::List { ordered: false }),
        '1' if prefix == "1." => Some(AutoFormat::List { ordered: true }),
        _ => None,
    }
}

/// Space after a Markdown block prefix (`#`, `>`, `-`, `1.`) typed at the
/// start of a paragraph converts the block instead of inserting the space.
fn auto_format(ctx: &mut GuardContext<'_>, event: &KeyEvent) -> GuardOutcome {
    if event.key != Key::Char(' ') || event.modifiers.any() {
        return GuardOutcome::Continue;
    }
    let Some(caret) = ctx.caret() else {
        return GuardOutcome::Continue;
    };
    let Some(block) = ctx.tree.nearest_block(caret.node) else {
        return GuardOutcome::Continue;
    };
    if !matches!(ctx.tree.kind(block), NodeKind::Block(BlockKind::Paragraph)) {
        return GuardOutcome::Continue;
    }
    if ctx.tree.parent(caret.node) != Some(block)
        || ctx.tree.index_in_parent(caret.node) != Some(0)
    {
        return GuardOutcome::Continue;
    }
    let NodeKind::Text(text) = ctx.tree.kind(caret.node).clone() else {
        return GuardOutcome::Continue;
    };
    let byte = byte_of_char(&text, caret.offset);
    let Some(pattern) = auto_format_pattern(&text[..byte]) else {
        return GuardOutcome::Continue;
    };

    // Consume the prefix; the space never lands.
    let tail = text[byte..].to_owned();
    if tail.is_empty() {
        ctx.tree.detach(caret.node);
    } else {
        *ctx.tree.kind_mut(caret.node) = NodeKind::Text(tail);
    }
    let caret_node = if tail_kept(ctx.tree, caret.node) {
        Some(caret.node)
    } else {
        None
    };

    match pattern {
        AutoFormat::Heading(level) => {
            *ctx.tree.kind_mut(block) = NodeKind::Block(BlockKind::Heading(level));
            ctx.set_caret(caret_node.map(CursorPosition::start_of).unwrap_or_else(|| {
                CursorPosition::start_of(block)
            }));
        }
        AutoFormat::Quote => {
            let quote = ctx.tree.alloc(NodeKind::Block(BlockKind::Blockquote));
            ctx.tree.insert_before(block, quote);
            ctx.tree.append_child(quote, block);
            ctx.set_caret(caret_node.map(CursorPosition::start_of).unwrap_or_else(|| {
                CursorPosition::start_of(block)
            }));
        }
        AutoFormat::List { ordered } => {
            let list = ctx.tree.alloc(NodeKind::Block(BlockKind::List { ordered }));
            let item = ctx.tree.alloc(NodeKind::Block(BlockKind::ListItem));
            ctx.tree.insert_before(block, list);
            ctx.tree.append_child(list, item);
            for child in ctx.tree.children(block).to_vec() {
                ctx.tree.append_child(item, child);
            }
            ctx.tree.detach(block);
            ctx.set_caret(caret_node.map(CursorPosition::start_of).unwrap_or_else(|| {
                CursorPosition::start_of(item)
            }));
        }
    }
    HANDLED_STRUCTURAL
}

/// Keeps code fences structurally valid: Enter in the source region breaks
/// a line instead of splitting the block, Tab indents, Backspace cannot eat
/// the fence boundary, and the language-hint field remembers the last
/// confirmed language.
fn fence_keys(ctx: &mut GuardContext<'_>, event: &KeyEvent) -> GuardOutcome {
    let Some(caret) = ctx.caret() else {
        return GuardOutcome::Continue;
    };
    let info = ctx
        .tree
        .ancestors_inclusive(caret.node)
        .find(|&n| matches!(ctx.tree.kind(n), NodeKind::FenceInfo));
    if let Some(info) = info {
        return fence_info_keys(ctx, event, info);
    }
    let in_source = ctx
        .tree
        .ancestors_inclusive(caret.node)
        .any(|n| matches!(ctx.tree.kind(n), NodeKind::FenceCode));
    if !in_source {
        return GuardOutcome::Continue;
    }
    match event.key {
        Key::Enter if !event.modifiers.any() => {
            insert_char_at_caret(ctx, caret, '\n');
            GuardOutcome::Handled {
                rerender: true,
                structural: true,
            }
        }
        Key::Tab if !event.modifiers.any() => {
            insert_char_at_caret(ctx, caret, '\t');
            GuardOutcome::Handled {
                rerender: true,
                structural: false,
            }
        }
        Key::Backspace if !event.modifiers.any() => {
            let at_start = caret.offset == 0 && ctx.tree.prev_sibling(caret.node).is_none();
            if at_start {
                // The fence's opening boundary is not deletable from inside.
                GuardOutcome::Handled {
                    rerender: false,
                    structural: false,
                }
            } else {
                GuardOutcome::Continue
            }
        }
        _ => GuardOutcome::Continue,
    }
}

fn fence_info_keys(
    ctx: &mut GuardContext<'_>,
    event: &KeyEvent,
    info: NodeId,
) -> GuardOutcome {
    match event.key {
        Key::Enter if !event.modifiers.any() => {
            let language = ctx.tree.text_content(info);
            if language.is_empty() {
                if let Some(recent) = ctx.recent_language.clone() {
                    let t = ctx.tree.alloc_text(recent.as_str());
                    ctx.tree.set_children(info, &[t]);
                }
            } else {
                *ctx.recent_language = Some(SmolStr::new(&language));
            }
            // Confirming the hint drops the caret into the source region.
            let fence = ctx.tree.parent(info);
            let source = fence.and_then(|f| {
                ctx.tree
                    .children(f)
                    .iter()
                    .copied()
                    .find(|&c| matches!(ctx.tree.kind(c), NodeKind::FenceCode))
            });
            if let Some(source) = source {
                let target = ctx
                    .tree
                    .first_child(source)
                    .filter(|&t| ctx.tree.kind(t).is_text())
                    .map(CursorPosition::start_of)
                    .unwrap_or_else(|| CursorPosition::start_of(source));
                ctx.set_caret(target);
            }
            GuardOutcome::Handled {
                rerender: false,
                structural: true,
            }
        }
        Key::Backspace if ctx.tree.text_content(info).is_empty() => {
            // Deleting in an already-empty hint forgets the remembered
            // language instead of eating the field.
            *ctx.recent_language = None;
            GuardOutcome::Handled {
                rerender: false,
                structural: false,
            }
        }
        _ => GuardOutcome::Continue,
    }
}

/// Vertical arrows at a table's first or last cell move to (or create) an
/// adjacent block instead of doing nothing.
fn table_arrows(ctx: &mut GuardContext<'_>, event: &KeyEvent) -> GuardOutcome {
    if event.modifiers.any() {
        return GuardOutcome::Continue;
    }
    let Some(caret) = ctx.caret() else {
        return GuardOutcome::Continue;
    };
    let cell = ctx
        .tree
        .ancestors_inclusive(caret.node)
        .find(|&n| matches!(ctx.tree.kind(n), NodeKind::Block(BlockKind::TableCell { .. })));
    let Some(cell) = cell else {
        return GuardOutcome::Continue;
    };
    let Some(row) = ctx.tree.parent(cell) else {
        return GuardOutcome::Continue;
    };
    let Some(table) = ctx.tree.parent(row) else {
        return GuardOutcome::Continue;
    };
    match event.key {
        Key::ArrowUp if ctx.tree.first_child(table) == Some(row) => {
            if let Some(prev) = ctx.tree.prev_sibling(table) {
                let target = ctx.tree.deepest_last_child(prev);
                let pos = CursorPosition::end_of(ctx.tree, target);
                ctx.set_caret(pos);
                GuardOutcome::Handled {
                    rerender: false,
                    structural: false,
                }
            } else {
                let paragraph = ctx.tree.alloc(NodeKind::Block(BlockKind::Paragraph));
                ctx.tree.insert_before(table, paragraph);
                ctx.set_caret(CursorPosition::start_of(paragraph));
                GuardOutcome::Handled {
                    rerender: false,
                    structural: true,
                }
            }
        }
        Key::ArrowDown if ctx.tree.last_child(table) == Some(row) => {
            if let Some(next) = ctx.tree.next_sibling(table) {
                let first = ctx
                    .tree
                    .first_child(next)
                    .filter(|&t| ctx.tree.kind(t).is_text())
                    .unwrap_or(next);
                ctx.set_caret(CursorPosition::start_of(first));
                GuardOutcome::Handled {
                    rerender: false,
                    structural: false,
                }
            } else {
                let paragraph = ctx.tree.alloc(NodeKind::Block(BlockKind::Paragraph));
                ctx.tree.insert_after(table, paragraph);
                ctx.set_caret(CursorPosition::start_of(paragraph));
                GuardOutcome::Handled {
                    rerender: false,
                    structural: true,
                }
            }
        }
        _ => GuardOutcome::Continue,
    }
}

/// Tab / Shift-Tab inside a list item indents under the previous item or
/// outdents to the enclosing list.
fn list_indent(ctx: &mut GuardContext<'_>, event: &KeyEvent) -> GuardOutcome {
    if event.key != Key::Tab {
        return GuardOutcome::Continue;
    }
    if event.modifiers.ctrl || event.modifiers.alt || event.modifiers.meta {
        return GuardOutcome::Continue;
    }
    let Some(caret) = ctx.caret() else {
        return GuardOutcome::Continue;
    };
    let item = ctx
        .tree
        .ancestors_inclusive(caret.node)
        .find(|&n| matches!(ctx.tree.kind(n), NodeKind::Block(BlockKind::ListItem)));
    let Some(item) = item else {
        return GuardOutcome::Continue;
    };
    let Some(list) = ctx.tree.parent(item) else {
        return GuardOutcome::Continue;
    };
    let Some(BlockKind::List { ordered }) = ctx.tree.kind(list).as_block() else {
        return GuardOutcome::Continue;
    };

    if event.modifiers.shift {
        // Outdent: hoist the item past its enclosing list item.
        let outer_item = ctx.tree.parent(list).filter(|&n| {
            matches!(ctx.tree.kind(n), NodeKind::Block(BlockKind::ListItem))
        });
        let Some(outer_item) = outer_item else {
            return GuardOutcome::Continue;
        };
        ctx.tree.insert_after(outer_item, item);
        if ctx.tree.child_count(list) == 0 {
            ctx.tree.detach(list);
        }
        HANDLED_STRUCTURAL
    } else {
        // Indent: nest under the previous sibling item.
        let Some(prev_item) = ctx.tree.prev_sibling(item) else {
            return GuardOutcome::Continue;
        };
        let nested = ctx
            .tree
            .last_child(prev_item)
            .filter(|&n| ctx.tree.kind(n).as_block() == Some(BlockKind::List { ordered }));
        let nested = match nested {
            Some(n) => n,
            None => {
                let n = ctx.tree.alloc(NodeKind::Block(BlockKind::List { ordered }));
                ctx.tree.append_child(prev_item, n);
                n
            }
        };
        ctx.tree.append_child(nested, item);
        HANDLED_STRUCTURAL
    }
}

/// Backspace at a block's very start merges it into its predecessor with
/// type-specific rules, or unwraps it from an enclosing blockquote.
fn backspace_merge(ctx: &mut GuardContext<'_>, event: &KeyEvent) -> GuardOutcome {
    if event.key != Key::Backspace || event.modifiers.any() {
        return GuardOutcome::Continue;
    }
    let Some(caret) = ctx.caret() else {
        return GuardOutcome::Continue;
    };
    let Some(block) = ctx.tree.nearest_block(caret.node) else {
        return GuardOutcome::Continue;
    };
    if matches!(
        ctx.tree.kind(block),
        NodeKind::Block(BlockKind::TableCell { .. } | BlockKind::CodeFence)
    ) {
        return GuardOutcome::Continue;
    }
    if text_offset_within(ctx.tree, block, caret) != 0 {
        return GuardOutcome::Continue;
    }

    let Some(prev) = ctx.tree.prev_sibling(block) else {
        // First block of a blockquote: move out of the quote.
        let quote = ctx.tree.parent(block).filter(|&p| {
            matches!(ctx.tree.kind(p), NodeKind::Block(BlockKind::Blockquote))
        });
        let Some(quote) = quote else {
            return GuardOutcome::Continue;
        };
        ctx.tree.insert_before(quote, block);
        if ctx.tree.child_count(quote) == 0 {
            ctx.tree.detach(quote);
        }
        ctx.set_caret(CursorPosition::start_of(block));
        return HANDLED_STRUCTURAL;
    };

    match ctx.tree.kind(prev) {
        NodeKind::Block(BlockKind::ThematicBreak) => {
            ctx.tree.detach(prev);
            ctx.set_caret(caret);
            HANDLED_STRUCTURAL
        }
        NodeKind::Block(BlockKind::Paragraph | BlockKind::Heading(_)) => {
            merge_into(ctx, block, prev);
            HANDLED_STRUCTURAL
        }
        NodeKind::Block(BlockKind::List { .. }) => {
            let Some(last_item) = ctx.tree.last_child(prev) else {
                return GuardOutcome::Continue;
            };
            merge_into(ctx, block, last_item);
            HANDLED_STRUCTURAL
        }
        NodeKind::Block(BlockKind::Table) => {
            // Native backspace would eat the table boundary; move into the
            // last cell instead, dropping an emptied paragraph.
            let target = ctx.tree.deepest_last_child(prev);
            let pos = CursorPosition::end_of(ctx.tree, target);
            let emptied = matches!(ctx.tree.kind(block), NodeKind::Block(BlockKind::Paragraph))
                && ctx.tree.text_content(block).is_empty();
            if emptied {
                ctx.tree.detach(block);
            }
            ctx.set_caret(pos);
            GuardOutcome::Handled {
                rerender: false,
                structural: emptied,
            }
        }
        _ => GuardOutcome::Continue,
    }
}

/// Move `block`'s inline content to the end of `target`, placing the caret
/// on the junction.
fn merge_into(ctx: &mut GuardContext<'_>, block: NodeId, target: NodeId) {
    let junction = ctx.tree.deepest_last_child(target);
    let caret = if ctx.tree.kind(junction).is_text() {
        CursorPosition::end_of(ctx.tree, junction)
    } else {
        CursorPosition::end_of(ctx.tree, target)
    };
    for child in ctx.tree.children(block).to_vec() {
        ctx.tree.append_child(target, child);
    }
    ctx.tree.detach(block);
    ctx.set_caret(caret);
}

/// Arrow navigation collapses expanded spans the caret is leaving, then
/// falls through to the native caret move.
fn arrow_collapse(ctx: &mut GuardContext<'_>, event: &KeyEvent) -> GuardOutcome {
    if !event.key.is_arrow() {
        return GuardOutcome::Continue;
    }
    if let Some(caret) = ctx.caret() {
        ctx.expansion.collapse_others(ctx.tree, caret);
    }
    GuardOutcome::Continue
}

fn insert_char_at_caret(ctx: &mut GuardContext<'_>, caret: CursorPosition, ch: char) {
    if let NodeKind::Text(text) = ctx.tree.kind(caret.node).clone() {
        let byte = byte_of_char(&text, caret.offset);
        let mut text = text;
        text.insert(byte, ch);
        *ctx.tree.kind_mut(caret.node) = NodeKind::Text(text);
        ctx.set_caret(CursorPosition::new(caret.node, caret.offset + 1));
    } else {
        let t = ctx.tree.alloc_text(ch.to_string());
        ctx.tree
            .insert_child_at(caret.node, caret.offset, t);
        ctx.set_caret(CursorPosition::new(t, 1));
    }
}

fn byte_of_char(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

fn tail_kept(tree: &Tree, node: NodeId) -> bool {
    tree.parent(node).is_some()
}
