//! The editor session.
//!
//! One `Session` per open editor instance. It owns the editable tree, the
//! selection, the composition lock, the visibility expansion set, the
//! undo/redo history, the remembered fence language, and the pending
//! side-effect batch, and it wires every entry point (keys, clicks, host
//! edits, commands) through the round-trip pipeline.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use spindle_markup::{
    CursorPosition, NodeId, NodeKind, Selection, Tree, inner_markup, parse_document,
};
use web_time::{Duration, Instant};

use crate::commands::{self, Command};
use crate::engine::{ChangeSink, MarkupEngine, SatelliteRenderer};
use crate::error::SyncError;
use crate::keydown::{GuardContext, KeyEvent, KeydownResult, run_chain};
use crate::localizer::{RenderScope, ScopePlan, plan_scope, should_suppress};
use crate::marker::relocate_out_of_preview;
use crate::outline::{self, OutlineItem};
use crate::pipeline::{replay_markup, round_trip, serialize_with_marker};
use crate::undo::History;
use crate::visibility::ExpansionSet;

/// Editor configuration. All fields have working defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    /// Maximum undo entries, baseline included.
    pub undo_depth: usize,
    /// Plain keystrokes this close together coalesce into one undo entry.
    pub coalesce_window_ms: u64,
    /// Side-effect batch debounce.
    pub debounce_ms: u64,
    /// When set, the flushed document is persisted under this key.
    pub cache_id: Option<String>,
    /// Whether flushes report a character count.
    pub counter_enabled: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            undo_depth: 64,
            coalesce_window_ms: 500,
            debounce_ms: 10,
            cache_id: None,
            counter_enabled: true,
        }
    }
}

impl EditorOptions {
    fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// What a flushed side-effect batch produced.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Markdown serialization, `None` when the engine failed (logged).
    pub markdown: Option<String>,
    pub outline: Vec<OutlineItem>,
    /// `None` when the counter is disabled.
    pub char_count: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct PendingBatch {
    deadline: Instant,
    structural: bool,
    snapshot: bool,
}

pub struct Session<E = (), R = (), S = ()> {
    options: EditorOptions,
    engine: E,
    satellites: R,
    sink: S,
    tree: Tree,
    selection: Option<Selection>,
    expansion: ExpansionSet,
    history: History,
    recent_language: Option<SmolStr>,
    composing: bool,
    pending: Option<PendingBatch>,
}

impl<E, R, S> Session<E, R, S>
where
    E: MarkupEngine,
    R: SatelliteRenderer,
    S: ChangeSink,
{
    /// Open a session on an empty document (one empty paragraph).
    pub fn new(engine: E, satellites: R, sink: S, options: EditorOptions, now: Instant) -> Self {
        let mut tree = Tree::new();
        let paragraph = tree.alloc(NodeKind::Block(spindle_markup::BlockKind::Paragraph));
        let root = tree.root();
        tree.append_child(root, paragraph);
        let selection = Some(Selection::caret(CursorPosition::start_of(paragraph)));
        let mut history = History::new(options.undo_depth, options.coalesce_window());
        history.reset(serialize_with_marker(&mut tree, selection), now);
        Self {
            options,
            engine,
            satellites,
            sink,
            tree,
            selection,
            expansion: ExpansionSet::default(),
            history,
            recent_language: None,
            composing: false,
            pending: None,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Adopt a host-reported selection as-is, without recomputing marker
    /// expansion. Use `handle_caret_moved` for navigation.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    pub fn expansion(&self) -> &ExpansionSet {
        &self.expansion
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Current document markup, sentinel-free.
    pub fn markup(&self) -> String {
        inner_markup(&self.tree, self.tree.root())
    }

    /// Full-document Markdown via the engine.
    pub fn markdown(&self) -> Result<String, SyncError> {
        Ok(self.engine.markup_to_markdown(&self.markup())?)
    }

    /// Replace the document, resetting history to the new baseline.
    pub fn load_markup(&mut self, markup: &str, now: Instant) -> Result<(), SyncError> {
        let tree = parse_document(markup)?;
        self.tree = tree;
        self.selection = self
            .tree
            .first_child(self.tree.root())
            .map(|b| Selection::caret(CursorPosition::start_of(b)));
        self.expansion.collapse_all();
        self.pending = None;
        let snapshot = serialize_with_marker(&mut self.tree, self.selection);
        self.history.reset(snapshot, now);
        Ok(())
    }

    /// Load a Markdown document via the engine.
    pub fn load_markdown(&mut self, markdown: &str, now: Instant) -> Result<(), SyncError> {
        let markup = self.engine.markdown_to_markup(markdown)?;
        self.load_markup(&markup, now)
    }

    pub fn begin_composition(&mut self) {
        self.composing = true;
    }

    /// End composition and synchronize the composed result.
    pub fn end_composition(&mut self, now: Instant) -> Result<(), SyncError> {
        self.composing = false;
        self.synchronize(now, false)
    }

    /// One key-down through the correction chain. `Continue` means the host
    /// should apply its native edit (and then report it via `insert_text`
    /// or `handle_caret_moved`).
    pub fn handle_keydown(
        &mut self,
        event: KeyEvent,
        now: Instant,
    ) -> Result<KeydownResult, SyncError> {
        let mut ctx = GuardContext {
            tree: &mut self.tree,
            selection: &mut self.selection,
            expansion: &mut self.expansion,
            recent_language: &mut self.recent_language,
            composing: self.composing,
        };
        let result = run_chain(&mut ctx, &event);
        if let KeydownResult::Handled {
            rerender,
            structural,
        } = result
        {
            if rerender {
                self.synchronize(now, structural)?;
            } else {
                self.schedule_batch(now, structural, true);
            }
        }
        Ok(result)
    }

    /// Pointer click at `position`: relocate out of preview regions and
    /// recompute marker expansion.
    pub fn handle_click(&mut self, position: CursorPosition) {
        self.move_caret(position);
    }

    /// Caret landed at `position` after native navigation.
    pub fn handle_caret_moved(&mut self, position: CursorPosition) {
        self.move_caret(position);
    }

    fn move_caret(&mut self, position: CursorPosition) {
        let position = relocate_out_of_preview(&self.tree, position);
        self.selection = Some(Selection::caret(position));
        self.expansion.expand_at(&self.tree, position);
    }

    /// Apply a host text insertion at the selection and synchronize.
    pub fn insert_text(&mut self, text: &str, now: Instant) -> Result<(), SyncError> {
        let Some(sel) = self.selection else {
            return Ok(());
        };
        let caret = if sel.is_collapsed() {
            sel.focus
        } else {
            self.delete_range(sel)
        };
        let after = self.insert_at(caret, text);
        self.selection = Some(Selection::caret(after));
        self.synchronize(now, false)
    }

    /// Paste a markup fragment after the current block.
    pub fn insert_fragment(&mut self, markup: &str, now: Instant) -> Result<(), SyncError> {
        let nodes = spindle_markup::parse_fragment(&mut self.tree, markup)?;
        if nodes.is_empty() {
            return Ok(());
        }
        let at = self
            .selection
            .and_then(|s| self.tree.top_level_block(s.collapsed().focus.node));
        match at {
            Some(block) => {
                let mut prev = block;
                for node in nodes.iter().copied() {
                    self.tree.insert_after(prev, node);
                    prev = node;
                }
            }
            None => {
                let root = self.tree.root();
                for node in nodes.iter().copied() {
                    self.tree.append_child(root, node);
                }
            }
        }
        let last = *nodes.last().unwrap_or(&self.tree.root());
        let target = self.tree.deepest_last_child(last);
        self.selection = Some(Selection::caret(CursorPosition::end_of(&self.tree, target)));
        self.synchronize(now, true)
    }

    /// Run a programmatic command; returns whether anything changed.
    pub fn execute_command(&mut self, command: Command, now: Instant) -> Result<bool, SyncError> {
        if !commands::apply(&mut self.tree, &mut self.selection, command) {
            return Ok(false);
        }
        self.synchronize(now, true)?;
        Ok(true)
    }

    /// The round-trip pipeline, steps 1 through 10.
    pub fn synchronize(&mut self, now: Instant, structural: bool) -> Result<(), SyncError> {
        if self.composing {
            return Ok(());
        }
        let anchor = self.selection.map(|s| s.collapsed().focus);
        if let Some(anchor) = anchor {
            let in_active_marker = self
                .tree
                .ancestors_inclusive(anchor.node)
                .any(|n| self.expansion.is_expanded(n));
            if should_suppress(&self.tree, anchor, in_active_marker) {
                return Ok(());
            }
        }
        self.expansion.collapse_all();

        let plan = match anchor {
            Some(anchor) => plan_scope(&self.tree, anchor),
            None => ScopePlan {
                scope: RenderScope::WholeDocument,
                satellites: Vec::new(),
            },
        };
        let outcome = round_trip(&mut self.tree, self.selection, &plan, &self.engine)?;
        self.selection = outcome.selection;
        for preview in outcome.fresh_previews {
            self.render_preview(preview);
        }
        self.schedule_batch(now, structural, true);
        Ok(())
    }

    /// Run the debounced side-effect batch if its deadline has passed.
    pub fn flush_side_effects(&mut self, now: Instant) -> Option<SessionReport> {
        let pending = self.pending?;
        if now < pending.deadline {
            return None;
        }
        self.pending = None;

        let markup = self.markup();
        let markdown = match self.engine.markup_to_markdown(&markup) {
            Ok(md) => Some(md),
            Err(err) => {
                tracing::warn!(target: "spindle::pipeline", %err, "markdown conversion failed");
                None
            }
        };
        if let Some(md) = &markdown {
            self.sink.on_change(md);
            if let Some(cache_id) = self.options.cache_id.clone() {
                self.sink.persist(&cache_id, md);
            }
        }
        if pending.snapshot && !self.composing {
            let snapshot = serialize_with_marker(&mut self.tree, self.selection);
            self.history.record(snapshot, now, pending.structural);
        }
        Some(SessionReport {
            markdown,
            outline: outline::outline(&self.tree),
            char_count: self
                .options
                .counter_enabled
                .then(|| outline::char_count(&self.tree)),
        })
    }

    /// Step the document back one history entry.
    pub fn undo(&mut self, now: Instant) -> Result<bool, SyncError> {
        self.commit_pending_snapshot(now);
        let Some(markup) = self.history.undo().map(str::to_owned) else {
            return Ok(false);
        };
        self.restore(&markup, now)
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self, now: Instant) -> Result<bool, SyncError> {
        self.commit_pending_snapshot(now);
        let Some(markup) = self.history.redo().map(str::to_owned) else {
            return Ok(false);
        };
        self.restore(&markup, now)
    }

    /// Record the snapshot a pending batch still owes before history moves.
    /// The batch stays scheduled for its other side effects.
    fn commit_pending_snapshot(&mut self, now: Instant) {
        let Some(pending) = self.pending else {
            return;
        };
        if !pending.snapshot || self.composing {
            return;
        }
        let snapshot = serialize_with_marker(&mut self.tree, self.selection);
        self.history.record(snapshot, now, pending.structural);
        self.pending = Some(PendingBatch {
            snapshot: false,
            ..pending
        });
    }

    /// Replay stored canonical markup without consulting the engine, and
    /// keep the following batch from re-snapshotting what it restored.
    fn restore(&mut self, markup: &str, now: Instant) -> Result<bool, SyncError> {
        let position = replay_markup(&mut self.tree, markup)?;
        if let Some(position) = position {
            self.selection = Some(Selection::caret(position));
        }
        self.expansion.collapse_all();
        self.schedule_batch(now, true, false);
        tracing::debug!(target: "spindle::undo", "history state restored");
        Ok(true)
    }

    fn schedule_batch(&mut self, now: Instant, structural: bool, snapshot: bool) {
        // Cancel-and-reschedule: only the most recent state is persisted.
        let merged = match self.pending {
            Some(p) => PendingBatch {
                deadline: now + self.options.debounce(),
                structural: p.structural || structural,
                snapshot: p.snapshot || snapshot,
            },
            None => PendingBatch {
                deadline: now + self.options.debounce(),
                structural,
                snapshot,
            },
        };
        self.pending = Some(merged);
    }

    fn render_preview(&mut self, preview: NodeId) {
        let Some(fence) = self.tree.parent(preview) else {
            return;
        };
        let language = self
            .tree
            .children(fence)
            .iter()
            .copied()
            .find(|&c| matches!(self.tree.kind(c), NodeKind::FenceInfo))
            .map(|info| self.tree.text_content(info))
            .filter(|l| !l.is_empty());
        let source = self
            .tree
            .children(fence)
            .iter()
            .copied()
            .find(|&c| matches!(self.tree.kind(c), NodeKind::FenceCode))
            .map(|code| self.tree.text_content(code))
            .unwrap_or_default();
        if let Some(rendered) = self
            .satellites
            .render_preview(language.as_deref(), &source)
        {
            let t = self.tree.alloc_text(rendered);
            self.tree.set_children(preview, &[t]);
            *self.tree.kind_mut(preview) = NodeKind::Preview { rendered: true };
        }
    }

    fn delete_range(&mut self, sel: Selection) -> CursorPosition {
        if sel.anchor.node == sel.focus.node {
            if let NodeKind::Text(text) = self.tree.kind(sel.focus.node).clone() {
                let (lo, hi) = if sel.anchor.offset <= sel.focus.offset {
                    (sel.anchor.offset, sel.focus.offset)
                } else {
                    (sel.focus.offset, sel.anchor.offset)
                };
                let lo_byte = byte_of_char(&text, lo);
                let hi_byte = byte_of_char(&text, hi);
                let mut text = text;
                text.replace_range(lo_byte..hi_byte, "");
                *self.tree.kind_mut(sel.focus.node) = NodeKind::Text(text);
                return CursorPosition::new(sel.focus.node, lo);
            }
        }
        // Cross-node ranges collapse; the round trip enforces the rest.
        sel.collapsed().focus
    }

    fn insert_at(&mut self, caret: CursorPosition, inserted: &str) -> CursorPosition {
        if let NodeKind::Text(text) = self.tree.kind(caret.node).clone() {
            let byte = byte_of_char(&text, caret.offset);
            let mut text = text;
            text.insert_str(byte, inserted);
            *self.tree.kind_mut(caret.node) = NodeKind::Text(text);
            CursorPosition::new(caret.node, caret.offset + inserted.chars().count())
        } else {
            let t = self.tree.alloc_text(inserted);
            self.tree.insert_child_at(caret.node, caret.offset, t);
            CursorPosition::new(t, inserted.chars().count())
        }
    }
}

fn byte_of_char(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
