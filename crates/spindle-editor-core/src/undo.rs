//! Undo/redo history.
//!
//! Entries are post-state snapshots: serialized document markup with the
//! cursor sentinel embedded. The bottom entry is the baseline captured when
//! the document was opened or loaded, so the stack always holds the state
//! `undo` should return to. Plain keystrokes landing within the coalescing
//! window overwrite the most recent entry instead of pushing a new one.

use web_time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    markup: String,
    at: Instant,
}

#[derive(Debug)]
pub struct History {
    undo: Vec<Entry>,
    redo: Vec<Entry>,
    depth: usize,
    window: Duration,
}

impl History {
    pub fn new(depth: usize, window: Duration) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            depth: depth.max(2),
            window,
        }
    }

    /// Install the baseline state, discarding all existing entries.
    pub fn reset(&mut self, markup: String, now: Instant) {
        self.undo.clear();
        self.redo.clear();
        self.undo.push(Entry { markup, at: now });
    }

    /// Record a post-edit snapshot.
    ///
    /// `structural` edits (Enter splits, toolbar commands, paste) always
    /// push; plain keystrokes within the coalescing window overwrite the
    /// top entry. The baseline is never overwritten. Recording a changed
    /// state clears the redo stack; recording the top state again is a
    /// no-op that leaves redo intact.
    pub fn record(&mut self, markup: String, now: Instant, structural: bool) {
        if self.undo.is_empty() {
            self.redo.clear();
            self.undo.push(Entry { markup, at: now });
            return;
        }
        if self.undo.last().is_some_and(|top| top.markup == markup) {
            return;
        }
        self.redo.clear();
        let coalesce = !structural
            && self.undo.len() > 1
            && self
                .undo
                .last()
                .is_some_and(|top| now.duration_since(top.at) <= self.window);
        if coalesce {
            if let Some(top) = self.undo.last_mut() {
                top.markup = markup;
                top.at = now;
            }
            return;
        }
        self.undo.push(Entry { markup, at: now });
        // Bounded depth; the oldest post-baseline entry becomes the new
        // baseline.
        if self.undo.len() > self.depth {
            self.undo.remove(0);
        }
        tracing::trace!(target: "spindle::undo", depth = self.undo.len(), "snapshot pushed");
    }

    /// Step back: the current top moves to the redo stack and the state to
    /// restore is returned. `None` when only the baseline remains.
    pub fn undo(&mut self) -> Option<&str> {
        if self.undo.len() < 2 {
            return None;
        }
        let top = self.undo.pop()?;
        self.redo.push(top);
        self.undo.last().map(|e| e.markup.as_str())
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self) -> Option<&str> {
        let entry = self.redo.pop()?;
        self.undo.push(entry);
        self.undo.last().map(|e| e.markup.as_str())
    }

    pub fn can_undo(&self) -> bool {
        self.undo.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}
