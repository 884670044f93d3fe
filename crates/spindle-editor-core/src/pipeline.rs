//! Renderer round-trip pipeline.
//!
//! The central data-flow hub: place the cursor sentinel, serialize the
//! render scope, hand it to the external engine, reparse the output,
//! replace the scope, and recover the cursor. Nothing is committed until
//! the engine's output has parsed, so a failing engine leaves the pre-edit
//! tree and cursor untouched.

use smol_str::SmolStr;
use spindle_markup::{
    CursorPosition, NodeId, NodeKind, Selection, Tree, outer_markup, parse_fragment,
};

use crate::engine::MarkupEngine;
use crate::error::SyncError;
use crate::localizer::{RenderScope, ScopePlan};
use crate::marker::{place_marker, recover_from_marker, relocate_out_of_preview, remove_marker};

/// Outcome of a committed round trip.
#[derive(Debug)]
pub struct RoundTrip {
    /// The recovered (always collapsed) selection.
    pub selection: Option<Selection>,
    /// Freshly materialized preview regions awaiting a satellite renderer.
    pub fresh_previews: Vec<NodeId>,
}

/// Run steps 3 through 9 of the synchronize flow for a planned scope.
///
/// Suppression and visibility collapse (steps 1 and 2) and side-effect
/// scheduling (step 10) belong to the session that calls this.
pub fn round_trip<E: MarkupEngine>(
    tree: &mut Tree,
    selection: Option<Selection>,
    plan: &ScopePlan,
    engine: &E,
) -> Result<RoundTrip, SyncError> {
    // Step 3: make sure exactly one cursor sentinel is in the tree.
    if tree.find_marker().is_none() {
        if let Some(sel) = selection {
            let caret = relocate_out_of_preview(tree, sel.collapsed().focus);
            place_marker(tree, caret);
        }
    }

    // Step 4: drop host-injected presentational attributes, remembering
    // them so an aborted run can put them back.
    let stripped = strip_styles(tree, plan);

    // Step 5: serialize the scope (satellites travel appended to it).
    let mut markup = match &plan.scope {
        RenderScope::WholeDocument => spindle_markup::inner_markup(tree, tree.root()),
        RenderScope::Blocks(blocks) => {
            let mut out = String::new();
            for &b in blocks {
                out.push_str(&outer_markup(tree, b));
            }
            out
        }
    };
    for &s in &plan.satellites {
        markup.push_str(&outer_markup(tree, s));
    }

    // Step 6: the single point of contact with the external engine.
    let output = match engine.spin_incremental(&markup) {
        Ok(output) => output,
        Err(err) => {
            tracing::warn!(target: "spindle::pipeline", %err, "engine failed, aborting");
            abort(tree, stripped);
            return Err(err.into());
        }
    };

    // Step 7a: parse before touching the tree.
    let parsed = match parse_fragment(tree, &output) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(target: "spindle::pipeline", %err, "unparseable engine output");
            abort(tree, stripped);
            return Err(err.into());
        }
    };

    // Step 7b: commit the replacement.
    for &s in &plan.satellites {
        tree.detach(s);
    }
    match &plan.scope {
        RenderScope::WholeDocument => {
            let root = tree.root();
            tree.set_children(root, &parsed);
        }
        RenderScope::Blocks(blocks) => {
            let at = blocks[0];
            for &node in &parsed {
                tree.insert_before(at, node);
            }
            for &b in blocks {
                tree.detach(b);
            }
        }
    }
    reattach_satellites_at_end(tree);

    // Step 8: decode the sentinel back into a selection.
    let recovered = recover_from_marker(tree);
    let selection = match recovered {
        Some(pos) => Some(Selection::caret(pos)),
        // Marker loss is not an error; keep the prior selection, collapsed.
        None => selection.map(|s| s.collapsed()),
    };

    // Step 9 input: previews the engine just materialized.
    let fresh_previews = parsed
        .iter()
        .flat_map(|&n| tree.descendants(n))
        .filter(|&n| matches!(tree.kind(n), NodeKind::Preview { rendered: false }))
        .collect();

    tracing::debug!(
        target: "spindle::pipeline",
        bytes_in = markup.len(),
        bytes_out = output.len(),
        "round trip committed"
    );
    Ok(RoundTrip {
        selection,
        fresh_previews,
    })
}

/// Serialize the whole document with the current selection encoded as the
/// sentinel, then restore the tree. Used for undo snapshots.
pub fn serialize_with_marker(tree: &mut Tree, selection: Option<Selection>) -> String {
    let had_marker = tree.find_marker().is_some();
    if !had_marker {
        if let Some(sel) = selection {
            place_marker(tree, sel.collapsed().focus);
        }
    }
    let markup = spindle_markup::inner_markup(tree, tree.root());
    if !had_marker {
        recover_from_marker(tree);
    }
    markup
}

/// Replay stored canonical markup (steps 7 and 8, no engine call).
pub fn replay_markup(tree: &mut Tree, markup: &str) -> Result<Option<CursorPosition>, SyncError> {
    let parsed = parse_fragment(tree, markup)?;
    let root = tree.root();
    tree.set_children(root, &parsed);
    Ok(recover_from_marker(tree))
}

fn strip_styles(tree: &mut Tree, plan: &ScopePlan) -> Vec<(NodeId, SmolStr)> {
    let mut in_scope: Vec<NodeId> = match &plan.scope {
        RenderScope::WholeDocument => tree.descendants(tree.root()),
        RenderScope::Blocks(blocks) => {
            blocks.iter().flat_map(|&b| tree.descendants(b)).collect()
        }
    };
    for &s in &plan.satellites {
        in_scope.extend(tree.descendants(s));
    }
    let mut saved = Vec::new();
    for node in in_scope {
        if let Some(style) = tree.style(node).cloned() {
            saved.push((node, style));
            tree.set_style(node, None);
        }
    }
    saved
}

fn abort(tree: &mut Tree, stripped: Vec<(NodeId, SmolStr)>) {
    for (node, style) in stripped {
        tree.set_style(node, Some(style));
    }
    // Plain removal: cursor recovery would apply the boundary-join
    // normalization, and an abort must leave the tree byte-identical.
    remove_marker(tree);
}

fn reattach_satellites_at_end(tree: &mut Tree) {
    let root = tree.root();
    let satellites: Vec<NodeId> = tree
        .children(root)
        .iter()
        .copied()
        .filter(|&n| tree.kind(n).as_block().is_some_and(|b| b.is_satellite()))
        .collect();
    for s in satellites {
        tree.append_child(root, s);
    }
}
