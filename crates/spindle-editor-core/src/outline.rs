//! Document outline and character count, recomputed by the side-effect
//! batch after each committed edit.

use spindle_markup::{BlockKind, NodeId, NodeKind, Tree};

/// One heading in the document outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineItem {
    pub level: u8,
    pub text: String,
    pub block: NodeId,
}

/// All headings in reading order.
pub fn outline(tree: &Tree) -> Vec<OutlineItem> {
    tree.descendants(tree.root())
        .into_iter()
        .filter_map(|n| match tree.kind(n) {
            NodeKind::Block(BlockKind::Heading(level)) => Some(OutlineItem {
                level: *level,
                text: tree.text_content(n),
                block: n,
            }),
            _ => None,
        })
        .collect()
}

/// Number of content characters in the document. Marker runs and preview
/// regions do not count; fence source text does.
pub fn char_count(tree: &Tree) -> usize {
    let mut total = 0;
    let mut stack = vec![tree.root()];
    while let Some(n) = stack.pop() {
        if matches!(tree.kind(n), NodeKind::Preview { .. }) {
            continue;
        }
        if let NodeKind::Text(t) = tree.kind(n) {
            total += t.chars().count();
        }
        for &c in tree.children(n).iter().rev() {
            stack.push(c);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_levels_in_order() {
        let tree = spindle_markup::parse_document(
            "<h1>One</h1><p>body</p><h2>Two</h2><blockquote><h3>Deep</h3></blockquote>",
        )
        .unwrap();
        let items = outline(&tree);
        let got: Vec<(u8, &str)> = items.iter().map(|i| (i.level, i.text.as_str())).collect();
        assert_eq!(got, vec![(1, "One"), (2, "Two"), (3, "Deep")]);
    }

    #[test]
    fn test_char_count_skips_previews() {
        let tree = spindle_markup::parse_document(
            "<p>abc</p><pre><span data-type=\"code-block-info\">rs</span>\
             <code>xy</code><div data-type=\"preview\">rendered!</div></pre>",
        )
        .unwrap();
        // "abc" + "rs" + "xy"
        assert_eq!(char_count(&tree), 7);
    }
}
